use std::collections::VecDeque;

use crate::types::GraphSnapshot;

/// Bounded log of graph snapshots, oldest first.
///
/// Once `depth` entries are stored, each push evicts the oldest one.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    depth: usize,
    entries: VecDeque<GraphSnapshot>,
}

impl HistoryLog {
    /// A depth of zero is treated as one.
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            entries: VecDeque::with_capacity(depth),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn push(&mut self, snapshot: GraphSnapshot) {
        if self.entries.len() == self.depth {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<&GraphSnapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphSnapshot> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn snapshot(tag: usize) -> GraphSnapshot {
        GraphSnapshot::new(Vec::new(), Vec::new(), Some(tag.to_string()))
    }

    fn tag(s: &GraphSnapshot) -> Option<&str> {
        s.metadata.app_version.as_deref()
    }

    #[test]
    fn evicts_oldest_beyond_depth() {
        let mut log = HistoryLog::new(2);
        for i in 0..3 {
            log.push(snapshot(i));
        }
        let tags: Vec<_> = log.iter().filter_map(tag).collect();
        assert_eq!(tags, vec!["1", "2"]);
        assert_eq!(log.latest().and_then(tag), Some("2"));
    }

    #[test]
    fn zero_depth_keeps_one() {
        let mut log = HistoryLog::new(0);
        log.push(snapshot(1));
        log.push(snapshot(2));
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn never_exceeds_depth(depth in 1usize..20, pushes in 0usize..60) {
            let mut log = HistoryLog::new(depth);
            for i in 0..pushes {
                log.push(snapshot(i));
            }
            prop_assert_eq!(log.len(), pushes.min(depth));
            if pushes > 0 {
                let expected = (pushes - 1).to_string();
                prop_assert_eq!(log.latest().and_then(tag), Some(expected.as_str()));
            }
        }
    }
}
