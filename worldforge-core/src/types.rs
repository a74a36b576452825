use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::flatten::hoist_properties;

/// Version string written into every exported snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// A type or filter name that does not match any known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {what}: {value}")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

// ── Node types ─────────────────────────────────────────────────────

/// The kind of world-building entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Character,
    Faction,
    City,
    Event,
    Location,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        Self::Character,
        Self::Faction,
        Self::City,
        Self::Event,
        Self::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Faction => "faction",
            Self::City => "city",
            Self::Event => "event",
            Self::Location => "location",
        }
    }

    /// Human-facing label, used for default node names.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Character => "Character",
            Self::Faction => "Faction",
            Self::City => "City",
            Self::Event => "Event",
            Self::Location => "Location",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                what: "node type",
                value: s.to_string(),
            })
    }
}

/// Which handles a node exposes for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    #[default]
    All,
    Horizontal,
    Vertical,
}

impl ConnectionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Typed payload of a node. Type-specific fields live in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Immutable after creation.
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub connection_direction: ConnectionDirection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeData {
    /// Fresh payload for a node created from the palette.
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            name: format!("New {}", node_type.label()),
            description: String::new(),
            connection_direction: ConnectionDirection::All,
            extra: Map::new(),
        }
    }
}

/// A placed world-building entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub data: NodeData,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        self.data.node_type
    }
}

/// Payload sent to the remote store when creating a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub data: NodeData,
    pub position: Position,
}

// ── Patches ────────────────────────────────────────────────────────

/// Partial update of a node: data keys to merge and an optional new position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Why a patch could not be applied to a node.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("node type is immutable ({current} -> {requested})")]
    ImmutableType { current: String, requested: String },
    #[error("patch produces invalid node data: {0}")]
    Invalid(String),
}

impl NodePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one data field.
    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.position.is_none()
    }

    /// Return `node` with this patch applied. The input is left untouched.
    ///
    /// A nested `properties` bag in the patch is hoisted first, so callers
    /// may send either shape. Supplying `type` is allowed only when it
    /// matches the node's current type.
    pub fn apply_to(&self, node: &Node) -> Result<Node, PatchError> {
        let mut incoming = self.data.clone();
        hoist_properties(&mut incoming);

        if let Some(requested) = incoming.get("type") {
            let current = node.data.node_type;
            let same = requested
                .as_str()
                .and_then(|t| t.parse::<NodeType>().ok())
                .is_some_and(|t| t == current);
            if !same {
                return Err(PatchError::ImmutableType {
                    current: current.as_str().to_string(),
                    requested: requested
                        .as_str()
                        .map_or_else(|| requested.to_string(), str::to_string),
                });
            }
            incoming.insert("type".into(), Value::from(current.as_str()));
        }

        let mut merged = match serde_json::to_value(&node.data) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(PatchError::Invalid(e.to_string())),
        };
        for (key, value) in incoming {
            merged.insert(key, value);
        }
        let data: NodeData = serde_json::from_value(Value::Object(merged))
            .map_err(|e| PatchError::Invalid(e.to_string()))?;

        let mut patched = node.clone();
        patched.data = data;
        if let Some(position) = self.position {
            patched.position = position;
        }
        Ok(patched)
    }
}

// ── Edge types ─────────────────────────────────────────────────────

/// The relationship an edge expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Ally,
    Enemy,
    Family,
    Romantic,
    Mentor,
    Rival,
    MemberOf,
    LeaderOf,
    LocatedIn,
    Governs,
    ParticipatedIn,
    CausedBy,
    TradesWith,
    /// Anything not in the list above.
    #[default]
    #[serde(other)]
    Other,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ally => "ally",
            Self::Enemy => "enemy",
            Self::Family => "family",
            Self::Romantic => "romantic",
            Self::Mentor => "mentor",
            Self::Rival => "rival",
            Self::MemberOf => "member_of",
            Self::LeaderOf => "leader_of",
            Self::LocatedIn => "located_in",
            Self::Governs => "governs",
            Self::ParticipatedIn => "participated_in",
            Self::CausedBy => "caused_by",
            Self::TradesWith => "trades_with",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    #[default]
    Moderate,
    Strong,
}

impl Strength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(rename = "type", default)]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub strength: Strength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidirectional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EdgeData>,
}

impl Edge {
    pub fn new(id: &str, source: &str, target: &str, connection_type: ConnectionType) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
            target_handle: None,
            animated: None,
            data: Some(EdgeData {
                connection_type,
                ..EdgeData::default()
            }),
        }
    }

    pub fn connection_type(&self) -> Option<ConnectionType> {
        self.data.as_ref().map(|d| d.connection_type)
    }
}

// ── Snapshots ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

/// Portable, versioned representation of a whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub metadata: SnapshotMetadata,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Build a snapshot whose counts match the given collections.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>, app_version: Option<String>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            export_date: Utc::now(),
            metadata: SnapshotMetadata {
                node_count: nodes.len(),
                edge_count: edges.len(),
                app_version,
            },
            nodes,
            edges,
        }
    }
}

// ── Pending operations ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping record for one in-flight optimistic mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub target_id: String,
    /// State of the target at issue time; `None` for creates.
    pub snapshot_before: Option<Node>,
    pub submitted_at: DateTime<Utc>,
}

// ── Filtering ──────────────────────────────────────────────────────

/// Active node-type filter of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeFilter {
    #[default]
    All,
    Type(NodeType),
}

impl NodeFilter {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::All => true,
            Self::Type(t) => node.data.node_type == *t,
        }
    }
}

impl std::fmt::Display for NodeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Type(t) => f.write_str(t.as_str()),
        }
    }
}

impl FromStr for NodeFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<NodeType>()
            .map(Self::Type)
            .map_err(|_| UnknownVariant {
                what: "filter",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_node() -> Node {
        let mut data = NodeData::new(NodeType::City);
        data.name = "Karsh".into();
        data.extra.insert("population".into(), json!(12_000));
        Node {
            id: "n1".into(),
            data,
            position: Position::new(10.0, 20.0),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn node_serializes_camel_case_with_flat_extras() {
        let value = serde_json::to_value(sample_node()).unwrap();
        assert_eq!(value["data"]["type"], "city");
        assert_eq!(value["data"]["connectionDirection"], "all");
        assert_eq!(value["data"]["population"], 12_000);
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn node_data_defaults_missing_fields() {
        let node: Node = serde_json::from_value(json!({
            "id": "n9",
            "data": { "name": "Nameless" }
        }))
        .unwrap();
        assert_eq!(node.data.node_type, NodeType::Character);
        assert_eq!(node.data.connection_direction, ConnectionDirection::All);
        assert_eq!(node.position, Position::default());
    }

    #[test]
    fn unknown_connection_type_falls_back_to_other() {
        let data: EdgeData =
            serde_json::from_value(json!({ "type": "sworn_blood_oath", "strength": "strong" }))
                .unwrap();
        assert_eq!(data.connection_type, ConnectionType::Other);
        assert_eq!(data.strength, Strength::Strong);
    }

    #[test]
    fn patch_merges_fields_and_position() {
        let node = sample_node();
        let patched = NodePatch::new()
            .set("name", "Karsh Hold")
            .set("population", 15_000)
            .with_position(Position::new(1.0, 2.0))
            .apply_to(&node)
            .unwrap();
        assert_eq!(patched.data.name, "Karsh Hold");
        assert_eq!(patched.data.extra["population"], 15_000);
        assert_eq!(patched.position, Position::new(1.0, 2.0));
        assert_eq!(node.data.name, "Karsh");
    }

    #[test]
    fn patch_hoists_nested_properties() {
        let patched = NodePatch::new()
            .set("properties", json!({ "ruler": "Ama", "name": "Inner" }))
            .apply_to(&sample_node())
            .unwrap();
        assert_eq!(patched.data.name, "Inner");
        assert_eq!(patched.data.extra["ruler"], "Ama");
        assert!(!patched.data.extra.contains_key("properties"));
    }

    #[test]
    fn patch_rejects_type_change() {
        let err = NodePatch::new()
            .set("type", "faction")
            .apply_to(&sample_node())
            .unwrap_err();
        assert!(matches!(err, PatchError::ImmutableType { .. }));

        // Restating the current type is fine.
        assert!(NodePatch::new().set("type", "city").apply_to(&sample_node()).is_ok());
    }

    #[test]
    fn patch_accepts_current_type_in_any_case() {
        let patched = NodePatch::new()
            .set("type", " City")
            .set("name", "Karsh Hold")
            .apply_to(&sample_node())
            .unwrap();
        assert_eq!(patched.data.node_type, NodeType::City);
        assert_eq!(patched.data.name, "Karsh Hold");

        let err = NodePatch::new()
            .set("type", "FACTION")
            .apply_to(&sample_node())
            .unwrap_err();
        assert_eq!(
            err,
            PatchError::ImmutableType {
                current: "city".into(),
                requested: "FACTION".into()
            }
        );
    }

    #[test]
    fn patch_rejects_invalid_enum_value() {
        let err = NodePatch::new()
            .set("connectionDirection", "diagonal")
            .apply_to(&sample_node())
            .unwrap_err();
        assert!(matches!(err, PatchError::Invalid(_)));
    }

    #[test]
    fn snapshot_counts_match_collections() {
        let snapshot = GraphSnapshot::new(
            vec![sample_node()],
            vec![Edge::new("e1", "n1", "n1", ConnectionType::Governs)],
            Some("0.1.0".into()),
        );
        assert_eq!(snapshot.metadata.node_count, 1);
        assert_eq!(snapshot.metadata.edge_count, 1);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn filter_parsing() {
        assert_eq!("all".parse::<NodeFilter>().unwrap(), NodeFilter::All);
        assert_eq!(
            "Event".parse::<NodeFilter>().unwrap(),
            NodeFilter::Type(NodeType::Event)
        );
        assert!("dragons".parse::<NodeFilter>().is_err());
    }

    mod prop {
        use proptest::prelude::*;

        use super::super::*;

        fn arb_node_type() -> impl Strategy<Value = NodeType> {
            prop_oneof![
                Just(NodeType::Character),
                Just(NodeType::Faction),
                Just(NodeType::City),
                Just(NodeType::Event),
                Just(NodeType::Location),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn node_type_serde_roundtrip(t in arb_node_type()) {
                let json = serde_json::to_string(&t).unwrap();
                let back: NodeType = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(back, t);
            }

            #[test]
            fn node_type_as_str_parses_back(t in arb_node_type()) {
                prop_assert_eq!(t.as_str().parse::<NodeType>().unwrap(), t);
                prop_assert_eq!(t.to_string(), t.as_str());
            }
        }
    }
}
