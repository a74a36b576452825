// Import pipeline: file checks → parse → structural validation → transport.
//
// Validation runs top-down and stops at the first hard error. Recoverable
// findings are collected as warnings and the offending values are repaired
// in place where a default exists.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::ImportError;
use crate::flatten::flatten_value;
use crate::types::{
    ConnectionDirection, Edge, EdgeData, GraphSnapshot, Node, NodeType, SNAPSHOT_VERSION,
    SnapshotMetadata, Strength, UnknownVariant,
};

/// MIME type accepted for imports.
pub const JSON_MIME: &str = "application/json";

/// Default import size ceiling (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

// ── File boundary ──────────────────────────────────────────────────

/// A file handed to the importer. Only metadata is held; contents are read
/// after the file passes [`check_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub name: String,
    /// MIME type declared by whoever supplied the file, if any.
    pub declared_type: Option<String>,
    pub size: u64,
    pub path: PathBuf,
}

impl ImportFile {
    /// Describe a file on disk without reading it.
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let metadata = std::fs::metadata(path).map_err(|e| ImportError::Io {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            declared_type: None,
            size: metadata.len(),
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn with_declared_type(mut self, mime: &str) -> Self {
        self.declared_type = Some(mime.to_string());
        self
    }

    fn looks_like_json(&self) -> bool {
        let declared = self
            .declared_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(JSON_MIME));
        let extension = Path::new(&self.name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        declared || extension
    }
}

/// Reject non-JSON and oversized files before anything reads them.
pub fn check_file(file: &ImportFile, max_size: u64) -> Result<(), ImportError> {
    if !file.looks_like_json() {
        return Err(ImportError::UnsupportedFileType {
            name: file.name.clone(),
        });
    }
    if file.size > max_size {
        return Err(ImportError::FileTooLarge {
            name: file.name.clone(),
            size: file.size,
            limit: max_size,
        });
    }
    Ok(())
}

/// Check, read and parse an import file.
pub async fn read_import_file(file: &ImportFile, max_size: u64) -> Result<Value, ImportError> {
    check_file(file, max_size)?;
    let text = tokio::fs::read_to_string(&file.path)
        .await
        .map_err(|e| ImportError::Io {
            name: file.name.clone(),
            message: e.to_string(),
        })?;
    debug!(file = %file.name, bytes = text.len(), "Read import file");
    parse_graph(&text)
}

/// Parse import text, surfacing the parser's message on failure.
pub fn parse_graph(text: &str) -> Result<Value, ImportError> {
    serde_json::from_str(text).map_err(|e| ImportError::Parse(e.to_string()))
}

// ── Validation ─────────────────────────────────────────────────────

/// A recoverable data-quality finding. The import proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    MissingName { index: usize, node_id: String },
    MissingType { index: usize, node_id: String },
    InvalidType { index: usize, node_id: String, value: String },
    InvalidPosition { index: usize, node_id: String },
    DuplicateNodeId { index: usize, node_id: String },
    DanglingSource { index: usize, edge_id: String, node_id: String },
    DanglingTarget { index: usize, edge_id: String, node_id: String },
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName { index, node_id } => {
                write!(f, "Node {node_id} (index {index}) has no name")
            }
            Self::MissingType { index, node_id } => {
                write!(f, "Node {node_id} (index {index}) has no type")
            }
            Self::InvalidType {
                index,
                node_id,
                value,
            } => write!(f, "Node {node_id} (index {index}) has unknown type {value}"),
            Self::InvalidPosition { index, node_id } => write!(
                f,
                "Node {node_id} (index {index}) has an invalid position; reset to (0, 0)"
            ),
            Self::DuplicateNodeId { index, node_id } => {
                write!(f, "Node {node_id} (index {index}) repeats an earlier id")
            }
            Self::DanglingSource {
                index,
                edge_id,
                node_id,
            } => write!(
                f,
                "Edge {edge_id} (index {index}) references missing source node {node_id}"
            ),
            Self::DanglingTarget {
                index,
                edge_id,
                node_id,
            } => write!(
                f,
                "Edge {edge_id} (index {index}) references missing target node {node_id}"
            ),
        }
    }
}

/// A structurally valid graph document, still in JSON form.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedGraph {
    /// The `version` string of the document, when present.
    pub version: Option<String>,
    /// The `exportDate` of the document, when present and parseable.
    pub export_date: Option<DateTime<Utc>>,
    pub nodes: Vec<Value>,
    pub edges: Vec<Value>,
    pub warnings: Vec<ImportWarning>,
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn finite_number(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_f64)
        .is_some_and(f64::is_finite)
}

/// Validate an untrusted graph document.
///
/// Positions that are missing or non-numeric are reset to `(0, 0)` directly
/// inside `document`.
pub fn validate_graph(document: &mut Value) -> Result<ValidatedGraph, ImportError> {
    let Some(root) = document.as_object_mut() else {
        return Err(ImportError::Validation(
            "expected a JSON object at the top level".into(),
        ));
    };
    if !root.get("nodes").is_some_and(Value::is_array) {
        return Err(ImportError::Validation("'nodes' must be an array".into()));
    }
    if !root.get("edges").is_some_and(Value::is_array) {
        return Err(ImportError::Validation("'edges' must be an array".into()));
    }

    let mut warnings = Vec::new();
    let mut node_ids: HashSet<String> = HashSet::new();

    if let Some(Value::Array(nodes)) = root.get_mut("nodes") {
        for (index, node) in nodes.iter_mut().enumerate() {
            validate_node(index, node, &mut node_ids, &mut warnings)?;
        }
    }

    if let Some(Value::Array(edges)) = root.get("edges") {
        for (index, edge) in edges.iter().enumerate() {
            validate_edge(index, edge, &node_ids, &mut warnings)?;
        }
    }

    let version = root
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);
    let export_date = root
        .get("exportDate")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));
    let nodes = match root.get("nodes") {
        Some(Value::Array(nodes)) => nodes.clone(),
        _ => Vec::new(),
    };
    let edges = match root.get("edges") {
        Some(Value::Array(edges)) => edges.clone(),
        _ => Vec::new(),
    };

    if !warnings.is_empty() {
        warn!(count = warnings.len(), "Import validation produced warnings");
    }

    Ok(ValidatedGraph {
        version,
        export_date,
        nodes,
        edges,
        warnings,
    })
}

fn validate_node(
    index: usize,
    node: &mut Value,
    seen: &mut HashSet<String>,
    warnings: &mut Vec<ImportWarning>,
) -> Result<(), ImportError> {
    let Some(id) = non_empty_str(node, "id").map(str::to_string) else {
        return Err(ImportError::Validation(format!(
            "node at index {index} is missing a valid id"
        )));
    };
    let Some(data) = node.get("data").and_then(Value::as_object) else {
        return Err(ImportError::Validation(format!(
            "node {id} (index {index}) is missing its data object"
        )));
    };

    let has_name = data
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_name {
        warnings.push(ImportWarning::MissingName {
            index,
            node_id: id.clone(),
        });
    }
    match data.get("type") {
        None | Some(Value::Null) => warnings.push(ImportWarning::MissingType {
            index,
            node_id: id.clone(),
        }),
        Some(Value::String(t)) if t.parse::<NodeType>().is_ok() => {}
        Some(other) => warnings.push(ImportWarning::InvalidType {
            index,
            node_id: id.clone(),
            value: other.as_str().map_or_else(|| other.to_string(), str::to_string),
        }),
    }

    let position = node.get("position");
    let valid_position = position.is_some_and(|p| {
        finite_number(p.get("x")) && finite_number(p.get("y"))
    });
    if !valid_position {
        warnings.push(ImportWarning::InvalidPosition {
            index,
            node_id: id.clone(),
        });
        if let Some(obj) = node.as_object_mut() {
            obj.insert("position".into(), json!({ "x": 0, "y": 0 }));
        }
    }

    if !seen.insert(id.clone()) {
        warnings.push(ImportWarning::DuplicateNodeId { index, node_id: id });
    }
    Ok(())
}

fn required_edge_field<'a>(edge: &'a Value, key: &str, index: usize) -> Result<&'a str, ImportError> {
    non_empty_str(edge, key).ok_or_else(|| {
        ImportError::Validation(format!("edge at index {index} is missing a valid {key}"))
    })
}

fn validate_edge(
    index: usize,
    edge: &Value,
    node_ids: &HashSet<String>,
    warnings: &mut Vec<ImportWarning>,
) -> Result<(), ImportError> {
    let id = required_edge_field(edge, "id", index)?;
    let source = required_edge_field(edge, "source", index)?;
    let target = required_edge_field(edge, "target", index)?;

    if !node_ids.contains(source) {
        warnings.push(ImportWarning::DanglingSource {
            index,
            edge_id: id.to_string(),
            node_id: source.to_string(),
        });
    }
    if !node_ids.contains(target) {
        warnings.push(ImportWarning::DanglingTarget {
            index,
            edge_id: id.to_string(),
            node_id: target.to_string(),
        });
    }
    Ok(())
}

/// Structured validation outcome for callers that display results rather
/// than propagate errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub success: bool,
    pub data: Option<ValidatedGraph>,
    pub error: Option<String>,
    pub warnings: Vec<ImportWarning>,
}

impl From<Result<ValidatedGraph, ImportError>> for ValidationResult {
    fn from(result: Result<ValidatedGraph, ImportError>) -> Self {
        match result {
            Ok(graph) => Self {
                success: true,
                warnings: graph.warnings.clone(),
                data: Some(graph),
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                warnings: Vec::new(),
            },
        }
    }
}

// ── Transport ──────────────────────────────────────────────────────

/// How an import combines with the current graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    #[default]
    Replace,
    Merge,
}

impl ImportStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStrategy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            _ => Err(UnknownVariant {
                what: "import strategy",
                value: s.to_string(),
            }),
        }
    }
}

/// A validated import ready to hand to the store or a remote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub strategy: ImportStrategy,
    pub data: GraphSnapshot,
}

/// Flatten, type and wrap a validated graph. Metadata counts are always
/// recomputed from the arrays; whatever the file claimed is ignored.
pub fn prepare_import(
    validated: ValidatedGraph,
    strategy: ImportStrategy,
) -> Result<ImportRequest, ImportError> {
    let nodes = validated
        .nodes
        .into_iter()
        .map(|raw| coerce_node(flatten_value(&raw)))
        .collect::<Result<Vec<Node>, _>>()?;
    let nodes = dedup_nodes(nodes);
    let edges = validated
        .edges
        .into_iter()
        .map(coerce_edge)
        .collect::<Result<Vec<Edge>, _>>()?;

    Ok(ImportRequest {
        strategy,
        data: GraphSnapshot {
            version: validated
                .version
                .unwrap_or_else(|| SNAPSHOT_VERSION.to_string()),
            export_date: validated.export_date.unwrap_or_else(Utc::now),
            metadata: SnapshotMetadata {
                node_count: nodes.len(),
                edge_count: edges.len(),
                app_version: None,
            },
            nodes,
            edges,
        },
    })
}

/// Drop fields whose values would not deserialize so typed defaults apply.
fn coerce_node(mut raw: Value) -> Result<Node, ImportError> {
    if let Some(Value::Object(data)) = raw.get_mut("data") {
        match data.get("type").and_then(Value::as_str).map(str::parse::<NodeType>) {
            Some(Ok(t)) => {
                data.insert("type".into(), Value::from(t.as_str()));
            }
            _ => {
                data.remove("type");
            }
        }
        for key in ["name", "description"] {
            if !data.get(key).is_some_and(Value::is_string) {
                data.remove(key);
            }
        }
        let direction_ok = data
            .get("connectionDirection")
            .is_some_and(|v| serde_json::from_value::<ConnectionDirection>(v.clone()).is_ok());
        if !direction_ok {
            data.remove("connectionDirection");
        }
    }
    if let Some(obj) = raw.as_object_mut() {
        drop_unparseable_dates(obj);
    }

    let id = raw.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    serde_json::from_value(raw)
        .map_err(|e| ImportError::Validation(format!("node {id} cannot be read: {e}")))
}

/// Node ids are unique in the store: a later record replaces an earlier one
/// with the same id, keeping the first record's position in the list.
fn dedup_nodes(nodes: Vec<Node>) -> Vec<Node> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Some(&i) = slots.get(&node.id) {
            out[i] = node;
        } else {
            slots.insert(node.id.clone(), out.len());
            out.push(node);
        }
    }
    out
}

fn drop_unparseable_dates(obj: &mut Map<String, Value>) {
    for key in ["createdAt", "updatedAt"] {
        let ok = obj.get(key).is_some_and(|v| {
            v.as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok())
        });
        if !ok {
            obj.remove(key);
        }
    }
}

fn coerce_edge(mut raw: Value) -> Result<Edge, ImportError> {
    if let Some(obj) = raw.as_object_mut() {
        for key in ["sourceHandle", "targetHandle"] {
            if !obj.get(key).is_some_and(Value::is_string) {
                obj.remove(key);
            }
        }
        if !obj.get("animated").is_some_and(Value::is_boolean) {
            obj.remove("animated");
        }
        let data_ok = obj
            .get("data")
            .is_some_and(|d| serde_json::from_value::<EdgeData>(d.clone()).is_ok());
        if !data_ok {
            if let Some(Value::Object(mut data)) = obj.remove("data") {
                coerce_edge_data(&mut data);
                obj.insert("data".into(), Value::Object(data));
            }
        }
    }

    let id = raw.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    serde_json::from_value(raw)
        .map_err(|e| ImportError::Validation(format!("edge {id} cannot be read: {e}")))
}

fn coerce_edge_data(data: &mut Map<String, Value>) {
    if !data.get("type").is_some_and(Value::is_string) {
        data.remove("type");
    }
    let strength_ok = data.get("strength").is_some_and(|v| {
        serde_json::from_value::<Strength>(v.clone()).is_ok()
    });
    if !strength_ok {
        data.remove("strength");
    }
    if !data.get("bidirectional").is_some_and(Value::is_boolean) {
        data.remove("bidirectional");
    }
    for key in ["label", "description"] {
        if !data.get(key).is_some_and(Value::is_string) {
            data.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;
    use crate::types::ConnectionType;

    #[test]
    fn literal_case_warns_and_repairs_position() {
        let mut doc = json!({
            "nodes": [{ "id": "n1", "data": { "name": "A" } }],
            "edges": [{ "id": "e1", "source": "n1", "target": "nX" }]
        });
        let result: ValidationResult = validate_graph(&mut doc).into();

        assert!(result.success);
        assert!(result.error.is_none());
        assert!(result.warnings.contains(&ImportWarning::MissingType {
            index: 0,
            node_id: "n1".into()
        }));
        assert!(result.warnings.contains(&ImportWarning::DanglingTarget {
            index: 0,
            edge_id: "e1".into(),
            node_id: "nX".into()
        }));
        assert!(
            !result
                .warnings
                .iter()
                .any(|w| matches!(w, ImportWarning::DanglingSource { .. }))
        );
        // Repaired in the caller's document, not only in the result.
        assert_eq!(doc["nodes"][0]["position"], json!({ "x": 0, "y": 0 }));
        let data = result.data.unwrap();
        assert_eq!(data.nodes[0]["position"]["x"], 0);
    }

    #[test]
    fn missing_node_id_is_fatal() {
        let mut doc = json!({ "nodes": [{ "data": {} }], "edges": [] });
        let result = ValidationResult::from(validate_graph(&mut doc));
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("index 0"));
    }

    #[test]
    fn structural_checks_short_circuit_in_order() {
        let err = validate_graph(&mut json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("top level"));

        let err = validate_graph(&mut json!({ "nodes": {}, "edges": "x" })).unwrap_err();
        assert!(err.to_string().contains("'nodes'"));

        let err = validate_graph(&mut json!({ "nodes": [] })).unwrap_err();
        assert!(err.to_string().contains("'edges'"));
    }

    #[test]
    fn node_without_data_object_is_fatal() {
        let err = validate_graph(&mut json!({
            "nodes": [{ "id": "n1", "data": "nope" }],
            "edges": []
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ImportError::Validation("node n1 (index 0) is missing its data object".into())
        );
    }

    #[test]
    fn first_bad_edge_field_is_reported() {
        let err = validate_graph(&mut json!({
            "nodes": [{ "id": "a", "data": { "name": "A", "type": "city" }, "position": { "x": 1, "y": 1 } }],
            "edges": [
                { "id": "e1", "source": "a", "target": "a" },
                { "id": "e2", "source": "", "target": "a" }
            ]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("edge at index 1 is missing a valid source"));
    }

    #[test]
    fn dangling_source_and_target_both_reported() {
        let graph = validate_graph(&mut json!({
            "nodes": [],
            "edges": [{ "id": "e1", "source": "ghost", "target": "phantom" }]
        }))
        .unwrap();
        assert_eq!(graph.warnings.len(), 2);
    }

    #[test]
    fn invalid_type_and_duplicate_ids_warn() {
        let graph = validate_graph(&mut json!({
            "nodes": [
                { "id": "a", "data": { "name": "A", "type": "dragon" }, "position": { "x": 0, "y": 0 } },
                { "id": "a", "data": { "name": "B", "type": "city" }, "position": { "x": "1", "y": 0 } }
            ],
            "edges": []
        }))
        .unwrap();
        assert_eq!(
            graph.warnings,
            vec![
                ImportWarning::InvalidType {
                    index: 0,
                    node_id: "a".into(),
                    value: "dragon".into()
                },
                ImportWarning::InvalidPosition {
                    index: 1,
                    node_id: "a".into()
                },
                ImportWarning::DuplicateNodeId {
                    index: 1,
                    node_id: "a".into()
                },
            ]
        );
    }

    #[test]
    fn prepare_keeps_last_record_for_duplicate_ids() {
        let mut doc = json!({
            "nodes": [
                { "id": "a", "data": { "name": "One", "type": "city" }, "position": { "x": 0, "y": 0 } },
                { "id": "b", "data": { "name": "Other", "type": "event" }, "position": { "x": 0, "y": 0 } },
                { "id": "a", "data": { "name": "Two", "type": "city" }, "position": { "x": 3, "y": 4 } }
            ],
            "edges": []
        });
        let validated = validate_graph(&mut doc).unwrap();
        assert!(validated
            .warnings
            .contains(&ImportWarning::DuplicateNodeId { index: 2, node_id: "a".into() }));

        let request = prepare_import(validated, ImportStrategy::Replace).unwrap();
        let names: Vec<(&str, &str)> = request
            .data
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.data.name.as_str()))
            .collect();
        assert_eq!(names, vec![("a", "Two"), ("b", "Other")]);
        assert_eq!(request.data.metadata.node_count, 2);
    }

    #[test]
    fn prepare_recomputes_metadata_and_flattens() {
        let mut doc = json!({
            "version": "1.0",
            "metadata": { "nodeCount": 99, "edgeCount": 42 },
            "nodes": [{
                "id": "n1",
                "data": { "type": "Faction", "name": "Old", "properties": { "name": "Veiled Hand", "creed": "Silence" } },
                "position": { "x": 5, "y": 6 }
            }],
            "edges": [{ "id": "e1", "source": "n1", "target": "n1", "animated": "yes",
                        "data": { "type": "rival", "strength": "immense" } }]
        });
        let validated = validate_graph(&mut doc).unwrap();
        let request = prepare_import(validated, ImportStrategy::Merge).unwrap();

        assert_eq!(request.strategy, ImportStrategy::Merge);
        assert_eq!(request.data.metadata.node_count, 1);
        assert_eq!(request.data.metadata.edge_count, 1);
        let node = &request.data.nodes[0];
        assert_eq!(node.data.node_type, NodeType::Faction);
        assert_eq!(node.data.name, "Veiled Hand");
        assert_eq!(node.data.extra["creed"], "Silence");
        let edge = &request.data.edges[0];
        assert_eq!(edge.animated, None);
        assert_eq!(edge.connection_type(), Some(ConnectionType::Rival));

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["strategy"], "merge");
        assert_eq!(wire["data"]["metadata"]["nodeCount"], 1);
    }

    #[test]
    fn file_checks_fail_fast() {
        let file = ImportFile {
            name: "graph.csv".into(),
            declared_type: Some("text/csv".into()),
            size: 10,
            path: PathBuf::from("/does/not/exist.csv"),
        };
        assert!(matches!(
            check_file(&file, DEFAULT_MAX_FILE_SIZE),
            Err(ImportError::UnsupportedFileType { .. })
        ));

        let big = ImportFile {
            name: "graph.json".into(),
            declared_type: None,
            size: DEFAULT_MAX_FILE_SIZE + 1,
            path: PathBuf::from("/does/not/exist.json"),
        };
        assert!(matches!(
            check_file(&big, DEFAULT_MAX_FILE_SIZE),
            Err(ImportError::FileTooLarge { .. })
        ));

        let declared = ImportFile {
            name: "upload".into(),
            declared_type: None,
            size: 1,
            path: PathBuf::from("upload"),
        }
        .with_declared_type(JSON_MIME);
        assert!(check_file(&declared, DEFAULT_MAX_FILE_SIZE).is_ok());
    }

    #[tokio::test]
    async fn oversized_file_is_never_read() {
        // The path does not exist: reaching the read would yield an Io error.
        let file = ImportFile {
            name: "huge.json".into(),
            declared_type: Some(JSON_MIME.into()),
            size: 11 * 1024 * 1024,
            path: PathBuf::from("/nonexistent/huge.json"),
        };
        let err = read_import_file(&file, DEFAULT_MAX_FILE_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn parse_failure_carries_parser_message() {
        let mut tmp = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(tmp, "{{ \"nodes\": [ }}").unwrap();
        let file = ImportFile::from_path(tmp.path()).unwrap();
        let err = read_import_file(&file, DEFAULT_MAX_FILE_SIZE)
            .await
            .unwrap_err();
        match err {
            ImportError::Parse(message) => assert!(message.contains("line 1")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!("MERGE".parse::<ImportStrategy>().unwrap(), ImportStrategy::Merge);
        assert!("append".parse::<ImportStrategy>().is_err());
    }
}
