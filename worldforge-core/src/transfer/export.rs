// Export serializers: JSON snapshot, two-section CSV, GraphML.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ExportError;
use crate::types::{Edge, GraphSnapshot, Node};

pub const NODE_CSV_HEADER: &str =
    "id,name,type,description,x,y,connectionDirection,createdAt,updatedAt";
pub const EDGE_CSV_HEADER: &str = "id,source,target,sourceHandle,targetHandle,type,animated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Graphml,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Graphml => "graphml",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
            Self::Graphml => "application/graphml+xml",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "graphml" | "xml" => Ok(Self::Graphml),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// A rendered export, ready to be offered for download or written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime_type: &'static str,
    pub contents: String,
}

impl ExportArtifact {
    /// Write the artifact into `dir`, returning the full path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.contents)?;
        info!(path = %path.display(), bytes = self.contents.len(), "Wrote export");
        Ok(path)
    }
}

/// `graph-export-<YYYY-MM-DD>.<ext>`
pub fn default_filename(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "graph-export-{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

pub fn build_snapshot(nodes: &[Node], edges: &[Edge], app_version: Option<&str>) -> GraphSnapshot {
    GraphSnapshot::new(
        nodes.to_vec(),
        edges.to_vec(),
        app_version.map(str::to_string),
    )
}

/// Serialize the graph in `format` and name the result.
pub fn export_graph(
    nodes: &[Node],
    edges: &[Edge],
    format: ExportFormat,
    filename: Option<&str>,
    app_version: Option<&str>,
) -> Result<ExportArtifact, ExportError> {
    let snapshot = build_snapshot(nodes, edges, app_version);
    let contents = match format {
        ExportFormat::Json => to_json(&snapshot)?,
        ExportFormat::Csv => to_csv(&snapshot.nodes, &snapshot.edges)?,
        ExportFormat::Graphml => to_graphml(&snapshot.nodes, &snapshot.edges),
    };
    let filename = filename.map_or_else(
        || default_filename(format, snapshot.export_date.date_naive()),
        str::to_string,
    );
    Ok(ExportArtifact {
        filename,
        mime_type: format.mime_type(),
        contents,
    })
}

// ── JSON ───────────────────────────────────────────────────────────

pub fn to_json(snapshot: &GraphSnapshot) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

// ── CSV ────────────────────────────────────────────────────────────

fn timestamp(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn csv_section<I>(title: &str, header: &str, rows: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(&row)?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    let body = String::from_utf8(body).map_err(|e| ExportError::Csv(e.to_string()))?;
    Ok(format!("{title}\n{header}\n{body}"))
}

/// Render nodes and edges as two CSV tables separated by a blank line.
pub fn to_csv(nodes: &[Node], edges: &[Edge]) -> Result<String, ExportError> {
    let node_rows = nodes.iter().map(|node| {
        vec![
            node.id.clone(),
            node.data.name.clone(),
            node.data.node_type.as_str().to_string(),
            node.data.description.clone(),
            node.position.x.to_string(),
            node.position.y.to_string(),
            node.data.connection_direction.as_str().to_string(),
            timestamp(node.created_at.as_ref()).unwrap_or_default(),
            timestamp(node.updated_at.as_ref()).unwrap_or_default(),
        ]
    });
    let edge_rows = edges.iter().map(|edge| {
        vec![
            edge.id.clone(),
            edge.source.clone(),
            edge.target.clone(),
            edge.source_handle.clone().unwrap_or_default(),
            edge.target_handle.clone().unwrap_or_default(),
            edge.connection_type()
                .map_or_else(String::new, |t| t.as_str().to_string()),
            edge.animated.map(|a| a.to_string()).unwrap_or_default(),
        ]
    });

    let nodes = csv_section("Nodes", NODE_CSV_HEADER, node_rows)?;
    let edges = csv_section("Edges", EDGE_CSV_HEADER, edge_rows)?;
    Ok(format!("{nodes}\n{edges}"))
}

// ── GraphML ────────────────────────────────────────────────────────

pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// (id, for, attr.type)
const GRAPHML_KEYS: [(&str, &str, &str); 13] = [
    ("name", "node", "string"),
    ("type", "node", "string"),
    ("description", "node", "string"),
    ("x", "node", "double"),
    ("y", "node", "double"),
    ("connectionDirection", "node", "string"),
    ("createdAt", "node", "string"),
    ("updatedAt", "node", "string"),
    ("sourceHandle", "edge", "string"),
    ("targetHandle", "edge", "string"),
    ("edgeType", "edge", "string"),
    ("strength", "edge", "string"),
    ("animated", "edge", "boolean"),
];

fn data_element(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(
        out,
        "      <data key=\"{key}\">{}</data>",
        xml_escape(value)
    );
}

pub fn to_graphml(nodes: &[Node], edges: &[Edge]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    let _ = writeln!(
        out,
        "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">"
    );
    for (id, domain, attr_type) in GRAPHML_KEYS {
        let attr_name = if id == "edgeType" { "type" } else { id };
        let _ = writeln!(
            out,
            "  <key id=\"{id}\" for=\"{domain}\" attr.name=\"{attr_name}\" attr.type=\"{attr_type}\"/>"
        );
    }
    let _ = writeln!(out, "  <graph id=\"G\" edgedefault=\"directed\">");

    for node in nodes {
        let _ = writeln!(out, "    <node id=\"{}\">", xml_escape(&node.id));
        data_element(&mut out, "name", &node.data.name);
        data_element(&mut out, "type", node.data.node_type.as_str());
        data_element(&mut out, "description", &node.data.description);
        data_element(&mut out, "x", &node.position.x.to_string());
        data_element(&mut out, "y", &node.position.y.to_string());
        data_element(
            &mut out,
            "connectionDirection",
            node.data.connection_direction.as_str(),
        );
        if let Some(created) = timestamp(node.created_at.as_ref()) {
            data_element(&mut out, "createdAt", &created);
        }
        if let Some(updated) = timestamp(node.updated_at.as_ref()) {
            data_element(&mut out, "updatedAt", &updated);
        }
        let _ = writeln!(out, "    </node>");
    }

    for edge in edges {
        let _ = writeln!(
            out,
            "    <edge id=\"{}\" source=\"{}\" target=\"{}\">",
            xml_escape(&edge.id),
            xml_escape(&edge.source),
            xml_escape(&edge.target)
        );
        if let Some(handle) = &edge.source_handle {
            data_element(&mut out, "sourceHandle", handle);
        }
        if let Some(handle) = &edge.target_handle {
            data_element(&mut out, "targetHandle", handle);
        }
        if let Some(data) = &edge.data {
            data_element(&mut out, "edgeType", data.connection_type.as_str());
            data_element(&mut out, "strength", data.strength.as_str());
        }
        if let Some(animated) = edge.animated {
            data_element(&mut out, "animated", &animated.to_string());
        }
        let _ = writeln!(out, "    </edge>");
    }

    let _ = writeln!(out, "  </graph>");
    let _ = writeln!(out, "</graphml>");
    out
}
