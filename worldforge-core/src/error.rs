/// Top-level Worldforge error type.
///
/// Fallible operations in `worldforge-core` return [`Result<T, WorldforgeError>`](Result)
/// unless they belong to a single concern, in which case they return that
/// concern's enum directly. Each variant wraps a domain-specific error enum,
/// allowing callers to match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum WorldforgeError {
    /// Error from the remote authoritative store.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// An optimistic mutation was rejected or rolled back.
    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    /// An import file was rejected or failed validation.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// An export artifact could not be produced or written.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Error from the local key-value persistence layer.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reported by a [`RemoteStore`](crate::remote::RemoteStore).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network-level failure reaching the remote store.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote store returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code from the remote store.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Response body could not be decoded into the expected record.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The remote store has no node with this id.
    #[error("Node not found: {0}")]
    NotFound(String),

    /// The remote store refused the request.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by the optimistic mutation engine.
///
/// Every variant except the validation ones (`UnknownNode`, `ImmutableType`,
/// `InvalidPatch`)
/// means the optimistic effect was already rolled back when the caller sees it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// The remote call failed; the local effect has been rolled back.
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// No node with this id is visible in the local store.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// An update tried to change a node's type.
    #[error("Node type of {id} is immutable ({current} -> {requested})")]
    ImmutableType {
        /// Target node id.
        id: String,
        /// Type the node was created with.
        current: String,
        /// Type the patch asked for.
        requested: String,
    },

    /// The patch does not produce valid node data.
    #[error("Invalid patch for {id}: {message}")]
    InvalidPatch {
        /// Target node id.
        id: String,
        /// Deserialization failure.
        message: String,
    },

    /// The placeholder this operation targeted was never confirmed remotely.
    #[error("Target {0} was rolled back before this operation ran")]
    Orphaned(String),

    /// The background task driving the remote call died before settling.
    #[error("Mutation task aborted: {0}")]
    Aborted(String),
}

/// Errors from the import pipeline (file checks, parsing, validation).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The file is neither declared as JSON nor carries a `.json` extension.
    #[error("Unsupported file type for {name}: expected a JSON file")]
    UnsupportedFileType {
        /// File name as given by the caller.
        name: String,
    },

    /// The file exceeds the import size ceiling.
    #[error("File {name} is too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge {
        /// File name as given by the caller.
        name: String,
        /// Actual size in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// The file could not be read.
    #[error("Cannot read {name}: {message}")]
    Io {
        /// File name as given by the caller.
        name: String,
        /// Underlying I/O error message.
        message: String,
    },

    /// The file is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Parse(String),

    /// The JSON document is structurally invalid.
    #[error("Invalid graph: {0}")]
    Validation(String),

    /// Local changes the import would overwrite are still syncing.
    #[error("Cannot import while {pending} local change(s) are still syncing")]
    UnsyncedChanges {
        /// Operations in flight that block the import.
        pending: usize,
    },
}

/// Errors while producing or writing an export artifact.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// Unknown export format name.
    #[error("Unknown export format: {0}")]
    UnknownFormat(String),

    /// JSON serialization of the snapshot failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Filesystem I/O error writing the artifact.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

/// Errors from the local key-value persistence layer.
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The in-process store lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors in Worldforge configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, WorldforgeError>`.
pub type Result<T> = std::result::Result<T, WorldforgeError>;
