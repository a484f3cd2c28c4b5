//! Access to the coordination service's tree of znodes.
//!
//! Everything in zkcli that touches the namespace goes through the [`Namespace`] trait. The
//! production implementation talks to a ZooKeeper ensemble (see [`zk`]); tests use an
//! in-memory tree with failure injection.

#[cfg(test)]
pub mod memory;
pub mod zk;

use tracing::{debug, info};

pub const ROOT: &str = "/";

#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
    #[error("Znode {0} does not exist")]
    NodeNotFound(String),
    #[error("Service error at {path}: {message}")]
    Service { path: String, message: String },
    #[error("Could not connect to {target}: {message}")]
    Connection { target: String, message: String },
}

/// Znode metadata as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStat {
    pub czxid: i64,
    pub mzxid: i64,
    /// Milliseconds since the Unix epoch.
    pub ctime: i64,
    /// Milliseconds since the Unix epoch.
    pub mtime: i64,
    pub version: i32,
    pub cversion: i32,
    pub aversion: i32,
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    pub pzxid: i64,
}

/// Blocking operations against a hierarchical namespace.
///
/// Paths are absolute and slash-delimited. Implementations never cache: every call reflects
/// the service's state at the time of the call.
pub trait Namespace {
    fn exists(&self, path: &str) -> Result<bool, NamespaceError>;

    /// Immediate child names (not paths), in the order the service returned them.
    fn list_children(&self, path: &str) -> Result<Vec<String>, NamespaceError>;

    fn get_value(&self, path: &str) -> Result<(Vec<u8>, NodeStat), NamespaceError>;

    fn set_value(&self, path: &str, payload: Vec<u8>) -> Result<(), NamespaceError>;

    /// Creates `path` along with any missing ancestors. Existing nodes are left untouched.
    fn create_path(&self, path: &str) -> Result<(), NamespaceError>;

    fn delete_subtree(&self, path: &str) -> Result<(), NamespaceError>;

    /// Sends the liveness probe and returns the raw reply.
    fn health_probe(&self) -> Result<String, NamespaceError>;
}

/// Creates `path` if it is missing, then sets its payload.
pub fn create_and_set<N: Namespace + ?Sized>(
    namespace: &N,
    path: &str,
    payload: Vec<u8>,
) -> Result<(), NamespaceError> {
    if !namespace.exists(path)? {
        info!("Creating znode {}", path);
        namespace.create_path(path)?;
    }
    debug!("Setting {} bytes on {}", payload.len(), path);
    namespace.set_value(path, payload)
}

pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Last segment of `path`; empty for the root.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

pub fn child_path(parent: &str, child: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), child)
}
