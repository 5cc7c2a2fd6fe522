use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("bridge binary unavailable: {0}")]
    MissingBridgeBinary(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("bridge protocol violation: {0}")]
    BridgeProtocol(String),
    #[error("bridge request `{method}` failed: {message}")]
    BridgeRequest { method: String, message: String },
    #[error("client disconnected: {0}")]
    Disconnected(String),
    #[error("another chatkeep process holds {path} (pid {pid})")]
    InstanceLocked { path: String, pid: String },
}
