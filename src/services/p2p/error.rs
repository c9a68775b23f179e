/// P2P service errors
#[derive(thiserror::Error, Debug)]
pub enum P2PError {
    /// D-Bus communication error
    #[error("D-Bus operation failed: {0}")]
    DbusError(#[from] zbus::Error),

    /// Standard D-Bus interface error
    #[error("D-Bus call failed: {0}")]
    FdoError(#[from] zbus::fdo::Error),

    /// Service initialization failed
    #[error("Failed to initialize P2P service: {0}")]
    InitializationFailed(String),

    /// Filesystem or socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Helper process could not be started
    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed {
        /// Program that failed to start.
        program: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The session loop is gone
    #[error("P2P service is not running")]
    ServiceStopped,
}
