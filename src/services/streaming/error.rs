/// Streaming transport errors
#[derive(thiserror::Error, Debug)]
pub enum StreamingError {
    /// Socket setup or transmission failed
    #[error("Transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
