use thiserror::Error;

/// Errors from the process/pipe layer. Kept distinct from [`ProtocolError`]
/// because the scheduler reacts to them differently: a transport error
/// always means the engine process itself is gone or wedged, while a
/// protocol error can mean the engine is alive but sent nonsense.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine closed its stdout (connection lost)")]
    Disconnected,
    #[error("no response from engine within {0:?}")]
    Timeout(std::time::Duration),
    #[error("failed to write to engine stdin: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to read from engine stdout: {0}")]
    Read(#[source] std::io::Error),
}

/// Errors from parsing or acting on the UGI-like wire protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("engine sent unexpected line while {while_doing}: '{line}'")]
    Unexpected { while_doing: String, line: String },
    #[error("engine returned illegal move '{mov}' in position '{fen}'")]
    IllegalMove { mov: String, fen: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
