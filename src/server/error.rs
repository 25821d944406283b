use crate::handler::EngineError;
use crate::protocol::ProtocolError;
use crate::translate::TranslateError;

/// Session error types.
#[derive(Debug)]
pub enum SessionError {
    Io(std::io::Error),
    Protocol(ProtocolError),
    Translate(TranslateError),
    Engine(EngineError),
    /// The database named at startup does not exist.
    DatabaseNotFound(String),
}

impl SessionError {
    /// Recoverable errors abort the current batch but leave the session
    /// running; everything else tears the connection down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::Translate(_) | SessionError::Engine(_))
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "I/O error: {}", e),
            SessionError::Protocol(e) => write!(f, "protocol error: {}", e),
            SessionError::Translate(e) => write!(f, "{}", e),
            SessionError::Engine(e) => write!(f, "{}", e),
            SessionError::DatabaseNotFound(db) => {
                write!(f, "\"database \"{}\" does not exist\"", db)
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(e)
    }
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        // The codec wraps stream failures in ProtocolError::Io; unwrap them
        // so they are classified as I/O, not as frame-shape violations.
        match e {
            ProtocolError::Io(io) => SessionError::Io(io),
            other => SessionError::Protocol(other),
        }
    }
}

impl From<TranslateError> for SessionError {
    fn from(e: TranslateError) -> Self {
        SessionError::Translate(e)
    }
}

impl From<EngineError> for SessionError {
    fn from(e: EngineError) -> Self {
        SessionError::Engine(e)
    }
}
