/// Protocol parsing and encoding errors
#[derive(Debug)]
pub enum ProtocolError {
    InsufficientData,
    InvalidMessage,
    TrailingBytes(usize),
    UnsupportedProtocolVersion(i32),
    UnknownMessageType(u8),
    MessageTooLarge(usize),
    MissingField(&'static str),
    FieldMismatch(&'static str),
    StructureMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    InvalidUtf8,
    Io(std::io::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::InsufficientData => write!(f, "insufficient data"),
            ProtocolError::InvalidMessage => write!(f, "invalid message"),
            ProtocolError::TrailingBytes(n) => {
                write!(f, "{} trailing bytes after message payload", n)
            }
            ProtocolError::UnsupportedProtocolVersion(v) => {
                write!(f, "unsupported protocol version: {}", v)
            }
            ProtocolError::UnknownMessageType(t) => {
                write!(f, "unknown message type: 0x{:02x}", t)
            }
            ProtocolError::MessageTooLarge(n) => write!(f, "message too large: {} bytes", n),
            ProtocolError::MissingField(name) => write!(f, "missing field: {}", name),
            ProtocolError::FieldMismatch(name) => {
                write!(f, "field type and value do not agree: {}", name)
            }
            ProtocolError::StructureMismatch { expected, actual } => {
                write!(
                    f,
                    "message structure mismatch: expected {}, got {}",
                    expected, actual
                )
            }
            ProtocolError::InvalidUtf8 => write!(f, "invalid UTF-8"),
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io(e)
    }
}
