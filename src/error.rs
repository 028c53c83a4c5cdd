//! Error types for the packetmatch library
use std::fmt;

/// Result type alias for packetmatch operations
pub type Result<T> = std::result::Result<T, PacketMatchError>;

/// Main error type for packetmatch operations.
///
/// Variants line up with three error kinds: configuration, load, and
/// resource. There is no "runtime transient" variant — matching is total
/// over a well-formed machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketMatchError {
    /// Incompatible flags or machine/dictionary combination, e.g. a
    /// dictionary attached to a non-table-encoded machine.
    Configuration(String),

    /// I/O errors opening or reading a file.
    Io(String),

    /// Memory mapping errors.
    Mmap(String),

    /// Automaton, dictionary, or capture file is malformed.
    Format(String),

    /// A state id (goto, failure, or compressed-path target) is out of
    /// range for the loaded state table — a load-time integrity failure.
    Validation(String),

    /// Allocation or queue-creation failure.
    Resource(String),

    /// General errors.
    Other(String),
}

impl fmt::Display for PacketMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketMatchError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            PacketMatchError::Io(msg) => write!(f, "I/O error: {}", msg),
            PacketMatchError::Mmap(msg) => write!(f, "memory mapping error: {}", msg),
            PacketMatchError::Format(msg) => write!(f, "format error: {}", msg),
            PacketMatchError::Validation(msg) => write!(f, "validation error: {}", msg),
            PacketMatchError::Resource(msg) => write!(f, "resource error: {}", msg),
            PacketMatchError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PacketMatchError {}

impl From<std::io::Error> for PacketMatchError {
    fn from(err: std::io::Error) -> Self {
        PacketMatchError::Io(err.to_string())
    }
}

impl From<String> for PacketMatchError {
    fn from(msg: String) -> Self {
        PacketMatchError::Other(msg)
    }
}

impl From<&str> for PacketMatchError {
    fn from(msg: &str) -> Self {
        PacketMatchError::Other(msg.to_string())
    }
}
