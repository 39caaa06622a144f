use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    MissingField(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::MissingField(e) => write!(f, "Missing configuration field: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failure of a media-server lookup call. Callers recover with fallback
/// values where one is defined; a failed session-snapshot fetch aborts the
/// current poll cycle only.
#[derive(Debug)]
pub enum LookupError {
    HttpError(String),
    StatusError(u16),
    DecodeError(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::HttpError(e) => write!(f, "HTTP request failed: {}", e),
            LookupError::StatusError(code) => write!(f, "Unexpected HTTP status: {}", code),
            LookupError::DecodeError(e) => write!(f, "Response decoding failed: {}", e),
        }
    }
}

impl std::error::Error for LookupError {}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(String),
    WriteFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}
