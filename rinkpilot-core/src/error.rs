use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted network parameters are missing, unreadable or do not
    /// match the declared architecture. Fatal at construction.
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Image or telemetry input is malformed (wrong channel count, empty
    /// frame, non-finite vectors).
    #[error("Input shape error: {0}")]
    InputShape(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ModelLoad("planner.bin missing".to_string());
        assert!(err.to_string().contains("Model load error"));
        assert!(err.to_string().contains("planner.bin"));

        let err = Error::InputShape("expected 3 channels, got 4".to_string());
        assert!(err.to_string().starts_with("Input shape error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
