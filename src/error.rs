use std::fmt;

#[derive(Debug)]
pub enum MulticolError {
    /// Fill or measurement was requested before a FitChecker was attached.
    NotAttached,
    /// Input HTML could not be turned into a usable fragment tree.
    MalformedInput(String),
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for MulticolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MulticolError::NotAttached => {
                write!(f, "filler is not attached to a measurable surface")
            }
            MulticolError::MalformedInput(message) => {
                write!(f, "malformed input fragment: {}", message)
            }
            MulticolError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            MulticolError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for MulticolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MulticolError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MulticolError {
    fn from(value: std::io::Error) -> Self {
        MulticolError::Io(value)
    }
}
