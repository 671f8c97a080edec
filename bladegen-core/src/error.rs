use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("No generator can implement {0}")]
    Dispatch(String),

    #[error("Domain error: {0}")]
    Domain(String, Option<String>),

    #[error("Dependency cycle: {0}")]
    Cycle(String),

    #[error("Dependency '{0}' failed to generate")]
    DependencyFailed(String),

    #[error("Template error: {0}")]
    Render(String),

    #[error("Invalid algebra description: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenError {
    /// The textual form of the request being processed when the error was raised.
    pub fn request(&self) -> Option<&str> {
        match self {
            Self::Domain(_, request) => request.as_deref(),
            _ => None,
        }
    }

    /// Attach a request description to domain errors that do not carry one yet.
    pub fn in_request(self, request: &str) -> Self {
        match self {
            Self::Domain(message, None) => Self::Domain(message, Some(request.to_string())),
            other => other,
        }
    }

    /// Errors that only report another function's failure.
    pub fn is_secondary(&self) -> bool {
        matches!(self, Self::DependencyFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, GenError>;

#[macro_export]
macro_rules! bail_domain {
    ($($arg:tt)*) => {
        return Err($crate::error::GenError::Domain(format!($($arg)*), None))
    };
}

#[macro_export]
macro_rules! bail_config {
    ($($arg:tt)*) => {
        return Err($crate::error::GenError::Config(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! bail_render {
    ($($arg:tt)*) => {
        return Err($crate::error::GenError::Render(format!($($arg)*)))
    };
}
