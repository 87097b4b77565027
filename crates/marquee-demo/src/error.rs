use thiserror::Error;

use marquee_core::ConfigError;
use marquee_runtime::ConfigLoadError;

pub type Result<T> = std::result::Result<T, DemoError>;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not load configuration: {0}")]
    Config(#[from] ConfigLoadError),

    #[error("invalid stage: {0}")]
    Stage(#[from] ConfigError),

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("could not install logger: {message}")]
    Logging { message: String },
}

impl DemoError {
    /// Process exit code: 2 for bad input, 1 for everything else.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Stage(_) | Self::InvalidArgument { .. } => 2,
            Self::Io(_) | Self::Logging { .. } => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DemoError;
    use marquee_core::ConfigError;

    #[test]
    fn bad_input_exits_with_two() {
        assert_eq!(DemoError::invalid("nope").exit_code(), 2);
        assert_eq!(DemoError::from(ConfigError::EmptyTable).exit_code(), 2);
    }

    #[test]
    fn io_exits_with_one() {
        let error = DemoError::from(std::io::Error::other("pipe closed"));
        assert_eq!(error.exit_code(), 1);
        assert_eq!(error.to_string(), "I/O error: pipe closed");
    }

    #[test]
    fn stage_errors_keep_the_cause() {
        let error = DemoError::from(ConfigError::UnknownCategory { key: "Music".into() });
        assert_eq!(error.to_string(), "invalid stage: unknown category: Music");
    }
}
