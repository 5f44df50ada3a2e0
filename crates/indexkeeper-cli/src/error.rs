// CLI error types

use indexkeeper_actions::ActionError;
use indexkeeper_http::HttpError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Action file error: {0}")]
    ActionFile(String),

    #[error("Transport error: {0}")]
    Http(#[from] HttpError),

    #[error("{0}")]
    Action(#[from] ActionError),

    #[error("Step {step} ({action}) failed: {source}")]
    Step {
        step: usize,
        action: String,
        #[source]
        source: ActionError,
    },
}

impl From<config::ConfigError> for CliError {
    fn from(e: config::ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(e: serde_yaml::Error) -> Self {
        CliError::ActionFile(e.to_string())
    }
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!(
                    "Invalid argument: {}\n\nRun 'ikeep --help' for usage information.",
                    message
                )
            }
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(msg) => {
                format!(
                    "Configuration error: {}\n\nCheck indexkeeper.toml and INDEXKEEPER_* environment variables.",
                    msg
                )
            }
            CliError::ActionFile(msg) => format!("Could not read action file: {}", msg),
            CliError::Http(e) => {
                format!("Could not set up the cluster connection: {}", e)
            }
            CliError::Action(e) => describe_action_error(e),
            CliError::Step {
                step,
                action,
                source,
            } => format!(
                "Action {} ({}) failed; later actions were not run.\n{}",
                step,
                action,
                describe_action_error(source)
            ),
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }

    /// Whether the error only reports an empty index selection
    pub fn is_empty_selection(&self) -> bool {
        matches!(
            self,
            CliError::Action(ActionError::EmptySelection(_))
                | CliError::Step {
                    source: ActionError::EmptySelection(_),
                    ..
                }
        )
    }
}

fn describe_action_error(error: &ActionError) -> String {
    let hint = match error {
        ActionError::Configuration(_) => "\n\nCheck the action options.",
        ActionError::DependencyMissing(_) => {
            "\n\nCheck that the repository and snapshot exist ('ikeep repository show')."
        }
        ActionError::Conflict(_) => "\n\nWait for the running operation to finish and retry.",
        ActionError::EmptySelection(_) => {
            "\n\nPass --ignore-empty-list to treat this as success."
        }
        _ => "",
    };
    format!("[{}] {}{}", error.kind(), error, hint)
}

pub type CliResult<T> = Result<T, CliError>;
