// indexkeeper CLI library

pub mod action_file;
pub mod cluster;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod router;
pub mod settings;

pub use action_file::{ActionFile, ActionStep, SelectionSpec, StepResult};
pub use cluster::HttpManagementApi;
pub use error::{CliError, CliResult};
pub use logging::init_logging;
pub use router::{Cli, CommandRouter, Commands};
pub use settings::Settings;
