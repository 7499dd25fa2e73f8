pub mod command;
pub mod command_handler;
pub mod consumer;
pub mod context;
pub mod error;
pub mod executor;
pub mod message;

pub use consumer::{CommandConsumer, CommandResultSender};
pub use context::{CommandExecutionContext, TrackedAggregate};
pub use executor::{CommandExecutor, CommandExecutorConfig, DefaultCommandExecutor};
pub use message::{CommandMessage, CommandResult, CommandStatus};
