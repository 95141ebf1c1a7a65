//! Chain handlers: logging, text commands, conversation sessions.

mod command_handler;
mod conversation_handler;
mod logging_handler;

pub use command_handler::CommandHandler;
pub use conversation_handler::ConversationHandler;
pub use logging_handler::LoggingHandler;
