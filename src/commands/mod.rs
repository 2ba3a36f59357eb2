//! The subcommands of `tally`. `aggregate` is also what the MCP tool calls.

mod aggregate;
mod init;
mod mcp;

use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use aggregate::{aggregate, Console};
pub use init::init;
pub use mcp::mcp;

/// What a command hands back: a line for the user plus, for commands that produce one, a
/// serializable result. The CLI logs it and the MCP server returns it as tool content.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// One-line summary of what happened.
    message: String,

    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// An output carrying `structure`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// An output with only a message.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Logs the message at info level and the structure, as pretty JSON, at debug level.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}
