//! Canonical tool names.
//!
//! Every tool-name string literal goes through these constants or
//! [`ToolName`]. When a tool is renamed, only this file needs to change.

use std::fmt;
use std::str::FromStr;

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const EXECUTE_COMMAND: &str = "execute_command";

/// The closed set of tools the agent can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ReadFile,
    WriteFile,
    ExecuteCommand,
}

impl ToolName {
    /// All tools, in declaration order.
    pub const ALL: [ToolName; 3] = [
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::ExecuteCommand,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ReadFile => READ_FILE,
            ToolName::WriteFile => WRITE_FILE,
            ToolName::ExecuteCommand => EXECUTE_COMMAND,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a name is not one of [`ToolName::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tool: {0}")]
pub struct UnknownToolName(pub String);

impl FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| UnknownToolName(name.to_string()))
    }
}
