//! The agent's tools: reading files, writing files, and running commands.
//!
//! All three are bound to one [`PathSandbox`](crate::sandbox::PathSandbox)
//! root and never fail: every error comes back as a result string.
//!
//! # Submodules
//!
//! - [`names`]: the closed [`ToolName`] set and its wire names.
//! - [`common`]: the three operations, plus command screening.
//! - [`core`]: [`ToolSet`], which declares the tools to the model and
//!   dispatches invocations to [`common`].

pub mod common;
pub mod core;
pub mod names;

// Re-export commonly used items at the module level.
pub use common::{CommandRejection, execute_command, read_file, screen_command, write_file};
pub use core::{DispatchError, ToolCall, ToolSet};
pub use names::ToolName;
