//! Agent runtime: the [`Agent`] loop and what it reports.
//!
//! - [`harness::Agent`]: the tool-use loop. Start here.
//! - [`config::AgentConfig`]: retry policy and the optional turn limit.
//! - [`events`]: [`EventHandler`] trait and [`AgentEvent`] enum for
//!   observing the loop. Includes [`LoggingHandler`], [`ConsoleHandler`],
//!   [`CompositeEventHandler`] and [`FnEventHandler`].

pub mod config;
pub mod events;
pub mod harness;

// Re-export commonly used items at the module level.
pub use config::AgentConfig;
pub use events::{
    AgentEvent, CompositeEventHandler, ConsoleHandler, EventHandler, FnEventHandler,
    LoggingHandler, NoopHandler, TaskOutcome,
};
pub use harness::{Agent, AgentError};
