//! Minimal tool-use agent for the Gemini API, confined to one working directory.
//!
//! `sandbox-agent` lets a model read files, write files, and run shell
//! commands inside a single directory (the *sandbox root*), while riding out
//! rate limits and flaky networks. The core is the
//! [`Agent`](agent::harness::Agent) loop: send the task, execute any tool
//! invocations the model returns, feed the results back, and stop once a
//! model turn contains no tool invocation.
//!
//! # Getting started
//!
//! ```ignore
//! use sandbox_agent::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GeminiClient::new(std::env::var("GEMINI_API_KEY")?, DEFAULT_MODEL)?;
//!     let tools = ToolSet::new(PathSandbox::new(".")?);
//!
//!     let outcome = Agent::new(&client, &tools, AgentConfig::default())
//!         .with_event_handler(&ConsoleHandler)
//!         .run_task("Summarize notes.txt into summary.txt")
//!         .await?;
//!
//!     println!("{}", outcome.text());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Agent`](agent::harness::Agent) loop, config, events and handlers |
//! | [`tools`] | [`ToolSet`](tools::core::ToolSet) dispatch and the three file/shell operations |
//! | [`sandbox`] | [`PathSandbox`](sandbox::PathSandbox) path containment checks |
//! | [`api`] | [`ModelService`](api::ModelService) boundary, Gemini client, retry transport |
//! | [`config`] | [`Settings`](config::Settings) surface shared by the CLI and embedders |
//!
//! # Conversation model
//!
//! A run is an ordered list of [`Turn`]s. The task opens the conversation,
//! every [`ModelTurn`] is followed either by a [`Turn::ToolResults`] batch
//! (when it contained tool invocations) or by nothing (when it was final).

pub mod agent;
pub mod api;
pub mod config;
pub mod prelude;
pub mod sandbox;
pub mod tools;

use schemars::JsonSchema;
use serde::Serialize;

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a function-declaration parameter schema from a type that
/// implements `schemars::JsonSchema`.
///
/// Gemini accepts an OpenAPI subset, so the draft-level `$schema` and
/// `title` keys are removed.
///
/// ```
/// use sandbox_agent::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct ReadArgs {
///     file_path: String,
/// }
///
/// let schema = json_schema_for::<ReadArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema.get("$schema").is_none());
/// assert!(schema["required"].as_array().unwrap().contains(&"file_path".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

// ── Conversation types ─────────────────────────────────────────────

/// Argument map attached to a tool invocation. Keys are unique by
/// construction.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// A structured request, embedded in a model turn, to run a named tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub args: ToolArguments,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, args: ToolArguments) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build an invocation from a JSON object literal. Non-object values
    /// produce an empty argument map.
    pub fn from_json(name: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map,
            _ => ToolArguments::new(),
        };
        Self::new(name, args)
    }
}

/// One piece of a model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    ToolInvocation(ToolInvocation),
}

/// A turn produced by the model service.
///
/// A turn with at least one [`ContentPart::ToolInvocation`] is a tool-call
/// turn; anything else (text only, or empty) is final.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub parts: Vec<ContentPart>,
}

impl ModelTurn {
    pub fn new(parts: Vec<ContentPart>) -> Self {
        Self { parts }
    }

    /// A final turn holding a single text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentPart::Text(text.into())])
    }

    /// A tool-call turn holding the given invocations, in order.
    pub fn tool_calls(invocations: Vec<ToolInvocation>) -> Self {
        Self::new(
            invocations
                .into_iter()
                .map(ContentPart::ToolInvocation)
                .collect(),
        )
    }

    /// Tool invocations in the order they appear.
    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolInvocation(invocation) => Some(invocation),
                ContentPart::Text(_) => None,
            })
            .collect()
    }

    /// Text parts in the order they appear.
    pub fn texts(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::ToolInvocation(_) => None,
            })
            .collect()
    }

    pub fn is_final(&self) -> bool {
        !self
            .parts
            .iter()
            .any(|part| matches!(part, ContentPart::ToolInvocation(_)))
    }
}

/// The string result of one tool invocation, tagged with the tool name it
/// answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub name: String,
    pub output: String,
}

impl ToolOutput {
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
        }
    }
}

/// One exchange unit of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// The task string that opens the conversation.
    Task(String),
    /// A turn produced by the model service.
    Model(ModelTurn),
    /// All tool results for the preceding model turn, in invocation order.
    ToolResults(Vec<ToolOutput>),
}

/// Tool definition sent to the model service.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl FunctionDeclaration {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
