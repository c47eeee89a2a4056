//! Gemini `generateContent` client.
//!
//! Maps the crate's conversation types onto the Gemini REST wire format and
//! classifies failures into [`ServiceError`] so the
//! [`ResilientTransport`](super::ResilientTransport) can pick a retry path.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{GenerateRequest, ModelService, ServiceError, ServiceFuture};
use crate::{ContentPart, FunctionDeclaration, ModelTurn, ToolInvocation, ToolOutput, Turn};

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const RETRY_INFO_TYPE: &str = "type.googleapis.com/google.rpc.RetryInfo";
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Gemini `generateContent` API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client for `model` authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sandbox-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API base (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/models/{}:generateContent", self.model)
    }

    async fn generate_content(&self, request: GenerateRequest<'_>) -> Result<ModelTurn, ServiceError> {
        let body = build_request_body(request);
        debug!(
            "Gemini request: model={}, contents={}, tools={}",
            self.model,
            body.contents.len(),
            request.tools.len()
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Other(format!("request failed: {e}")))?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Other(format!("failed to read response: {e}")))?;

        debug!(
            "Gemini response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(classify_error(status, &text, retry_after.as_deref()));
        }
        parse_response(&text)
    }
}

impl ModelService for GeminiClient {
    fn generate<'a>(&'a self, request: GenerateRequest<'a>) -> ServiceFuture<'a> {
        Box::pin(self.generate_content(request))
    }
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireTool<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug)]
struct WireFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

// ── Mapping ────────────────────────────────────────────────────────

fn build_request_body(request: GenerateRequest<'_>) -> GenerateContentRequest<'_> {
    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![WireTool {
            function_declarations: request.tools,
        }]
    };
    GenerateContentRequest {
        contents: request.conversation.iter().map(turn_to_content).collect(),
        tools,
    }
}

fn turn_to_content(turn: &Turn) -> WireContent {
    match turn {
        Turn::Task(task) => WireContent {
            role: Some("user".into()),
            parts: vec![WirePart {
                text: Some(task.clone()),
                ..Default::default()
            }],
        },
        Turn::Model(model) => WireContent {
            role: Some("model".into()),
            parts: model.parts.iter().map(part_to_wire).collect(),
        },
        Turn::ToolResults(results) => WireContent {
            role: Some("user".into()),
            parts: results.iter().map(tool_output_to_wire).collect(),
        },
    }
}

fn part_to_wire(part: &ContentPart) -> WirePart {
    match part {
        ContentPart::Text(text) => WirePart {
            text: Some(text.clone()),
            ..Default::default()
        },
        ContentPart::ToolInvocation(invocation) => WirePart {
            function_call: Some(WireFunctionCall {
                name: invocation.name.clone(),
                args: Some(serde_json::Value::Object(invocation.args.clone())),
            }),
            ..Default::default()
        },
    }
}

fn tool_output_to_wire(output: &ToolOutput) -> WirePart {
    WirePart {
        function_response: Some(WireFunctionResponse {
            name: output.name.clone(),
            response: serde_json::json!({ "output": output.output }),
        }),
        ..Default::default()
    }
}

fn parse_response(text: &str) -> Result<ModelTurn, ServiceError> {
    let parsed: GenerateContentResponse = serde_json::from_str(text)
        .map_err(|e| ServiceError::Other(format!("failed to parse response: {e}")))?;

    if let Some(ref usage) = parsed.usage_metadata {
        debug!(
            "Token usage: prompt={}, candidates={}, total={}",
            usage.prompt_token_count.unwrap_or(0),
            usage.candidates_token_count.unwrap_or(0),
            usage.total_token_count.unwrap_or(0),
        );
    }

    let Some(candidate) = parsed.candidates.and_then(|c| c.into_iter().next()) else {
        warn!("Gemini returned no candidates; treating the turn as final");
        return Ok(ModelTurn::default());
    };
    if let Some(ref reason) = candidate.finish_reason {
        trace!("Finish reason: {reason}");
    }

    let parts = candidate
        .content
        .unwrap_or_default()
        .parts
        .into_iter()
        .filter(|part| part.thought != Some(true))
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                let args = call.args.unwrap_or(serde_json::Value::Null);
                return Some(ContentPart::ToolInvocation(ToolInvocation::from_json(
                    call.name, args,
                )));
            }
            part.text
                .filter(|text| !text.is_empty())
                .map(ContentPart::Text)
        })
        .collect();

    Ok(ModelTurn::new(parts))
}

// ── Error classification ───────────────────────────────────────────

/// Turn a non-success HTTP response into a [`ServiceError`].
///
/// HTTP 429 or an error status of `RESOURCE_EXHAUSTED` means a quota error.
/// Its retry delay comes from the `RetryInfo` detail when present, then from
/// an integer `Retry-After` header.
pub fn classify_error(status: StatusCode, body: &str, retry_after: Option<&str>) -> ServiceError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = match envelope {
        Some(ref e) if !e.error.message.is_empty() => e.error.message.clone(),
        _ => body.trim().to_string(),
    };

    let exhausted = status == StatusCode::TOO_MANY_REQUESTS
        || envelope
            .as_ref()
            .and_then(|e| e.error.status.as_deref())
            .is_some_and(|s| s == RESOURCE_EXHAUSTED);

    if !exhausted {
        return ServiceError::Other(format!("Gemini API HTTP {status}: {message}"));
    }

    let from_details = envelope.as_ref().and_then(|e| {
        e.error
            .details
            .iter()
            .filter(|d| d.get("@type").and_then(|t| t.as_str()) == Some(RETRY_INFO_TYPE))
            .find_map(|d| d.get("retryDelay").and_then(parse_retry_delay))
    });
    let from_header = retry_after
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    ServiceError::ResourceExhausted {
        message,
        retry_after: from_details.or(from_header),
    }
}

/// Parse a protobuf `Duration` as JSON: `"34s"`, `"1.5s"` or
/// `{"seconds": 34}`. Fractions are floored to whole seconds.
fn parse_retry_delay(value: &serde_json::Value) -> Option<Duration> {
    match value {
        serde_json::Value::String(s) => {
            let secs: f64 = s.trim().strip_suffix('s')?.parse().ok()?;
            (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs(secs.floor() as u64))
        }
        serde_json::Value::Object(map) => {
            let seconds = map.get("seconds")?;
            let secs = seconds
                .as_u64()
                .or_else(|| seconds.as_str().and_then(|s| s.parse().ok()))?;
            Some(Duration::from_secs(secs))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quota_error_reads_retry_info() {
        let body = json!({
            "error": {
                "code": 429,
                "message": "You exceeded your current quota.",
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.QuotaFailure", "violations": []},
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "34s"}
                ]
            }
        })
        .to_string();

        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, &body, None);
        assert_eq!(
            err,
            ServiceError::ResourceExhausted {
                message: "You exceeded your current quota.".into(),
                retry_after: Some(Duration::from_secs(34)),
            }
        );
    }

    #[test]
    fn fractional_and_object_delays_floor_to_seconds() {
        assert_eq!(parse_retry_delay(&json!("1.9s")), Some(Duration::from_secs(1)));
        assert_eq!(parse_retry_delay(&json!({"seconds": 7})), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_delay(&json!({"seconds": "12"})), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_delay(&json!("soon")), None);
        assert_eq!(parse_retry_delay(&json!(3)), None);
    }

    #[test]
    fn quota_error_without_details_uses_retry_after_header() {
        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, "slow down", Some("12"));
        assert_eq!(
            err,
            ServiceError::ResourceExhausted {
                message: "slow down".into(),
                retry_after: Some(Duration::from_secs(12)),
            }
        );
        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, "", None);
        assert!(matches!(
            err,
            ServiceError::ResourceExhausted {
                retry_after: None,
                ..
            }
        ));
    }

    #[test]
    fn resource_exhausted_status_without_429() {
        let body = r#"{"error": {"message": "quota", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_error(StatusCode::FORBIDDEN, body, None).is_resource_exhausted());
    }

    #[test]
    fn other_statuses_are_unexpected() {
        let body = r#"{"error": {"code": 500, "message": "internal", "status": "INTERNAL"}}"#;
        let err = classify_error(StatusCode::INTERNAL_SERVER_ERROR, body, Some("5"));
        assert_eq!(
            err,
            ServiceError::Other("Gemini API HTTP 500 Internal Server Error: internal".into())
        );
    }

    #[test]
    fn request_body_maps_every_turn_kind() {
        let conversation = vec![
            Turn::Task("summarize notes.txt".into()),
            Turn::Model(ModelTurn::new(vec![
                ContentPart::Text("reading".into()),
                ContentPart::ToolInvocation(ToolInvocation::from_json(
                    "read_file",
                    json!({"file_path": "notes.txt"}),
                )),
            ])),
            Turn::ToolResults(vec![ToolOutput::new("read_file", "hello")]),
        ];
        let tools = vec![FunctionDeclaration::new(
            "read_file",
            "Reads a file",
            json!({"type": "object"}),
        )];

        let body = build_request_body(GenerateRequest::new(&conversation, &tools));
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value["contents"],
            json!([
                {"role": "user", "parts": [{"text": "summarize notes.txt"}]},
                {"role": "model", "parts": [
                    {"text": "reading"},
                    {"functionCall": {"name": "read_file", "args": {"file_path": "notes.txt"}}}
                ]},
                {"role": "user", "parts": [
                    {"functionResponse": {"name": "read_file", "response": {"output": "hello"}}}
                ]}
            ])
        );
        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["name"],
            "read_file"
        );
    }

    #[test]
    fn request_without_tools_omits_tools_key() {
        let conversation = vec![Turn::Task("hi".into())];
        let body = build_request_body(GenerateRequest::new(&conversation, &[]));
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn response_parts_keep_order_and_skip_thoughts() {
        let text = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Let me check."},
                    {"functionCall": {"name": "execute_command", "args": {"command": "ls"}}},
                    {"functionCall": {"name": "read_file"}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        })
        .to_string();

        let turn = parse_response(&text).unwrap();
        assert_eq!(turn.texts(), vec!["Let me check."]);
        let calls = turn.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "execute_command");
        assert_eq!(calls[0].args["command"], "ls");
        assert!(calls[1].args.is_empty());
    }

    #[test]
    fn missing_candidates_is_an_empty_final_turn() {
        let turn = parse_response(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(turn.is_final());
        assert!(turn.parts.is_empty());
    }

    #[test]
    fn malformed_body_is_unexpected() {
        assert!(matches!(parse_response("not json"), Err(ServiceError::Other(_))));
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let client = GeminiClient::new("key", "gemini-2.5-pro")
            .unwrap()
            .with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-2.5-pro:generateContent"
        );
        assert_eq!(client.model(), "gemini-2.5-pro");
    }
}
