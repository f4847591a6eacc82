//! Chat-completions wire format.
//!
//! Pure translation between [`BackendRequest`] / [`BackendResponse`] and the
//! JSON the service speaks. Kept free of I/O so it can be tested directly.

use std::time::Duration;

use pipeline::{
    render_context, BackendError, BackendRequest, BackendResponse, ToolCallId, ToolName,
    ToolOutcome, ToolRequest, ToolSchema,
};
use serde::Deserialize;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Builds the JSON body for one round-trip.
///
/// The conversation is rebuilt from scratch every time: persona as the system
/// message, the task as the user message, then one assistant/tool message
/// pair per tool exchange so far.
pub fn build_body(request: &BackendRequest) -> Value {
    let mut messages = vec![
        json!({ "role": "system", "content": system_prompt(request) }),
        json!({ "role": "user", "content": task_prompt(request) }),
    ];

    for exchange in &request.exchanges {
        let call = &exchange.request;
        messages.push(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": call.id.as_str(),
                "type": "function",
                "function": {
                    "name": call.tool.as_str(),
                    "arguments": call.arguments.to_string(),
                }
            }]
        }));
        messages.push(json!({
            "role": "tool",
            "tool_call_id": call.id.as_str(),
            "content": outcome_content(&exchange.outcome),
        }));
    }

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(request.tools.iter().map(tool_definition).collect());
        body["tool_choice"] = json!("auto");
    }
    body
}

fn system_prompt(request: &BackendRequest) -> String {
    let mut prompt = format!("You are {}.\nYour goal: {}", request.role, request.goal);
    if !request.backstory.trim().is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&request.backstory);
    }
    prompt
}

fn task_prompt(request: &BackendRequest) -> String {
    let mut prompt = request.description.clone();
    if !request.expected_output.trim().is_empty() {
        prompt.push_str("\n\nExpected output: ");
        prompt.push_str(&request.expected_output);
    }
    if !request.context.is_empty() {
        prompt.push_str("\n\nContext from previous tasks:\n\n");
        prompt.push_str(&render_context(&request.context));
    }
    prompt
}

fn tool_definition(schema: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": schema.name.as_str(),
            "description": schema.description,
            "parameters": schema.parameters,
        }
    })
}

fn outcome_content(outcome: &ToolOutcome) -> String {
    match outcome {
        ToolOutcome::Success { value } => value.to_string(),
        ToolOutcome::Failed { message } => json!({ "error": message }).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Interprets a successful (2xx) response body.
///
/// A malformed body is a [`BackendError::Rejected`]: re-sending the same
/// request would not fix it.
pub fn parse_response(body: &str) -> Result<BackendResponse, BackendError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::rejected(format!("unparseable response: {e}")))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| BackendError::rejected("response contains no choices"))?;

    if !message.tool_calls.is_empty() {
        return message
            .tool_calls
            .into_iter()
            .map(tool_request)
            .collect::<Result<Vec<_>, _>>()
            .map(BackendResponse::ToolCalls);
    }

    message
        .content
        .map(BackendResponse::FinalAnswer)
        .ok_or_else(|| BackendError::rejected("response has neither content nor tool calls"))
}

fn tool_request(call: ChatToolCall) -> Result<ToolRequest, BackendError> {
    let id = ToolCallId::new(call.id)
        .ok_or_else(|| BackendError::rejected("tool call without an id"))?;
    let tool = ToolName::new(call.function.name)
        .ok_or_else(|| BackendError::rejected(format!("tool call '{id}' names no tool")))?;

    // Unparseable arguments are passed through as a string; the tool rejects
    // them and the worker sees why.
    let arguments = if call.function.arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&call.function.arguments)
            .unwrap_or(Value::String(call.function.arguments))
    };

    Ok(ToolRequest {
        id,
        tool,
        arguments,
    })
}

// ---------------------------------------------------------------------------
// Status classification
// ---------------------------------------------------------------------------

/// Maps a non-success HTTP status to a backend error.
///
/// Rate limits, request timeouts, and server errors are transient; every
/// other client error is a rejection.
pub fn classify_status(status: u16, retry_after: Option<Duration>, body: &str) -> BackendError {
    let message = format!("HTTP {status}: {}", truncate(body, 500));
    match status {
        408 | 429 | 500..=599 => BackendError::Unavailable {
            message,
            retry_after,
        },
        _ => BackendError::Rejected { message },
    }
}

/// Parses a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
