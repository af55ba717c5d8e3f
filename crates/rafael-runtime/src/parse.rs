//! Tool-call extraction from raw backend output.

use rafael_core::tools::ToolCall;
use serde_json::Value;

/// Parse a backend response as a tool call.
///
/// Only a JSON object with a non-empty string `tool` and an object `params`
/// counts. Anything else, conversational text included, is `None`: the run
/// treats that as an implicit completion, not an error. Unknown tool names
/// still parse so the step can be recorded and reported.
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(content.trim()) else {
        return None;
    };
    let tool = match obj.remove("tool") {
        Some(Value::String(tool)) if !tool.is_empty() => tool,
        _ => return None,
    };
    let Some(Value::Object(params)) = obj.remove("params") else {
        return None;
    };
    Some(ToolCall { tool, params })
}
