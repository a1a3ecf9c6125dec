//! History normalization.
//!
//! Every stored or incoming history entry passes through [`normalize`]
//! exactly once; everything downstream works on [`CanonicalMessage`].

use serde_json::Value;
use turnstile_core::message::{CanonicalMessage, MessageContent, MessageToolCall, RawMessage};

/// Normalize one history entry. `None` means the entry is dropped.
pub fn normalize(raw: &RawMessage) -> Option<CanonicalMessage> {
    match raw {
        RawMessage::Canonical(CanonicalMessage::Tool { tool_call_id, name, .. })
            if tool_call_id.is_empty() || name.is_empty() =>
        {
            let text = serde_json::to_string(raw).unwrap_or_default();
            Some(CanonicalMessage::user(text))
        }
        RawMessage::Canonical(message) => Some(message.clone()),
        RawMessage::Record(value) => normalize_value(value),
    }
}

/// Normalize an arbitrary JSON value.
///
/// Objects are read as records keyed by `type` (or `role`) and `content`.
/// A record without content is dropped unless it is an assistant turn,
/// which may carry tool calls and no text. Anything unrecognised becomes a
/// User message holding its JSON text.
pub fn normalize_value(value: &Value) -> Option<CanonicalMessage> {
    let map = match value {
        Value::Null => return None,
        Value::String(text) => return Some(CanonicalMessage::user(text.as_str())),
        Value::Object(map) => map,
        other => return Some(CanonicalMessage::user(other.to_string())),
    };

    let content = map.get("content").filter(|c| !c.is_null());
    let kind = map
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| map.get("role").and_then(Value::as_str));
    let is_assistant = matches!(kind, Some("ai" | "assistant"));

    if content.is_none() && !is_assistant {
        return None;
    }

    let message = match kind {
        Some("human" | "user") => CanonicalMessage::User {
            content: user_content(content),
        },
        Some("ai" | "assistant") => CanonicalMessage::Assistant {
            content: plain_text(content),
            tool_calls: map
                .get("tool_calls")
                .and_then(Value::as_array)
                .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
                .unwrap_or_default(),
        },
        Some("tool" | "tool_message") => {
            let call_id = non_empty_str(map.get("tool_call_id"));
            let name = non_empty_str(map.get("name")).or_else(|| non_empty_str(map.get("tool_name")));
            match (call_id, name) {
                (Some(call_id), Some(name)) => {
                    CanonicalMessage::tool(plain_text(content), call_id, name)
                }
                _ => CanonicalMessage::user(value.to_string()),
            }
        }
        Some("system") => CanonicalMessage::system(plain_text(content)),
        _ => CanonicalMessage::user(value.to_string()),
    };
    Some(message)
}

/// Normalize a whole history, preserving order and dropping empty entries.
pub fn normalize_history(raw: &[RawMessage]) -> Vec<CanonicalMessage> {
    raw.iter().filter_map(normalize).collect()
}

/// The flattened text of a User message; empty for every other variant.
pub fn extract_user_text(message: &CanonicalMessage) -> String {
    message.user_text()
}

fn user_content(content: Option<&Value>) -> MessageContent {
    match content {
        None => MessageContent::Text(String::new()),
        Some(Value::String(text)) => MessageContent::Text(text.clone()),
        Some(Value::Array(parts)) => MessageContent::Parts(parts.clone()),
        Some(other) => MessageContent::Text(other.to_string()),
    }
}

fn plain_text(content: Option<&Value>) -> String {
    match content {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => MessageContent::Parts(parts.clone()).flatten(),
        Some(other) => other.to_string(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Accepts both `{id, name, args}` and `{id, function: {name, arguments}}`.
fn parse_tool_call(value: &Value) -> Option<MessageToolCall> {
    let function = value.get("function");
    let name = value
        .get("name")
        .or_else(|| function.and_then(|f| f.get("name")))
        .and_then(Value::as_str)?;
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("args"))
        .or_else(|| function.and_then(|f| f.get("arguments")));
    let arguments = match arguments {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Some(MessageToolCall {
        id: value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: name.to_string(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawMessage {
        RawMessage::Record(value)
    }

    #[test]
    fn canonical_input_is_unchanged() {
        let messages = vec![
            CanonicalMessage::user("hi"),
            CanonicalMessage::assistant("hello"),
            CanonicalMessage::tool("3", "call_1", "count_records"),
            CanonicalMessage::system("rules"),
        ];
        for message in messages {
            let once = normalize(&RawMessage::Canonical(message.clone())).unwrap();
            assert_eq!(once, message);
            let twice = normalize(&RawMessage::Canonical(once.clone())).unwrap();
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn deserialized_tool_without_ids_falls_back_to_user() {
        let value = json!({"role": "tool", "content": "42", "tool_call_id": "", "name": ""});
        let raw: RawMessage = serde_json::from_value(value.clone()).unwrap();
        assert!(matches!(raw, RawMessage::Canonical(CanonicalMessage::Tool { .. })));

        let message = normalize(&raw).unwrap();
        assert!(message.is_user());
        assert!(message.user_text().contains("\"role\":\"tool\""));
        assert!(message.user_text().contains("42"));
        assert!(normalize_value(&value).unwrap().is_user());
    }

    #[test]
    fn human_and_ai_records() {
        let user = normalize(&record(json!({"type": "human", "content": "List plans"}))).unwrap();
        assert_eq!(user, CanonicalMessage::user("List plans"));

        let ai = normalize(&record(json!({
            "type": "ai",
            "content": null,
            "tool_calls": [{"id": "call_1", "name": "run_query", "args": {"q": "plans"}}]
        })))
        .unwrap();
        assert!(ai.is_assistant());
        assert_eq!(ai.text(), "");
        assert_eq!(ai.tool_calls()[0].name, "run_query");
        assert_eq!(ai.tool_calls()[0].arguments, r#"{"q":"plans"}"#);
    }

    #[test]
    fn openai_style_tool_calls_are_read() {
        let ai = normalize_value(&json!({
            "role": "assistant",
            "tool_calls": [{"id": "c9", "type": "function",
                "function": {"name": "knowledge_lookup", "arguments": "{}"}}]
        }))
        .unwrap();
        assert_eq!(ai.tool_calls()[0].name, "knowledge_lookup");
        assert_eq!(ai.tool_calls()[0].arguments, "{}");
    }

    #[test]
    fn record_without_content_is_dropped() {
        assert!(normalize_value(&json!({"type": "human"})).is_none());
        assert!(normalize_value(&json!({"role": "system", "content": null})).is_none());
        assert!(normalize_value(&json!({"role": "assistant"})).is_some());
    }

    #[test]
    fn tool_record_requires_id_and_name() {
        let full = normalize_value(&json!({
            "type": "tool", "content": "42", "tool_call_id": "call_1", "tool_name": "count"
        }))
        .unwrap();
        assert_eq!(full, CanonicalMessage::tool("42", "call_1", "count"));

        let missing_name = json!({"type": "tool", "content": "42", "tool_call_id": "call_1"});
        let degraded = normalize_value(&missing_name).unwrap();
        assert!(degraded.is_user());
        assert!(degraded.user_text().contains("call_1"));
        assert!(degraded.user_text().contains("42"));
    }

    #[test]
    fn unknown_shapes_become_user_text() {
        let msg = normalize_value(&json!({"type": "function", "content": "x"})).unwrap();
        assert!(msg.is_user());
        assert!(msg.user_text().contains("function"));

        assert_eq!(normalize_value(&json!(17)).unwrap().user_text(), "17");
        assert_eq!(normalize_value(&json!("plain")).unwrap().user_text(), "plain");
        assert!(normalize_value(&Value::Null).is_none());
    }

    #[test]
    fn multipart_user_content_is_kept() {
        let msg = normalize_value(&json!({
            "role": "user",
            "content": [{"type": "text", "text": "Compare"}, "prices"]
        }))
        .unwrap();
        assert_eq!(extract_user_text(&msg), "Compare prices");
    }

    #[test]
    fn history_keeps_order_and_drops_empties() {
        let history = vec![
            record(json!({"type": "human", "content": "one"})),
            record(json!({"type": "human"})),
            RawMessage::Canonical(CanonicalMessage::assistant("two")),
        ];
        let normalized = normalize_history(&history);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].user_text(), "one");
        assert_eq!(normalized[1].text(), "two");
    }
}
