//! Turning raw model text into a stage object.
//!
//! JSON recovery is delegated to [`quill_llm::extract_json_object`]; this
//! module validates the recovered object against the stage protocol.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog::{ToolInvocation, ToolName};
use crate::error::ParseError;
use crate::stage::Stage;

/// Keys accepted for the tool invocation, in lookup order.
const INVOCATION_KEYS: [&str; 3] = ["toolInvocation", "toolCall", "tool_call"];

/// A validated stage object from one model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReply {
    pub stage: Stage,
    pub thought: String,
    pub content: String,
    pub next_stage: Stage,
    pub tool_invocation: Option<ToolInvocation>,
}

/// Parse one model reply.
///
/// `stage` and `content` are required. `thought` defaults to the stage name
/// and a missing or unrecognized `nextStage` falls back to
/// [`Stage::default_next`]. A tool invocation naming an unknown tool is an
/// error on `toolUsed` turns and dropped otherwise.
pub fn parse_stage_reply(text: &str) -> Result<StageReply, ParseError> {
    let extracted = quill_llm::extract_json_object(text).ok_or(ParseError::NoJson)?;
    debug!(strategy = extracted.strategy.name(), "Extracted stage object");
    let object = extracted.object;

    let raw_stage = string_field(&object, &["stage"]).ok_or(ParseError::MissingField("stage"))?;
    let stage = Stage::parse_lenient(&raw_stage)
        .ok_or_else(|| ParseError::UnknownStage(raw_stage.clone()))?;

    let content = match object.get("content") {
        None | Some(Value::Null) => return Err(ParseError::MissingField("content")),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let thought = string_field(&object, &["thought"])
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| stage.as_str().to_string());

    let next_stage = match string_field(&object, &["nextStage", "next_stage"]) {
        Some(raw) => Stage::parse_lenient(&raw).unwrap_or_else(|| {
            warn!(next_stage = %raw, "Unrecognized nextStage, using default transition");
            stage.default_next()
        }),
        None => stage.default_next(),
    };

    let tool_invocation = match parse_invocation(&object) {
        Ok(invocation) => invocation,
        Err(e) if stage == Stage::ToolUsed => return Err(e),
        Err(e) => {
            warn!(stage = %stage, error = %e, "Ignoring invalid tool invocation outside toolUsed");
            None
        }
    };

    Ok(StageReply {
        stage,
        thought,
        content,
        next_stage,
        tool_invocation,
    })
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn parse_invocation(object: &Map<String, Value>) -> Result<Option<ToolInvocation>, ParseError> {
    let Some(raw) = INVOCATION_KEYS.iter().find_map(|k| object.get(*k)) else {
        return Ok(None);
    };
    let Value::Object(fields) = raw else {
        return Ok(None);
    };

    let name = string_field(fields, &["tool", "name"]).ok_or(ParseError::MissingField("tool"))?;
    let tool: ToolName = name.parse()?;
    let args = fields
        .get("args")
        .or_else(|| fields.get("arguments"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let description = string_field(fields, &["description"]).unwrap_or_default();

    Ok(Some(ToolInvocation {
        tool,
        args,
        description,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_formed_in_prose() {
        let text = r#"Okay, here you go:
{"stage": "planning", "thought": "look first", "content": "1. read doc", "nextStage": "reasoning"}
Let me know!"#;
        let reply = parse_stage_reply(text).unwrap();
        assert_eq!(
            reply,
            StageReply {
                stage: Stage::Planning,
                thought: "look first".to_string(),
                content: "1. read doc".to_string(),
                next_stage: Stage::Reasoning,
                tool_invocation: None,
            }
        );
    }

    #[test]
    fn test_fenced_object_round_trips() {
        let text = "```json\n{\"stage\": \"summary\", \"thought\": \"t\", \"content\": \"All done\", \"nextStage\": \"done\"}\n```";
        let reply = parse_stage_reply(text).unwrap();
        assert_eq!(reply.stage, Stage::Summary);
        assert_eq!(reply.content, "All done");
        assert_eq!(reply.next_stage, Stage::Done);
    }

    #[test]
    fn test_fence_in_content_is_not_unwrapped() {
        let text = r#"{"stage":"summary","thought":"t","content":"Wrapped the snippet in ```rust``` fences","nextStage":"done"}"#;
        let reply = parse_stage_reply(text).unwrap();
        assert_eq!(reply.content, "Wrapped the snippet in ```rust``` fences");
        assert_eq!(reply.next_stage, Stage::Done);

        let text = r#"{
  "stage": "toolUsed",
  "content": "Appending the install section",
  "toolInvocation": {
    "tool": "appendDocumentContent",
    "args": {"html": "<pre>```bash\ncargo install quill\n```</pre>"}
  }
}"#;
        let reply = parse_stage_reply(text).unwrap();
        let invocation = reply.tool_invocation.unwrap();
        assert_eq!(invocation.tool, ToolName::AppendDocumentContent);
        assert!(invocation.args["html"].as_str().unwrap().contains("```bash"));
    }

    #[test]
    fn test_trailing_commas() {
        let text = r#"{"stage": "reasoning", "content": "x", "nextStage": "toolUsed",}"#;
        assert_eq!(parse_stage_reply(text).unwrap().next_stage, Stage::ToolUsed);
    }

    #[test]
    fn test_defaults() {
        let reply = parse_stage_reply(r#"{"stage": "toolUsed", "content": "c", "toolInvocation": {"tool": "readDocumentContent"}}"#).unwrap();
        assert_eq!(reply.thought, "toolUsed");
        assert_eq!(reply.next_stage, Stage::Reasoning);
        assert_eq!(reply.tool_invocation.unwrap().args, json!({}));

        let reply = parse_stage_reply(r#"{"stage": "summary", "content": "s", "nextStage": "???"}"#).unwrap();
        assert_eq!(reply.next_stage, Stage::Done);
    }

    #[test]
    fn test_non_string_content_is_stringified() {
        let reply = parse_stage_reply(r#"{"stage": "planning", "content": ["a", "b"]}"#).unwrap();
        assert_eq!(reply.content, r#"["a","b"]"#);
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            parse_stage_reply(r#"{"content": "x"}"#).unwrap_err(),
            ParseError::MissingField("stage")
        );
        assert_eq!(
            parse_stage_reply(r#"{"stage": "planning"}"#).unwrap_err(),
            ParseError::MissingField("content")
        );
        assert_eq!(
            parse_stage_reply(r#"{"stage": "pondering", "content": "x"}"#).unwrap_err(),
            ParseError::UnknownStage("pondering".to_string())
        );
        assert_eq!(parse_stage_reply("no json at all").unwrap_err(), ParseError::NoJson);
    }

    #[test]
    fn test_invocation_aliases() {
        let reply = parse_stage_reply(
            r#"{"stage": "tool_used", "content": "c", "tool_call": {"tool": "searchDocumentContent", "args": {"query": "intro"}, "description": "find intro"}}"#,
        )
        .unwrap();
        let invocation = reply.tool_invocation.unwrap();
        assert_eq!(invocation.tool, ToolName::SearchDocumentContent);
        assert_eq!(invocation.args, json!({"query": "intro"}));
        assert_eq!(invocation.description, "find intro");
    }

    #[test]
    fn test_unknown_tool() {
        let text = r#"{"stage": "toolUsed", "content": "c", "toolInvocation": {"tool": "dropTables"}}"#;
        assert_eq!(
            parse_stage_reply(text).unwrap_err(),
            ParseError::UnknownTool("dropTables".to_string())
        );

        // Outside toolUsed the bad invocation is dropped.
        let text = r#"{"stage": "reasoning", "content": "c", "toolInvocation": {"tool": "dropTables"}}"#;
        assert!(parse_stage_reply(text).unwrap().tool_invocation.is_none());
    }

    #[test]
    fn test_first_valid_line_wins() {
        let text = "{\"stage\": \"planning\" \"content\": \"broken\"}\n{\"stage\": \"reasoning\", \"content\": \"ok\"}";
        let reply = parse_stage_reply(text).unwrap();
        assert_eq!(reply.stage, Stage::Reasoning);
    }
}
