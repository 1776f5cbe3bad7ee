use serde::Deserialize;
use serde_json::Value;

use crate::budget::TokenUsage;

/// Events from the agent CLI's stream-json output format
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Incremental text
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: Delta },

    /// A full message: text and tool-use segments plus a usage snapshot
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    /// Terminal record with the final text and cumulative usage
    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        usage: Option<Usage>,
    },

    #[serde(rename = "system")]
    System {
        #[serde(default)]
        subtype: String,
    },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct Delta {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Other,
}

/// Usage block as reported by the agent CLI
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        TokenUsage::new(u.input_tokens, u.output_tokens, u.cache_read_input_tokens)
    }
}

impl StreamEvent {
    /// Parse one NDJSON line. Blank and malformed lines yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable stream line");
                None
            }
        }
    }

    /// Every text segment carried by this event.
    pub fn text_segments(&self) -> Vec<&str> {
        match self {
            StreamEvent::ContentBlockDelta { delta } if delta.kind == "text_delta" => {
                vec![delta.text.as_str()]
            }
            StreamEvent::Assistant { message, .. } => message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            StreamEvent::Result {
                result: Some(text), ..
            } => vec![text.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Extract a human-readable description from a tool use event
pub fn describe_tool_use(name: &str, input: &Value) -> String {
    let str_field = |key: &str| input.get(key).and_then(|v| v.as_str());
    match name {
        "Read" => format!(
            "Reading: {}",
            str_field("file_path").map_or_else(|| "file".to_string(), shorten_path)
        ),
        "Write" => format!(
            "Creating: {}",
            str_field("file_path").map_or_else(|| "file".to_string(), shorten_path)
        ),
        "Edit" => format!(
            "Editing: {}",
            str_field("file_path").map_or_else(|| "file".to_string(), shorten_path)
        ),
        "Bash" => format!(
            "Running: {}",
            str_field("command").map_or_else(|| "command".to_string(), |s| truncate_str(s, 40))
        ),
        "Glob" => format!("Searching: {}", str_field("pattern").unwrap_or("*")),
        "Grep" => format!(
            "Grep: {}",
            str_field("pattern").map_or_else(|| "pattern".to_string(), |s| truncate_str(s, 30))
        ),
        "Task" => format!("Agent: {}", str_field("description").unwrap_or("subagent")),
        "WebFetch" => format!("Fetching: {}", str_field("url").unwrap_or("url")),
        "WebSearch" => format!("Searching web: {}", str_field("query").unwrap_or("query")),
        _ => name.to_string(),
    }
}

/// Get an emoji for a tool
pub fn tool_emoji(name: &str) -> &'static str {
    match name {
        "Read" => "\u{1F4D6}",
        "Write" => "\u{1F4DD}",
        "Edit" => "\u{270F}\u{FE0F}",
        "Bash" => "\u{2699}\u{FE0F}",
        "Glob" => "\u{1F50D}",
        "Grep" => "\u{1F50E}",
        "Task" => "\u{1F916}",
        "WebFetch" | "WebSearch" => "\u{1F310}",
        _ => "\u{1F527}",
    }
}

/// Shorten a file path to just the last 2 components
fn shorten_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        path.to_string()
    } else {
        parts[parts.len() - 2..].join("/")
    }
}

/// Truncate a string with ellipsis, respecting char boundaries
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Truncate free text to a one-line snippet
pub fn snippet(text: &str, max_len: usize) -> String {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    truncate_str(first_line.trim(), max_len)
}
