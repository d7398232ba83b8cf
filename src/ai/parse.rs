use serde_json::Value;
use std::fmt;

/// Why a model answer could not be read as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    Empty,
    /// Neither the brace-delimited substring nor the whole text parsed.
    InvalidJson(String),
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::Empty => f.write_str("empty response"),
            ParseFailure::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
        }
    }
}

impl std::error::Error for ParseFailure {}

/// Reads the span from the first `{` to the last `}`; if that is not JSON,
/// tries the whole trimmed text. Shape is not validated.
pub fn parse_json_response(text: &str) -> Result<Value, ParseFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseFailure::Empty);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    serde_json::from_str(trimmed).map_err(|e| ParseFailure::InvalidJson(e.to_string()))
}

/// First `limit` characters, respecting char boundaries.
pub fn preview(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
