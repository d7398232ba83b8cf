use serde_json::Value;

pub const UNKNOWN: &str = "Unknown";

/// Optional-field access over model-produced JSON. Every lookup tolerates a
/// missing key, a null, or a value of the wrong kind.
pub trait RecordExt {
    /// Walks `path` through nested objects.
    fn at(&self, path: &[&str]) -> Option<&Value>;

    /// Scalar at `path` rendered as text, or `default`.
    fn text_or(&self, path: &[&str], default: &str) -> String {
        match self.at(path) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }

    fn text(&self, path: &[&str]) -> String {
        self.text_or(path, UNKNOWN)
    }

    fn number(&self, path: &[&str]) -> Option<f64> {
        match self.at(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }

    /// Array at `path`, empty when absent.
    fn list(&self, path: &[&str]) -> &[Value] {
        self.at(path)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Strings of the array at `path`; non-string items are rendered as JSON.
    fn strings(&self, path: &[&str]) -> Vec<String> {
        self.list(path)
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    fn has_section(&self, path: &[&str]) -> bool {
        match self.at(path) {
            Some(Value::Object(m)) => !m.is_empty(),
            _ => false,
        }
    }
}

impl RecordExt for Value {
    fn at(&self, path: &[&str]) -> Option<&Value> {
        let mut current = self;
        for key in path {
            current = current.as_object()?.get(*key)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_and_mistyped_fields_default() {
        let record = json!({
            "domain": {"name": "retail", "score": 82, "tags": ["a", 3], "empty": "", "nothing": null},
            "flat": "text"
        });

        assert_eq!(record.text(&["domain", "name"]), "retail");
        assert_eq!(record.text(&["domain", "score"]), "82");
        assert_eq!(record.text(&["domain", "missing"]), UNKNOWN);
        assert_eq!(record.text(&["domain", "empty"]), UNKNOWN);
        assert_eq!(record.text(&["domain", "nothing"]), UNKNOWN);
        assert_eq!(record.text(&["flat", "deeper"]), UNKNOWN);
        assert_eq!(record.number(&["domain", "score"]), Some(82.0));
        assert_eq!(record.strings(&["domain", "tags"]), vec!["a", "3"]);
        assert!(record.list(&["domain", "name"]).is_empty());
        assert!(record.has_section(&["domain"]));
        assert!(!record.has_section(&["flat"]));
    }

    #[test]
    fn numbers_accept_percent_strings() {
        let record = json!({"confidence": "87%"});
        assert_eq!(record.number(&["confidence"]), Some(87.0));
    }
}
