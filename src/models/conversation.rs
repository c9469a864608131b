use serde::{Deserialize, Serialize};

/// A conversation as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub is_current: bool,
}

impl ConversationSummary {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled conversation"
        } else {
            &self.title
        }
    }
}

// Servers backed by SQL tables hand out integer ids.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "conversation id must be a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numeric_ids_and_missing_fields() {
        let conv: ConversationSummary =
            serde_json::from_str(r#"{"id": 42, "title": "Leave balance"}"#).unwrap();
        assert_eq!(conv.id, "42");
        assert_eq!(conv.title, "Leave balance");
        assert!(conv.timestamp.is_empty());
        assert!(!conv.is_current);
    }

    #[test]
    fn blank_title_falls_back() {
        let conv: ConversationSummary =
            serde_json::from_str(r#"{"id": "a", "title": "  ", "is_current": true}"#).unwrap();
        assert_eq!(conv.display_title(), "Untitled conversation");
        assert!(conv.is_current);
    }
}
