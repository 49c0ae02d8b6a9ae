use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Row for the `activities` timeline table
#[derive(Debug, Clone, Serialize)]
pub struct NewActivity {
    pub lead_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub activity_type: &'static str,
    pub description: String,
    pub details: Value,
}

impl NewActivity {
    pub fn for_lead(lead_id: Uuid, activity_type: &'static str, description: impl Into<String>) -> Self {
        Self {
            lead_id: Some(lead_id),
            user_id: None,
            activity_type,
            description: description.into(),
            details: Value::Null,
        }
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// First `max` characters of a message body, for activity previews
pub fn preview(content: &str, max: usize) -> String {
    content.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_counts_characters_not_bytes() {
        assert_eq!(preview("Merhaba dünya", 9), "Merhaba d");
        assert_eq!(preview("şşş", 2), "şş");
        assert_eq!(preview("short", 100), "short");
    }
}
