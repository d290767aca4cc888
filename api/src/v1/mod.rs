use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToDoItem {
    pub id: u64,
    pub description: String,
    pub completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToDoItem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetadata {
    pub total: u64,
}

/// Body of `GET /api/todo`. `meta.total` counts the whole collection, not
/// just the returned window.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindResponse {
    pub meta: ListMetadata,
    pub data: Vec<ToDoItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn item_uses_camel_case_field_names() {
        let due = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let item = ToDoItem {
            id: 7,
            due_date: Some(due),
            ..ToDoItem::new("water plants")
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["description"], "water plants");
        assert_eq!(json["completed"], false);
        assert_eq!(json["dueDate"], "2025-01-01T00:00:00Z");
        assert!(json["completedAt"].is_null());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let item: ToDoItem = serde_json::from_str(r#"{"description":"buy milk"}"#).unwrap();
        assert_eq!(item.id, 0);
        assert_eq!(item.description, "buy milk");
        assert!(!item.completed);
        assert!(item.due_date.is_none());
    }

    #[test]
    fn find_response_shape() {
        let response = FindResponse {
            meta: ListMetadata { total: 3 },
            data: vec![],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"meta":{"total":3},"data":[]}"#);
    }
}
