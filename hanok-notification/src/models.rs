use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::notifications;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub is_checked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: i64,
    pub content: String,
}

/// Minimal projection loaded for ownership checks, so `mark_as_read`
/// never has to pull the full content row.
#[derive(Debug, Clone, Copy, Queryable)]
pub struct NotificationSimple {
    pub id: i64,
    pub user_id: i64,
}

/// Wire frame pushed over a live stream:
/// `{"type":"alarm","data":[Notification...]}`, one batch per recipient.
#[derive(Debug, Serialize)]
pub struct PushEnvelope<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a [Notification],
}

impl<'a> PushEnvelope<'a> {
    pub fn alarm(data: &'a [Notification]) -> Self {
        Self { kind: "alarm", data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_serializes_camel_case() {
        let n = Notification {
            id: 7,
            user_id: 3,
            content: "A new announcement has been posted".into(),
            is_checked: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["userId"], 3);
        assert_eq!(json["isChecked"], false);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn envelope_is_typed_alarm() {
        let json = serde_json::to_value(PushEnvelope::alarm(&[])).unwrap();
        assert_eq!(json["type"], "alarm");
        assert!(json["data"].as_array().unwrap().is_empty());
    }
}
