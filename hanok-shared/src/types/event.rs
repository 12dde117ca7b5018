use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ event envelope wrapping all domain events.
///
/// Routing key format: `hanok.{module}.{entity}.{action}`
/// Example: `hanok.complaint.complaint.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            data,
        }
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Auth events
    pub const AUTH_ADMIN_SIGNUP_REQUESTED: &str = "hanok.auth.admin.signup_requested";
    pub const AUTH_RESIDENT_SIGNUP_REQUESTED: &str = "hanok.auth.resident.signup_requested";

    // Complaint events
    pub const COMPLAINT_CREATED: &str = "hanok.complaint.complaint.created";
    pub const COMPLAINT_STATUS_CHANGED: &str = "hanok.complaint.complaint.status_changed";

    // Notice events
    pub const NOTICE_CREATED: &str = "hanok.notice.notice.created";

    // Poll events
    pub const POLL_CREATED: &str = "hanok.poll.poll.created";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AdminSignupRequested {
        pub applicant_name: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResidentSignupRequested {
        pub resident_id: i64,
        pub applicant_name: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ComplaintCreated {
        pub complaint_id: i64,
        pub title: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ComplaintStatusChanged {
        pub complaint_id: i64,
        pub status: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct NoticeCreated {
        pub notice_id: i64,
        pub apartment_id: i64,
        pub title: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PollCreated {
        pub poll_id: i64,
        pub apartment_id: i64,
        pub title: String,
    }
}
