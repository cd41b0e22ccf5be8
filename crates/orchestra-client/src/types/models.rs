/*
[INPUT]:  Task records as emitted by the queue service (REST + push channel)
[OUTPUT]: Typed Task struct with tolerant timestamp decoding
[POS]:    Data layer - canonical task record
[UPDATE]: When the task schema changes
[UPDATE]: 2026-10-16 accept naive timestamps (no offset) as UTC
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Priority, TaskStatus, TaskType};

/// One unit of work tracked by the queue service.
///
/// `payload` is carried as opaque text; nothing in this crate looks inside it
/// except the JSON syntax check performed before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub status: TaskStatus,
    pub priority: Priority,
    pub task_type: TaskType,
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(with = "serde_helpers::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "serde_helpers::timestamp_option")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Task {
    /// Only failed tasks are offered for retry.
    pub fn is_retryable(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

/// Parse a service timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

mod serde_helpers {
    pub mod timestamp {
        use chrono::{DateTime, SecondsFormat, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = String::deserialize(deserializer)?;
            super::super::parse_timestamp(&raw)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
        }
    }

    pub mod timestamp_option {
        use chrono::{DateTime, SecondsFormat, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => {
                    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::super::parse_timestamp(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T12:30:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 12:30:00"), Some(expected));
        assert!(parse_timestamp("2024-01-01T12:30:00.250000").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_task_deserialize_service_shape() {
        let raw = r#"{
            "id": 3,
            "idempotency_key": null,
            "task_type": "io_bound",
            "status": "failed",
            "priority": "medium",
            "payload": "{\"message\": \"hello world\"}",
            "retry_count": 2,
            "created_at": "2024-01-01T12:30:00.123456",
            "finished_at": "2024-01-01T12:31:00",
            "error_message": "Simulated network failure"
        }"#;

        let task: Task = serde_json::from_str(raw).expect("task should decode");
        assert_eq!(task.id, 3);
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.payload.as_deref(), Some("{\"message\": \"hello world\"}"));
        assert_eq!(task.retry_count, 2);
        assert!(task.finished_at.is_some());
        assert!(task.is_retryable());
        assert_eq!(task.idempotency_key, None);
    }

    #[test]
    fn test_task_optional_fields_default() {
        let raw = r#"{
            "id": 9,
            "task_type": "cpu_bound",
            "status": "pending",
            "priority": "high",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;

        let task: Task = serde_json::from_str(raw).expect("task should decode");
        assert_eq!(task.payload, None);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.finished_at, None);
        assert!(!task.is_retryable());
    }

    #[test]
    fn test_task_rejects_negative_retry_count() {
        let raw = r#"{
            "id": 1,
            "task_type": "io_bound",
            "status": "pending",
            "priority": "low",
            "retry_count": -1,
            "created_at": "2024-01-01T00:00:00Z"
        }"#;

        assert!(serde_json::from_str::<Task>(raw).is_err());
    }

    #[test]
    fn test_task_serializes_rfc3339() {
        let task = Task {
            id: 1,
            status: TaskStatus::Pending,
            priority: Priority::Low,
            task_type: TaskType::IoBound,
            payload: Some("{}".to_string()),
            retry_count: 0,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            finished_at: None,
            error_message: None,
            idempotency_key: None,
        };

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["created_at"], "2024-01-01T00:00:00Z");
        assert!(value["finished_at"].is_null());
        assert!(value.get("idempotency_key").is_none());
    }
}
