use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only badge award. Entries are never edited once written.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeLogEntry {
    pub id: String,
    pub student_id: String,
    pub badge_type: String,
    pub awarded_at: DateTime<Utc>,
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BadgeLogEntry {
    pub fn new(student_id: &str, badge_type: &str, class_id: &str, reason: Option<String>) -> Self {
        BadgeLogEntry {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            badge_type: badge_type.to_string(),
            awarded_at: Utc::now(),
            class_id: class_id.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_entry_serializes_camel_case() {
        let entry = BadgeLogEntry::new("s1", "helper", "c1", None);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["studentId"], "s1");
        assert_eq!(json["badgeType"], "helper");
        assert_eq!(json["classId"], "c1");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_badge_entry_ids_are_unique() {
        let a = BadgeLogEntry::new("s1", "helper", "c1", None);
        let b = BadgeLogEntry::new("s1", "helper", "c1", None);
        assert_ne!(a.id, b.id);
    }
}
