use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::models::badge::BadgeLogEntry;
use crate::services::errors::badge_service_errors::BadgeServiceError;
use crate::services::sync_service::SyncService;

pub const XP_PER_BADGE: u32 = 10;
pub const XP_PER_LEVEL: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentProgress {
    pub xp: u32,
    pub level: u32,
    pub badge_counts: BTreeMap<String, u32>,
}

/// Aggregates a student's badge log into XP, level and per-type counts.
pub fn summarize(entries: &[BadgeLogEntry], student_id: &str) -> StudentProgress {
    let mut badge_counts = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.student_id == student_id) {
        *badge_counts.entry(entry.badge_type.clone()).or_insert(0) += 1;
    }
    let xp = badge_counts.values().sum::<u32>() * XP_PER_BADGE;
    StudentProgress {
        xp,
        level: 1 + xp / XP_PER_LEVEL,
        badge_counts,
    }
}

pub struct BadgeService {
    sync: Arc<SyncService>,
}

impl BadgeService {
    pub fn new(sync: Arc<SyncService>) -> Self {
        BadgeService { sync }
    }

    /// Records a badge for a student of the given class and pushes it upward.
    pub async fn award(
        &self,
        uid: &str,
        student_id: &str,
        badge_type: &str,
        class_id: &str,
        reason: Option<String>,
    ) -> Result<(BadgeLogEntry, Option<JoinHandle<()>>), BadgeServiceError> {
        if student_id.is_empty() || badge_type.trim().is_empty() {
            return Err(BadgeServiceError::ValidationError(
                "Student ID or badge type cannot be empty".to_string(),
            ));
        }

        let class = self.sync.local_class(class_id).await?;
        if !class.students.iter().any(|s| s.id == student_id) {
            return Err(BadgeServiceError::StudentNotFound {
                class_id: class_id.to_string(),
                student_id: student_id.to_string(),
            });
        }

        let reason = reason.filter(|r| !r.trim().is_empty());
        let entry = BadgeLogEntry::new(student_id, badge_type.trim(), class_id, reason);
        let push = self.sync.append_badge_log(uid, &entry).await?;
        info!(
            "Awarded '{}' to student {} in class {}",
            entry.badge_type, student_id, class_id
        );
        Ok((entry, push))
    }

    pub async fn progress(&self, student_id: &str) -> Result<StudentProgress, BadgeServiceError> {
        let logs = self.sync.local_badge_logs().await?;
        Ok(summarize(&logs, student_id))
    }

    /// Progress of every student in the class, in roster order.
    pub async fn class_progress(
        &self,
        class_id: &str,
    ) -> Result<Vec<(String, StudentProgress)>, BadgeServiceError> {
        let class = self.sync.local_class(class_id).await?;
        let logs = self.sync.local_badge_logs().await?;
        Ok(class
            .students
            .iter()
            .map(|student| (student.id.clone(), summarize(&logs, &student.id)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rstest::rstest;

    use crate::models::class::Class;
    use crate::models::student::Student;
    use crate::repositories::document_store::MemoryDocumentStore;
    use crate::repositories::local_store::LocalStore;
    use crate::services::errors::sync_service_errors::SyncError;

    fn entries(student_id: &str, types: &[&str]) -> Vec<BadgeLogEntry> {
        types
            .iter()
            .map(|t| BadgeLogEntry::new(student_id, t, "c1", None))
            .collect()
    }

    #[rstest]
    #[case(0, 0, 1)]
    #[case(1, 10, 1)]
    #[case(5, 50, 2)]
    #[case(12, 120, 3)]
    fn test_xp_and_level(#[case] badges: usize, #[case] xp: u32, #[case] level: u32) {
        let logs = entries("s1", &vec!["helper"; badges]);
        let progress = summarize(&logs, "s1");
        assert_eq!(progress.xp, xp);
        assert_eq!(progress.level, level);
    }

    #[test]
    fn test_summarize_counts_per_type_and_ignores_other_students() {
        let mut logs = entries("s1", &["helper", "focus", "helper"]);
        logs.extend(entries("s2", &["helper"]));

        let progress = summarize(&logs, "s1");

        assert_eq!(progress.badge_counts.get("helper"), Some(&2));
        assert_eq!(progress.badge_counts.get("focus"), Some(&1));
        assert_eq!(progress.xp, 30);
        assert_eq!(summarize(&logs, "s1"), progress);
    }

    async fn service_with_class() -> (BadgeService, Class) {
        let sync = Arc::new(SyncService::over_store(
            LocalStore::in_memory().shared(),
            Arc::new(MemoryDocumentStore::new()),
            Duration::from_secs(1),
            Duration::from_millis(10),
        ));
        let mut class = Class::new("3-1", 2);
        class.students = vec![Student::new("Mina", 1)];
        sync.save_class("u1", &class).await.unwrap().await.unwrap();
        (BadgeService::new(sync), class)
    }

    #[tokio::test]
    async fn test_award_appends_entry_and_updates_progress() {
        let (service, class) = service_with_class().await;
        let student_id = class.students[0].id.clone();

        let (entry, push) = service
            .award("u1", &student_id, " helper ", &class.id, Some("  ".to_string()))
            .await
            .unwrap();
        push.unwrap().await.unwrap();

        assert_eq!(entry.badge_type, "helper");
        assert!(entry.reason.is_none());
        assert_eq!(service.progress(&student_id).await.unwrap().xp, 10);
        let all = service.class_progress(&class.id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.level, 1);
    }

    #[tokio::test]
    async fn test_award_rejects_unknown_student_and_class() {
        let (service, class) = service_with_class().await;

        assert!(matches!(
            service.award("u1", "ghost", "helper", &class.id, None).await,
            Err(BadgeServiceError::StudentNotFound { .. })
        ));
        assert!(matches!(
            service.award("u1", "s1", "helper", "missing", None).await,
            Err(BadgeServiceError::SyncError(SyncError::ClassNotFound(_)))
        ));
        assert!(matches!(
            service.award("u1", "s1", "", &class.id, None).await,
            Err(BadgeServiceError::ValidationError(_))
        ));
    }
}
