use std::sync::Arc;

use shared::services::identity_service::{Identity, IdentityProvider};
use shared::services::sync_service::{AccountState, HydrationReport, SyncService};
use tracing::{info, warn};

/// One signed-in run: sign in, hydrate, mirror, then tear down.
pub struct RosterSession {
    identity: Arc<dyn IdentityProvider>,
    sync: Arc<SyncService>,
}

impl RosterSession {
    pub fn new(identity: Arc<dyn IdentityProvider>, sync: Arc<SyncService>) -> Self {
        RosterSession { identity, sync }
    }

    pub async fn start(
        &self,
        id_token: &str,
    ) -> Result<(Identity, HydrationReport), Box<dyn std::error::Error + Send + Sync>> {
        let user = self.identity.sign_in(id_token)?;
        let report = self.sync.hydrate_after_sign_in(&user.uid).await?;

        match &report.account {
            AccountState::Ready(profile) => {
                info!("Welcome back, {}", profile.display_name)
            }
            AccountState::NeedsOnboarding => {
                warn!("User {} has no profile yet and needs onboarding", user.uid)
            }
        }

        self.sync.start_class_mirror(&user.uid).await?;
        Ok((user, report))
    }

    pub async fn stop(&self) {
        self.sync.sign_out().await;
        self.identity.sign_out();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use shared::models::class::Class;
    use shared::repositories::classroom_repository::{
        ClassroomRepository, DocumentClassroomRepository,
    };
    use shared::repositories::document_store::MemoryDocumentStore;
    use shared::repositories::local_store::LocalStore;
    use shared::services::identity_service::JwtIdentityProvider;
    use shared::services::sync_service::Reconciliation;

    #[tokio::test]
    async fn test_session_hydrates_and_mirrors_until_stopped() {
        let store = Arc::new(MemoryDocumentStore::new());
        let remote = DocumentClassroomRepository::new(store.clone());
        remote
            .save_class("teacher-1", &Class::new("3-1", 4))
            .await
            .unwrap();

        let identity = Arc::new(JwtIdentityProvider::new("secret"));
        let token = identity
            .issue_token("teacher-1", None, chrono::Duration::hours(1))
            .unwrap();
        let sync = Arc::new(SyncService::over_store(
            LocalStore::in_memory().shared(),
            store,
            Duration::from_secs(1),
            Duration::from_millis(5),
        ));
        let session = RosterSession::new(identity.clone(), sync.clone());

        let (user, report) = session.start(&token).await.unwrap();

        assert_eq!(user.uid, "teacher-1");
        assert_eq!(report.account, AccountState::NeedsOnboarding);
        assert_eq!(report.classes, Reconciliation::RemoteWins { count: 1 });
        assert!(sync.is_mirroring().await);

        session.stop().await;

        assert!(!sync.is_mirroring().await);
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn test_bad_token_leaves_nothing_running() {
        let sync = Arc::new(SyncService::over_store(
            LocalStore::in_memory().shared(),
            Arc::new(MemoryDocumentStore::new()),
            Duration::from_secs(1),
            Duration::from_millis(5),
        ));
        let session = RosterSession::new(Arc::new(JwtIdentityProvider::new("secret")), sync.clone());

        assert!(session.start("garbage").await.is_err());
        assert!(!sync.is_mirroring().await);
    }
}
