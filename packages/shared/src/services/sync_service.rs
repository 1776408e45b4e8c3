use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::badge::BadgeLogEntry;
use crate::models::class::Class;
use crate::models::group::GroupAssignment;
use crate::models::profile::UserProfile;
use crate::models::thermostat::ThermostatSettings;
use crate::repositories::classroom_repository::{
    decode_classes, ClassroomRepository, DocumentClassroomRepository,
};
use crate::repositories::document_store::{DocumentStore, TimeoutDocumentStore};
use crate::repositories::errors::document_store_errors::DocumentStoreError;
use crate::repositories::errors::local_store_errors::LocalStoreError;
use crate::repositories::local_store::{keys, LocalStore, SharedLocalStore};
use crate::services::errors::sync_service_errors::SyncError;

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PROFILE_RETRY_BACKOFF: Duration = Duration::from_millis(1500);

type PushFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq)]
pub enum AccountState {
    Ready(UserProfile),
    /// No profile document exists; the caller should run onboarding.
    NeedsOnboarding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    RemoteWins { count: usize },
    SeededFromLocal { attempted: usize, failed: usize },
    /// Both sides had entries; local-only ones were kept and pushed.
    Merged { remote: usize, pushed: usize, failed: usize },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HydrationReport {
    pub account: AccountState,
    pub switched_user: bool,
    pub classes: Reconciliation,
    pub badge_logs: Reconciliation,
    pub thermostat_settings: Reconciliation,
}

#[derive(Debug, PartialEq)]
pub enum ReconcilePlan<T> {
    ReplaceLocal(Vec<T>),
    SeedRemote(Vec<T>),
    Unchanged,
}

/// Remote wins whenever it has anything. Otherwise local data is pushed up
/// as a one-way seed.
pub fn plan_reconciliation<T>(remote: Vec<T>, local: Vec<T>) -> ReconcilePlan<T> {
    if !remote.is_empty() {
        ReconcilePlan::ReplaceLocal(remote)
    } else if !local.is_empty() {
        ReconcilePlan::SeedRemote(local)
    } else {
        ReconcilePlan::Unchanged
    }
}

/// Writes a remote class snapshot into the local cache. Returns `false` when
/// the cache already holds exactly that snapshot.
pub fn apply_class_snapshot(
    store: &mut LocalStore,
    classes: &[Class],
) -> Result<bool, LocalStoreError> {
    let current: Option<Vec<Class>> = store.get_json(keys::CLASSES).ok().flatten();
    if current.as_deref() == Some(classes) {
        return Ok(false);
    }
    store.set_json(keys::CLASSES, classes)?;
    Ok(true)
}

struct ClassMirror {
    uid: String,
    task: JoinHandle<()>,
}

/// Keeps the local cache and the remote document tree converged.
pub struct SyncService {
    local: SharedLocalStore,
    repository: Arc<dyn ClassroomRepository>,
    profile_retry_backoff: Duration,
    mirror: Mutex<Option<ClassMirror>>,
}

impl SyncService {
    pub fn new(
        local: SharedLocalStore,
        repository: Arc<dyn ClassroomRepository>,
        profile_retry_backoff: Duration,
    ) -> Self {
        SyncService {
            local,
            repository,
            profile_retry_backoff,
            mirror: Mutex::new(None),
        }
    }

    /// Builds the service over a raw document store, bounding every remote
    /// call by `remote_timeout`.
    pub fn over_store(
        local: SharedLocalStore,
        store: Arc<dyn DocumentStore>,
        remote_timeout: Duration,
        profile_retry_backoff: Duration,
    ) -> Self {
        let timed = Arc::new(TimeoutDocumentStore::new(store, remote_timeout));
        let repository = Arc::new(DocumentClassroomRepository::new(timed));
        Self::new(local, repository, profile_retry_backoff)
    }

    pub fn local(&self) -> SharedLocalStore {
        self.local.clone()
    }

    /// Records `uid` as the signed-in user. A different previous user means
    /// the mirror is stopped and every cached key is wiped first.
    pub async fn prepare_for_user(&self, uid: &str) -> Result<bool, SyncError> {
        let previous = self.local.lock().await.get(keys::CURRENT_USER);
        let switched = matches!(&previous, Some(prev) if prev != uid);
        if switched {
            info!(
                "User changed from {} to {}, clearing local cache",
                previous.as_deref().unwrap_or_default(),
                uid
            );
            self.stop_mirror().await;
        }

        let mut local = self.local.lock().await;
        if switched {
            local.clear_namespace()?;
        }
        local.set(keys::CURRENT_USER, uid)?;
        Ok(switched)
    }

    /// Post sign-in reconciliation. Failures here are returned so the caller
    /// can route the user to recovery instead of serving a half-loaded cache.
    pub async fn hydrate_after_sign_in(&self, uid: &str) -> Result<HydrationReport, SyncError> {
        let switched_user = self.prepare_for_user(uid).await?;

        let account = match self.fetch_profile(uid).await? {
            Some(profile) => {
                self.local.lock().await.set_json(keys::PROFILE, &profile)?;
                AccountState::Ready(profile)
            }
            None => {
                info!("No profile found for {}, onboarding required", uid);
                AccountState::NeedsOnboarding
            }
        };

        let classes = self.reconcile_classes(uid).await?;
        let badge_logs = self.reconcile_badge_logs(uid).await?;
        let thermostat_settings = self.reconcile_thermostat_settings(uid).await?;

        info!(
            "Hydrated {}: classes {:?}, badge logs {:?}, thermostat {:?}",
            uid, classes, badge_logs, thermostat_settings
        );

        Ok(HydrationReport {
            account,
            switched_user,
            classes,
            badge_logs,
            thermostat_settings,
        })
    }

    /// Looks the profile up, retrying once after a fixed backoff if it is
    /// missing or the lookup timed out.
    async fn fetch_profile(&self, uid: &str) -> Result<Option<UserProfile>, SyncError> {
        match self.repository.get_profile(uid).await {
            Ok(Some(profile)) => return Ok(Some(profile)),
            Ok(None) => debug!("Profile for {} not found, retrying", uid),
            Err(e) if e.is_timeout() => warn!("Profile lookup for {} timed out, retrying", uid),
            Err(e) => return Err(e.into()),
        }
        tokio::time::sleep(self.profile_retry_backoff).await;
        Ok(self.repository.get_profile(uid).await?)
    }

    async fn reconcile_classes(&self, uid: &str) -> Result<Reconciliation, SyncError> {
        let remote = self.repository.list_classes(uid).await?;
        let local: Vec<Class> = self.read_local(keys::CLASSES).await;
        match plan_reconciliation(remote, local) {
            ReconcilePlan::ReplaceLocal(classes) => {
                self.local.lock().await.set_json(keys::CLASSES, &classes)?;
                Ok(Reconciliation::RemoteWins {
                    count: classes.len(),
                })
            }
            ReconcilePlan::SeedRemote(classes) => {
                let pushes = classes
                    .iter()
                    .map(|class| self.repository.save_class(uid, class))
                    .collect();
                let failed = run_seed("class", pushes).await;
                Ok(Reconciliation::SeededFromLocal {
                    attempted: classes.len(),
                    failed,
                })
            }
            ReconcilePlan::Unchanged => Ok(Reconciliation::Unchanged),
        }
    }

    /// Badge logs are append-only, so both sides are unioned by id.
    async fn reconcile_badge_logs(&self, uid: &str) -> Result<Reconciliation, SyncError> {
        let remote = self.repository.list_badge_logs(uid).await?;
        let local: Vec<BadgeLogEntry> = self.read_local(keys::BADGE_LOGS).await;
        let local_only: Vec<BadgeLogEntry> = local
            .into_iter()
            .filter(|log| !remote.iter().any(|r| r.id == log.id))
            .collect();

        if local_only.is_empty() {
            if remote.is_empty() {
                return Ok(Reconciliation::Unchanged);
            }
            self.local.lock().await.set_json(keys::BADGE_LOGS, &remote)?;
            return Ok(Reconciliation::RemoteWins {
                count: remote.len(),
            });
        }

        let remote_count = remote.len();
        let mut merged = remote;
        merged.extend(local_only.iter().cloned());
        merged.sort_by_key(|log| log.awarded_at);
        self.local.lock().await.set_json(keys::BADGE_LOGS, &merged)?;

        let pushes = local_only
            .iter()
            .map(|log| self.repository.append_badge_log(uid, log))
            .collect();
        let failed = run_seed("badge log", pushes).await;
        if remote_count == 0 {
            Ok(Reconciliation::SeededFromLocal {
                attempted: local_only.len(),
                failed,
            })
        } else {
            Ok(Reconciliation::Merged {
                remote: remote_count,
                pushed: local_only.len(),
                failed,
            })
        }
    }

    async fn reconcile_thermostat_settings(&self, uid: &str) -> Result<Reconciliation, SyncError> {
        let remote = self.repository.list_thermostat_settings(uid).await?;
        let local: Vec<ThermostatSettings> = self.read_local(keys::THERMOSTAT_SETTINGS).await;
        match plan_reconciliation(remote, local) {
            ReconcilePlan::ReplaceLocal(settings) => {
                self.local
                    .lock()
                    .await
                    .set_json(keys::THERMOSTAT_SETTINGS, &settings)?;
                Ok(Reconciliation::RemoteWins {
                    count: settings.len(),
                })
            }
            ReconcilePlan::SeedRemote(settings) => {
                let pushes = settings
                    .iter()
                    .map(|s| self.repository.save_thermostat_settings(uid, s))
                    .collect();
                let failed = run_seed("thermostat setting", pushes).await;
                Ok(Reconciliation::SeededFromLocal {
                    attempted: settings.len(),
                    failed,
                })
            }
            ReconcilePlan::Unchanged => Ok(Reconciliation::Unchanged),
        }
    }

    /// Background refresh of the class list. Errors are logged and the stale
    /// local copy is kept.
    pub async fn refresh_classes(&self, uid: &str) -> bool {
        match self.reconcile_classes(uid).await {
            Ok(result) => {
                debug!("Refreshed classes for {}: {:?}", uid, result);
                true
            }
            Err(e) => {
                warn!("Class refresh for {} failed, keeping local data: {}", uid, e);
                false
            }
        }
    }

    /// Starts mirroring remote class changes into the local cache, replacing
    /// any mirror already running.
    pub async fn start_class_mirror(&self, uid: &str) -> Result<(), SyncError> {
        self.stop_mirror().await;
        let mut subscription = self.repository.watch_classes(uid).await?;

        let local = self.local.clone();
        let owner = uid.to_string();
        let task = tokio::spawn(async move {
            let mut snapshot = Some(subscription.current());
            while let Some(documents) = snapshot {
                let classes = decode_classes(&documents);
                {
                    let mut store = local.lock().await;
                    match apply_class_snapshot(&mut store, &classes) {
                        Ok(true) => debug!("Mirrored {} class(es) for {}", classes.len(), owner),
                        Ok(false) => {}
                        Err(e) => warn!("Could not mirror classes for {}: {}", owner, e),
                    }
                }
                snapshot = subscription.changed().await;
            }
            debug!("Class subscription for {} closed", owner);
        });

        *self.mirror.lock().await = Some(ClassMirror {
            uid: uid.to_string(),
            task,
        });
        info!("Started class mirror for {}", uid);
        Ok(())
    }

    /// Unsubscribes the running mirror, if any.
    pub async fn stop_mirror(&self) -> bool {
        let mirror = self.mirror.lock().await.take();
        match mirror {
            Some(mirror) => {
                mirror.task.abort();
                let _ = mirror.task.await;
                info!("Stopped class mirror for {}", mirror.uid);
                true
            }
            None => false,
        }
    }

    pub async fn is_mirroring(&self) -> bool {
        self.mirror.lock().await.is_some()
    }

    pub async fn sign_out(&self) {
        self.stop_mirror().await;
    }

    pub async fn local_profile(&self) -> Result<Option<UserProfile>, SyncError> {
        Ok(self.local.lock().await.get_json(keys::PROFILE)?)
    }

    pub async fn local_classes(&self) -> Result<Vec<Class>, SyncError> {
        Ok(self
            .local
            .lock()
            .await
            .get_json(keys::CLASSES)?
            .unwrap_or_default())
    }

    pub async fn local_class(&self, class_id: &str) -> Result<Class, SyncError> {
        self.local_classes()
            .await?
            .into_iter()
            .find(|class| class.id == class_id)
            .ok_or_else(|| SyncError::ClassNotFound(class_id.to_string()))
    }

    pub async fn local_badge_logs(&self) -> Result<Vec<BadgeLogEntry>, SyncError> {
        Ok(self
            .local
            .lock()
            .await
            .get_json(keys::BADGE_LOGS)?
            .unwrap_or_default())
    }

    pub async fn local_thermostat_settings(&self) -> Result<Vec<ThermostatSettings>, SyncError> {
        Ok(self
            .local
            .lock()
            .await
            .get_json(keys::THERMOSTAT_SETTINGS)?
            .unwrap_or_default())
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<JoinHandle<()>, SyncError> {
        self.local.lock().await.set_json(keys::PROFILE, profile)?;

        let repository = self.repository.clone();
        let profile = profile.clone();
        Ok(push_in_background(
            format!("profile {}", profile.uid),
            async move { repository.save_profile(&profile).await },
        ))
    }

    /// Saves the class locally, then pushes it upward without waiting.
    pub async fn save_class(&self, uid: &str, class: &Class) -> Result<JoinHandle<()>, SyncError> {
        let mut class = class.clone();
        class.normalize();
        {
            let mut local = self.local.lock().await;
            let mut classes: Vec<Class> = local.get_json(keys::CLASSES)?.unwrap_or_default();
            match classes.iter_mut().find(|c| c.id == class.id) {
                Some(existing) => *existing = class.clone(),
                None => classes.push(class.clone()),
            }
            local.set_json(keys::CLASSES, &classes)?;
        }

        let repository = self.repository.clone();
        let uid = uid.to_string();
        Ok(push_in_background(
            format!("class {}", class.id),
            async move { repository.save_class(&uid, &class).await },
        ))
    }

    /// Deletes the class and its dependent local data, then deletes the
    /// remote documents in the background.
    pub async fn delete_class(&self, uid: &str, class_id: &str) -> Result<JoinHandle<()>, SyncError> {
        {
            let mut local = self.local.lock().await;
            let mut classes: Vec<Class> = local.get_json(keys::CLASSES)?.unwrap_or_default();
            classes.retain(|c| c.id != class_id);
            local.set_json(keys::CLASSES, &classes)?;

            let mut settings: Vec<ThermostatSettings> = local
                .get_json(keys::THERMOSTAT_SETTINGS)?
                .unwrap_or_default();
            settings.retain(|s| s.class_id != class_id);
            local.set_json(keys::THERMOSTAT_SETTINGS, &settings)?;

            let mut logs: Vec<BadgeLogEntry> =
                local.get_json(keys::BADGE_LOGS)?.unwrap_or_default();
            logs.retain(|log| log.class_id != class_id);
            local.set_json(keys::BADGE_LOGS, &logs)?;
        }

        let repository = self.repository.clone();
        let uid = uid.to_string();
        let class_id = class_id.to_string();
        Ok(push_in_background(
            format!("delete of class {}", class_id),
            async move { repository.delete_class(&uid, &class_id).await },
        ))
    }

    /// Persists an assignment as the class's fixed group structure.
    pub async fn save_group_assignment(
        &self,
        uid: &str,
        class_id: &str,
        assignment: &GroupAssignment,
    ) -> Result<(Class, JoinHandle<()>), SyncError> {
        let mut class = self.local_class(class_id).await?;
        class.apply_assignment(assignment);
        let push = self.save_class(uid, &class).await?;
        Ok((class, push))
    }

    /// Appends a badge log entry. Re-appending an entry with a known id is a no-op.
    pub async fn append_badge_log(
        &self,
        uid: &str,
        entry: &BadgeLogEntry,
    ) -> Result<Option<JoinHandle<()>>, SyncError> {
        {
            let mut local = self.local.lock().await;
            let mut logs: Vec<BadgeLogEntry> =
                local.get_json(keys::BADGE_LOGS)?.unwrap_or_default();
            if logs.iter().any(|log| log.id == entry.id) {
                return Ok(None);
            }
            logs.push(entry.clone());
            local.set_json(keys::BADGE_LOGS, &logs)?;
        }

        let repository = self.repository.clone();
        let uid = uid.to_string();
        let entry = entry.clone();
        Ok(Some(push_in_background(
            format!("badge log {}", entry.id),
            async move { repository.append_badge_log(&uid, &entry).await },
        )))
    }

    pub async fn save_thermostat_settings(
        &self,
        uid: &str,
        settings: &ThermostatSettings,
    ) -> Result<JoinHandle<()>, SyncError> {
        {
            let mut local = self.local.lock().await;
            let mut all: Vec<ThermostatSettings> = local
                .get_json(keys::THERMOSTAT_SETTINGS)?
                .unwrap_or_default();
            match all.iter_mut().find(|s| s.class_id == settings.class_id) {
                Some(existing) => *existing = settings.clone(),
                None => all.push(settings.clone()),
            }
            local.set_json(keys::THERMOSTAT_SETTINGS, &all)?;
        }

        let repository = self.repository.clone();
        let uid = uid.to_string();
        let settings = settings.clone();
        Ok(push_in_background(
            format!("thermostat settings for {}", settings.class_id),
            async move { repository.save_thermostat_settings(&uid, &settings).await },
        ))
    }

    async fn read_local<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.local.lock().await.get_json::<Vec<T>>(key) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring unreadable local '{}': {}", key, e);
                Vec::new()
            }
        }
    }
}

/// Runs every push in turn. One failure does not stop the others.
/// Returns how many failed.
async fn run_seed(label: &str, pushes: Vec<PushFuture<'_>>) -> usize {
    let attempted = pushes.len();
    let mut failed = 0;
    for push in pushes {
        if let Err(e) = push.await {
            warn!("Seeding {} to remote failed: {}", label, e);
            failed += 1;
        }
    }
    info!(
        "Seeded {} {}(s) from local cache, {} failed",
        attempted, label, failed
    );
    failed
}

fn push_in_background<F>(label: String, push: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), DocumentStoreError>> + Send + 'static,
{
    tokio::spawn(async move {
        match push.await {
            Ok(()) => debug!("Pushed {}", label),
            Err(e) => warn!("Background push of {} failed: {}", label, e),
        }
    })
}
