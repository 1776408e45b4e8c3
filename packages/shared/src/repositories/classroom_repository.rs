use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::badge::BadgeLogEntry;
use crate::models::class::Class;
use crate::models::profile::UserProfile;
use crate::models::thermostat::ThermostatSettings;
use crate::repositories::document_store::{
    badge_logs_collection, classes_collection, thermostat_collection, Document, DocumentPath,
    DocumentStore, Subscription,
};
use crate::repositories::errors::document_store_errors::DocumentStoreError;

#[cfg(test)]
use mockall::automock;

/// Typed access to one teacher's remote document tree.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClassroomRepository: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, DocumentStoreError>;
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), DocumentStoreError>;

    async fn list_classes(&self, uid: &str) -> Result<Vec<Class>, DocumentStoreError>;
    async fn save_class(&self, uid: &str, class: &Class) -> Result<(), DocumentStoreError>;
    /// Removes the class together with its thermostat settings and badge logs.
    async fn delete_class(&self, uid: &str, class_id: &str) -> Result<(), DocumentStoreError>;
    async fn watch_classes(&self, uid: &str) -> Result<Subscription, DocumentStoreError>;

    async fn list_badge_logs(&self, uid: &str) -> Result<Vec<BadgeLogEntry>, DocumentStoreError>;
    async fn append_badge_log(
        &self,
        uid: &str,
        entry: &BadgeLogEntry,
    ) -> Result<(), DocumentStoreError>;

    async fn list_thermostat_settings(
        &self,
        uid: &str,
    ) -> Result<Vec<ThermostatSettings>, DocumentStoreError>;
    async fn save_thermostat_settings(
        &self,
        uid: &str,
        settings: &ThermostatSettings,
    ) -> Result<(), DocumentStoreError>;
}

pub struct DocumentClassroomRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentClassroomRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        DocumentClassroomRepository { store }
    }

    async fn list_as<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<T>, DocumentStoreError> {
        let documents = self.store.list(collection).await?;
        Ok(decode_documents(&documents, |doc| {
            serde_json::from_value(doc.data.clone())
        }))
    }

    async fn put<T: Serialize + Sync>(
        &self,
        path: &DocumentPath,
        value: &T,
    ) -> Result<(), DocumentStoreError> {
        let data = serde_json::to_value(value)?;
        self.store.set_merge(path, &data).await
    }

    async fn replace<T: Serialize + Sync>(
        &self,
        path: &DocumentPath,
        value: &T,
    ) -> Result<(), DocumentStoreError> {
        let data = serde_json::to_value(value)?;
        self.store.set(path, &data).await
    }
}

/// Decodes class documents, skipping (and logging) any that fail.
pub fn decode_classes(documents: &[Document]) -> Vec<Class> {
    decode_documents(documents, |doc| Class::from_document(&doc.id, doc.data.clone()))
}

fn decode_documents<T, F>(documents: &[Document], decode: F) -> Vec<T>
where
    F: Fn(&Document) -> Result<T, serde_json::Error>,
{
    documents
        .iter()
        .filter_map(|doc| match decode(doc) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping unreadable document {}: {}", doc.id, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl ClassroomRepository for DocumentClassroomRepository {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, DocumentStoreError> {
        match self.store.get(&DocumentPath::profile(uid)).await? {
            Some(document) => Ok(Some(serde_json::from_value(document.data)?)),
            None => Ok(None),
        }
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), DocumentStoreError> {
        self.put(&DocumentPath::profile(&profile.uid), profile).await
    }

    async fn list_classes(&self, uid: &str) -> Result<Vec<Class>, DocumentStoreError> {
        let documents = self.store.list(&classes_collection(uid)).await?;
        Ok(decode_classes(&documents))
    }

    async fn save_class(&self, uid: &str, class: &Class) -> Result<(), DocumentStoreError> {
        let mut class = class.clone();
        class.normalize();
        let data = class.to_document()?;
        self.store
            .set(&DocumentPath::class(uid, &class.id), &data)
            .await
    }

    async fn delete_class(&self, uid: &str, class_id: &str) -> Result<(), DocumentStoreError> {
        self.store
            .delete(&DocumentPath::class(uid, class_id))
            .await?;
        self.store
            .delete(&DocumentPath::thermostat(uid, class_id))
            .await?;

        let logs: Vec<BadgeLogEntry> = self.list_as(&badge_logs_collection(uid)).await?;
        let mut removed = 0;
        for log in logs.iter().filter(|log| log.class_id == class_id) {
            self.store
                .delete(&DocumentPath::badge_log(uid, &log.id))
                .await?;
            removed += 1;
        }
        info!(
            "Deleted class {} with {} badge log(s) for user {}",
            class_id, removed, uid
        );
        Ok(())
    }

    async fn watch_classes(&self, uid: &str) -> Result<Subscription, DocumentStoreError> {
        self.store.subscribe(&classes_collection(uid)).await
    }

    async fn list_badge_logs(&self, uid: &str) -> Result<Vec<BadgeLogEntry>, DocumentStoreError> {
        let mut logs: Vec<BadgeLogEntry> = self.list_as(&badge_logs_collection(uid)).await?;
        logs.sort_by_key(|log| log.awarded_at);
        Ok(logs)
    }

    async fn append_badge_log(
        &self,
        uid: &str,
        entry: &BadgeLogEntry,
    ) -> Result<(), DocumentStoreError> {
        self.put(&DocumentPath::badge_log(uid, &entry.id), entry)
            .await
    }

    async fn list_thermostat_settings(
        &self,
        uid: &str,
    ) -> Result<Vec<ThermostatSettings>, DocumentStoreError> {
        self.list_as(&thermostat_collection(uid)).await
    }

    async fn save_thermostat_settings(
        &self,
        uid: &str,
        settings: &ThermostatSettings,
    ) -> Result<(), DocumentStoreError> {
        self.replace(&DocumentPath::thermostat(uid, &settings.class_id), settings)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::document_store::MemoryDocumentStore;
    use serde_json::json;

    fn repository() -> (Arc<MemoryDocumentStore>, DocumentClassroomRepository) {
        let store = Arc::new(MemoryDocumentStore::new());
        let repository = DocumentClassroomRepository::new(store.clone());
        (store, repository)
    }

    #[tokio::test]
    async fn test_class_round_trip() {
        let (store, repository) = repository();
        let mut class = Class::new("3-1", 3);
        class.group_structure[1] = vec!["A".to_string()];

        repository.save_class("u1", &class).await.unwrap();

        let raw = store
            .get(&DocumentPath::class("u1", &class.id))
            .await
            .unwrap()
            .unwrap();
        assert!(raw.data["groupStructure"].is_object());
        assert_eq!(repository.list_classes("u1").await.unwrap(), vec![class]);
    }

    #[tokio::test]
    async fn test_resaving_with_fewer_groups_drops_the_removed_groups() {
        let (_store, repository) = repository();
        let names = |group: &[&str]| group.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        let mut class = Class::new("3-1", 4);
        class.group_structure = vec![names(&["A"]), names(&["B"]), names(&["C"]), names(&["D"])];
        repository.save_class("u1", &class).await.unwrap();

        class.group_count = 2;
        class.group_structure = vec![names(&["A", "C"]), names(&["B", "D"])];
        repository.save_class("u1", &class).await.unwrap();

        let classes = repository.list_classes("u1").await.unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].group_count, 2);
        assert_eq!(
            classes[0].group_structure,
            vec![names(&["A", "C"]), names(&["B", "D"])]
        );
    }

    #[tokio::test]
    async fn test_resaving_thermostat_drops_removed_options() {
        let (_store, repository) = repository();
        let mut settings = ThermostatSettings::new("c1", 22);
        settings.options.insert("unit".to_string(), json!("celsius"));
        settings.options.insert("alarm".to_string(), json!(true));
        repository
            .save_thermostat_settings("u1", &settings)
            .await
            .unwrap();

        settings.options.remove("alarm");
        settings.target = 24;
        repository
            .save_thermostat_settings("u1", &settings)
            .await
            .unwrap();

        let stored = repository.list_thermostat_settings("u1").await.unwrap();
        assert_eq!(stored, vec![settings]);
        assert!(!stored[0].options.contains_key("alarm"));
    }

    #[tokio::test]
    async fn test_list_classes_skips_unreadable_documents() {
        let (store, repository) = repository();
        store
            .set_merge(&DocumentPath::class("u1", "bad"), &json!({"students": 5}))
            .await
            .unwrap();
        store
            .set_merge(
                &DocumentPath::class("u1", "legacy"),
                &json!({"name": "4-1", "groupCount": 3, "groupStructure": {"g2": ["B"], "g1": ["A"]}}),
            )
            .await
            .unwrap();

        let classes = repository.list_classes("u1").await.unwrap();

        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].id, "legacy");
        assert_eq!(
            classes[0].group_structure,
            vec![vec!["A".to_string()], vec!["B".to_string()], vec![]]
        );
    }

    #[tokio::test]
    async fn test_delete_class_cascades() {
        let (store, repository) = repository();
        let class = Class::new("3-1", 2);
        let other = Class::new("3-2", 2);
        repository.save_class("u1", &class).await.unwrap();
        repository.save_class("u1", &other).await.unwrap();
        repository
            .save_thermostat_settings("u1", &ThermostatSettings::new(&class.id, 22))
            .await
            .unwrap();
        repository
            .append_badge_log("u1", &BadgeLogEntry::new("s1", "helper", &class.id, None))
            .await
            .unwrap();
        repository
            .append_badge_log("u1", &BadgeLogEntry::new("s2", "helper", &other.id, None))
            .await
            .unwrap();

        repository.delete_class("u1", &class.id).await.unwrap();

        let classes = repository.list_classes("u1").await.unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].id, other.id);
        assert!(repository
            .list_thermostat_settings("u1")
            .await
            .unwrap()
            .is_empty());
        let logs = repository.list_badge_logs("u1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].class_id, other.id);
        assert!(store
            .get(&DocumentPath::class("u1", &class.id))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_profile_absent_then_present() {
        let (_store, repository) = repository();
        assert!(repository.get_profile("u1").await.unwrap().is_none());

        let profile = UserProfile::new("u1", "Ms. Park");
        repository.save_profile(&profile).await.unwrap();

        assert_eq!(repository.get_profile("u1").await.unwrap(), Some(profile));
    }
}
