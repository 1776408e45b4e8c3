use std::sync::Arc;

use shared::config::{AppConfig, ConfigError};
use shared::repositories::dynamo_document_store::DynamoDbDocumentStore;
use shared::repositories::local_store::{FileBackend, LocalStore};
use shared::services::identity_service::JwtIdentityProvider;
use shared::services::sync_service::SyncService;
use tracing::info;

mod session;
use session::RosterSession;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;
    let id_token =
        std::env::var("ROSTER_ID_TOKEN").map_err(|_| ConfigError::Missing("ROSTER_ID_TOKEN"))?;

    let aws = aws_config::load_from_env().await;
    let client = aws_sdk_dynamodb::Client::new(&aws);
    let remote = Arc::new(DynamoDbDocumentStore::new(
        client,
        &config.table_name,
        config.subscription_poll,
    ));

    let backend = FileBackend::open(&config.local_store_path, config.local_store_quota_bytes)?;
    let local = LocalStore::new(Box::new(backend), &config.local_store_prefix).shared();

    let sync = Arc::new(SyncService::over_store(
        local,
        remote,
        config.remote_timeout,
        config.profile_retry_backoff,
    ));
    let identity = Arc::new(JwtIdentityProvider::new(&config.jwt_secret));
    let session = RosterSession::new(identity, sync);

    let (user, _) = session.start(&id_token).await?;
    info!(
        "Mirroring classes for {} into {}, press Ctrl-C to stop",
        user.uid,
        config.local_store_path.display()
    );

    tokio::signal::ctrl_c().await?;
    session.stop().await;
    info!("Stopped");
    Ok(())
}
