//! Construction of repositories, provider clients and application services.

use std::sync::Arc;

use areaflow_adapter_oauth_reqwest::ReqwestOAuth2Client;
use areaflow_adapter_storage_sqlite_sqlx::catalog_repo::{
    SqliteServiceRepository, SqliteUserRepository,
};
use areaflow_adapter_storage_sqlite_sqlx::execution_repo::SqliteExecutionRepository;
use areaflow_adapter_storage_sqlite_sqlx::pool::{self, Database};
use areaflow_adapter_storage_sqlite_sqlx::service_account_repo::SqliteServiceAccountRepository;
use areaflow_adapter_storage_sqlite_sqlx::trigger_counter::SqliteAreaTriggerCounter;
use areaflow_app::ports::ProviderSet;
use areaflow_app::services::execution_service::ExecutionService;
use areaflow_app::services::execution_stats::ExecutionStatsAggregator;
use areaflow_app::services::service_link_service::ServiceLinkService;

use crate::config::Config;

pub type LinkService = ServiceLinkService<
    SqliteServiceAccountRepository,
    SqliteServiceRepository,
    SqliteUserRepository,
    ReqwestOAuth2Client,
>;

/// Every service the commands operate on.
pub struct App {
    pub links: LinkService,
    pub executions: ExecutionService<SqliteExecutionRepository, SqliteAreaTriggerCounter>,
    pub stats: ExecutionStatsAggregator<SqliteExecutionRepository>,
    pub services: SqliteServiceRepository,
    pub users: SqliteUserRepository,
}

impl App {
    /// Open the database, run migrations and build one provider client per
    /// configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a provider
    /// client cannot be built.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let db = pool::Config {
            database_url: config.database_url().to_string(),
        }
        .build()
        .await?;

        let mut providers = ProviderSet::new();
        for (name, provider) in &config.providers {
            let client = ReqwestOAuth2Client::new(name.as_str(), provider.clone())?;
            if !client.is_configured() {
                tracing::warn!(provider = %name, "provider has no credentials or token endpoint");
            }
            providers.insert(name.as_str(), client);
        }
        tracing::debug!(providers = ?providers.names(), "providers registered");

        Ok(Self::from_database(&db, providers))
    }

    /// Wire the services over an open database.
    #[must_use]
    pub fn from_database(db: &Database, providers: ProviderSet<ReqwestOAuth2Client>) -> Self {
        let pool = db.pool();
        Self {
            links: ServiceLinkService::new(
                SqliteServiceAccountRepository::new(pool.clone()),
                SqliteServiceRepository::new(pool.clone()),
                SqliteUserRepository::new(pool.clone()),
                providers,
            ),
            executions: ExecutionService::new(
                SqliteExecutionRepository::new(pool.clone()),
                Arc::new(SqliteAreaTriggerCounter::new(pool.clone())),
            ),
            stats: ExecutionStatsAggregator::new(SqliteExecutionRepository::new(pool.clone())),
            services: SqliteServiceRepository::new(pool.clone()),
            users: SqliteUserRepository::new(pool.clone()),
        }
    }
}
