//! `SQLite` implementations of [`ServiceRepository`] and [`UserRepository`].
//!
//! The ports are read-only. The inherent `create` methods exist for seeding
//! and administration.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::{ServiceRepository, UserRepository};
use areaflow_domain::error::AreaFlowError;
use areaflow_domain::id::{ServiceId, UserId};
use areaflow_domain::service::Service;
use areaflow_domain::user::User;

use crate::codec::decode_id;
use crate::error::StorageError;

struct ServiceRow(Service);

impl<'r> FromRow<'r, SqliteRow> for ServiceRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        Ok(Self(Service {
            id: decode_id(&id)?,
            name: row.try_get("name")?,
            requires_auth: row.try_get("requires_auth")?,
        }))
    }
}

struct UserRow(User);

impl<'r> FromRow<'r, SqliteRow> for UserRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        Ok(Self(User {
            id: decode_id(&id)?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
        }))
    }
}

const INSERT_SERVICE: &str = "INSERT INTO services (id, name, requires_auth) VALUES (?, ?, ?)";
const SELECT_SERVICE_BY_ID: &str = "SELECT * FROM services WHERE id = ?";
const SELECT_SERVICE_BY_NAME: &str = "SELECT * FROM services WHERE name = ?";
const INSERT_USER: &str = "INSERT INTO users (id, email, name) VALUES (?, ?, ?)";
const SELECT_USER_BY_ID: &str = "SELECT * FROM users WHERE id = ?";

/// `SQLite`-backed service catalog.
pub struct SqliteServiceRepository {
    pool: SqlitePool,
}

impl SqliteServiceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a service.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails, e.g. on a duplicate name.
    pub async fn create(&self, service: Service) -> Result<Service, AreaFlowError> {
        sqlx::query(INSERT_SERVICE)
            .bind(service.id.to_string())
            .bind(&service.name)
            .bind(service.requires_auth)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(service)
    }

    /// Look a service up by its unique name.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Service>, AreaFlowError> {
        let row: Option<ServiceRow> = sqlx::query_as(SELECT_SERVICE_BY_NAME)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|r| r.0))
    }
}

impl ServiceRepository for SqliteServiceRepository {
    fn get_by_id(
        &self,
        id: ServiceId,
    ) -> impl Future<Output = Result<Option<Service>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<ServiceRow> = sqlx::query_as(SELECT_SERVICE_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|r| r.0))
        }
    }
}

/// `SQLite`-backed user directory.
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails, e.g. on a duplicate email.
    pub async fn create(&self, user: User) -> Result<User, AreaFlowError> {
        sqlx::query(INSERT_USER)
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(&user.name)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(user)
    }
}

impl UserRepository for SqliteUserRepository {
    fn get_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<UserRow> = sqlx::query_as(SELECT_USER_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|r| r.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    async fn setup() -> (SqliteServiceRepository, SqliteUserRepository) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        (
            SqliteServiceRepository::new(db.pool().clone()),
            SqliteUserRepository::new(db.pool().clone()),
        )
    }

    #[tokio::test]
    async fn should_create_and_retrieve_service() {
        let (services, _) = setup().await;
        let service = Service::builder()
            .name("timer")
            .requires_auth(false)
            .build()
            .unwrap();
        let id = service.id;
        services.create(service).await.unwrap();

        let fetched = services.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "timer");
        assert!(!fetched.requires_auth);
        let by_name = services.get_by_name("timer").await.unwrap().unwrap();
        assert_eq!(by_name.id, id);
    }

    #[tokio::test]
    async fn should_create_and_retrieve_user() {
        let (_, users) = setup().await;
        let user = User {
            id: UserId::new(),
            email: "ada@example.com".to_string(),
            name: None,
        };
        let id = user.id;
        users.create(user).await.unwrap();

        let fetched = users.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "ada@example.com");
        assert!(fetched.name.is_none());
    }

    #[tokio::test]
    async fn should_return_none_for_unknown_ids() {
        let (services, users) = setup().await;
        assert!(services.get_by_id(ServiceId::new()).await.unwrap().is_none());
        assert!(users.get_by_id(UserId::new()).await.unwrap().is_none());
    }
}
