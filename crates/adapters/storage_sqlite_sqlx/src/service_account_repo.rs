//! `SQLite` implementation of [`ServiceAccountRepository`], the token store.
//!
//! Each write is a single statement, so a concurrent reader sees either the
//! previous token triple or the new one, never a mix.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::ServiceAccountRepository;
use areaflow_domain::account_link::ServiceAccountLink;
use areaflow_domain::error::{AreaFlowError, ConflictError};
use areaflow_domain::id::{ServiceAccountId, ServiceId, UserId};
use areaflow_domain::secret::SecretString;

use crate::codec::{decode_id, decode_opt_ts, decode_ts, encode_ts};
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`ServiceAccountLink`].
struct Wrapper(ServiceAccountLink);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<ServiceAccountLink> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;
        let service_id: String = row.try_get("service_id")?;
        let access_token: String = row.try_get("access_token")?;
        let refresh_token: Option<String> = row.try_get("refresh_token")?;
        let token_expires_at: Option<String> = row.try_get("token_expires_at")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(ServiceAccountLink {
            id: decode_id(&id)?,
            user_id: decode_id(&user_id)?,
            service_id: decode_id(&service_id)?,
            access_token: SecretString::from(access_token),
            refresh_token: refresh_token.map(SecretString::from),
            token_expires_at: decode_opt_ts(token_expires_at)?,
            provider_account_id: row.try_get("provider_account_id")?,
            email: row.try_get("email")?,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO service_accounts (
        id, user_id, service_id, access_token, refresh_token, token_expires_at,
        provider_account_id, email, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    RETURNING *
";

const UPSERT_TOKENS: &str = r"
    INSERT INTO service_accounts (
        id, user_id, service_id, access_token, refresh_token, token_expires_at,
        provider_account_id, email, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (user_id, service_id) DO UPDATE SET
        access_token = excluded.access_token,
        refresh_token = excluded.refresh_token,
        token_expires_at = excluded.token_expires_at,
        updated_at = excluded.updated_at
    RETURNING *
";

const UPDATE_TOKENS: &str = r"
    UPDATE service_accounts
    SET access_token = ?, refresh_token = ?, token_expires_at = ?, updated_at = ?
    WHERE user_id = ? AND service_id = ?
    RETURNING *
";

const UPDATE_PROFILE: &str = r"
    UPDATE service_accounts
    SET provider_account_id = ?, email = ?
    WHERE user_id = ? AND service_id = ?
";

const SELECT_BY_PAIR: &str = "SELECT * FROM service_accounts WHERE user_id = ? AND service_id = ?";
const SELECT_BY_ID: &str = "SELECT * FROM service_accounts WHERE id = ?";
const SELECT_BY_USER: &str =
    "SELECT * FROM service_accounts WHERE user_id = ? ORDER BY created_at ASC";
const DELETE_BY_PAIR: &str = "DELETE FROM service_accounts WHERE user_id = ? AND service_id = ?";

/// `SQLite`-backed token store.
pub struct SqliteServiceAccountRepository {
    pool: SqlitePool,
}

impl SqliteServiceAccountRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Bind every column of `link` in table order.
fn bind_insert<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Sqlite, Wrapper, sqlx::sqlite::SqliteArguments<'q>>,
    link: &ServiceAccountLink,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, Wrapper, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(link.id.to_string())
        .bind(link.user_id.to_string())
        .bind(link.service_id.to_string())
        .bind(link.access_token.expose().to_string())
        .bind(link.refresh_token.as_ref().map(|t| t.expose().to_string()))
        .bind(link.token_expires_at.map(encode_ts))
        .bind(link.provider_account_id.clone())
        .bind(link.email.clone())
        .bind(encode_ts(link.created_at))
        .bind(encode_ts(link.updated_at))
}

impl ServiceAccountRepository for SqliteServiceAccountRepository {
    fn get(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> impl Future<Output = Result<Option<ServiceAccountLink>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_PAIR)
                .bind(user_id.to_string())
                .bind(service_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_by_id(
        &self,
        id: ServiceAccountId,
    ) -> impl Future<Output = Result<Option<ServiceAccountLink>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn find_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<ServiceAccountLink>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_USER)
                .bind(user_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn create(
        &self,
        link: ServiceAccountLink,
    ) -> impl Future<Output = Result<ServiceAccountLink, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Wrapper = bind_insert(sqlx::query_as(INSERT), &link)
                .fetch_one(&pool)
                .await
                .map_err(|err| {
                    let err = StorageError::from(err);
                    if err.is_unique_violation() {
                        AreaFlowError::from(ConflictError::AlreadyLinked {
                            user_id: link.user_id.to_string(),
                            service_id: link.service_id.to_string(),
                        })
                    } else {
                        err.into()
                    }
                })?;

            Ok(row.0)
        }
    }

    fn upsert_tokens(
        &self,
        link: ServiceAccountLink,
    ) -> impl Future<Output = Result<ServiceAccountLink, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Wrapper = bind_insert(sqlx::query_as(UPSERT_TOKENS), &link)
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.0)
        }
    }

    fn update_tokens(
        &self,
        link: &ServiceAccountLink,
    ) -> impl Future<Output = Result<Option<ServiceAccountLink>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        let access_token = link.access_token.expose().to_string();
        let refresh_token = link.refresh_token.as_ref().map(|t| t.expose().to_string());
        let token_expires_at = link.token_expires_at.map(encode_ts);
        let updated_at = encode_ts(link.updated_at);
        let user_id = link.user_id.to_string();
        let service_id = link.service_id.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(UPDATE_TOKENS)
                .bind(access_token)
                .bind(refresh_token)
                .bind(token_expires_at)
                .bind(updated_at)
                .bind(user_id)
                .bind(service_id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn update_profile(
        &self,
        link: &ServiceAccountLink,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        let pool = self.pool.clone();
        let provider_account_id = link.provider_account_id.clone();
        let email = link.email.clone();
        let user_id = link.user_id.to_string();
        let service_id = link.service_id.to_string();
        async move {
            sqlx::query(UPDATE_PROFILE)
                .bind(provider_account_id)
                .bind(email)
                .bind(user_id)
                .bind(service_id)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn delete(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> impl Future<Output = Result<bool, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BY_PAIR)
                .bind(user_id.to_string())
                .bind(service_id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() > 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_repo::{SqliteServiceRepository, SqliteUserRepository};
    use crate::pool::Config;
    use areaflow_domain::error::ErrorKind;
    use areaflow_domain::oauth::TokenGrant;
    use areaflow_domain::service::Service;
    use areaflow_domain::time::{Timestamp, now};
    use areaflow_domain::user::User;
    use chrono::Duration;

    struct Fixture {
        repo: SqliteServiceAccountRepository,
        user_id: UserId,
        service_id: ServiceId,
    }

    async fn setup() -> Fixture {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let user = SqliteUserRepository::new(db.pool().clone())
            .create(User {
                id: UserId::new(),
                email: "ada@example.com".to_string(),
                name: None,
            })
            .await
            .unwrap();
        let service = SqliteServiceRepository::new(db.pool().clone())
            .create(Service::builder().name("google").build().unwrap())
            .await
            .unwrap();
        Fixture {
            repo: SqliteServiceAccountRepository::new(db.pool().clone()),
            user_id: user.id,
            service_id: service.id,
        }
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn link(
        fx: &Fixture,
        access: &str,
        refresh: Option<&str>,
        at: Timestamp,
    ) -> ServiceAccountLink {
        ServiceAccountLink::from_grant(
            fx.user_id,
            fx.service_id,
            TokenGrant::issued(access.into(), refresh.map(SecretString::from), Some(3600), at),
            at,
        )
    }

    #[tokio::test]
    async fn should_create_and_retrieve_link() {
        let fx = setup().await;
        let created = fx
            .repo
            .create(link(&fx, "a1", Some("r1"), ts("2024-01-01T10:00:00Z")))
            .await
            .unwrap();

        let fetched = fx.repo.get(fx.user_id, fx.service_id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.access_token.expose(), "a1");
        assert_eq!(fetched.refresh_token.unwrap().expose(), "r1");
        assert_eq!(fetched.token_expires_at, Some(ts("2024-01-01T11:00:00Z")));

        let by_id = fx.repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.user_id, fx.user_id);
        assert_eq!(fx.repo.find_by_user(fx.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_map_duplicate_create_to_conflict() {
        let fx = setup().await;
        fx.repo.create(link(&fx, "a1", None, now())).await.unwrap();

        let err = fx.repo.create(link(&fx, "a2", None, now())).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn should_keep_identity_and_profile_when_upserting_existing_pair() {
        let fx = setup().await;
        let first = fx
            .repo
            .upsert_tokens(link(&fx, "a1", Some("r1"), ts("2024-01-01T10:00:00Z")))
            .await
            .unwrap();
        let mut profiled = first.clone();
        profiled.provider_account_id = Some("acct-1".to_string());
        profiled.email = Some("ada@gmail.com".to_string());
        fx.repo.update_profile(&profiled).await.unwrap();

        let second = fx
            .repo
            .upsert_tokens(link(&fx, "a2", None, ts("2024-01-02T10:00:00Z")))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.updated_at, ts("2024-01-02T10:00:00Z"));
        assert_eq!(second.access_token.expose(), "a2");
        assert!(second.refresh_token.is_none());
        assert_eq!(second.provider_account_id.as_deref(), Some("acct-1"));
        assert_eq!(second.email.as_deref(), Some("ada@gmail.com"));
        assert_eq!(fx.repo.find_by_user(fx.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_update_tokens_of_existing_link_only() {
        let fx = setup().await;
        let mut stored = fx
            .repo
            .create(link(&fx, "a1", Some("r1"), ts("2024-01-01T10:00:00Z")))
            .await
            .unwrap();

        stored.access_token = "a2".into();
        stored.token_expires_at = Some(ts("2024-01-01T12:00:00Z") + Duration::minutes(5));
        let updated = fx.repo.update_tokens(&stored).await.unwrap().unwrap();
        assert_eq!(updated.access_token.expose(), "a2");
        assert_eq!(updated.refresh_token.unwrap().expose(), "r1");
        assert_eq!(updated.token_expires_at, Some(ts("2024-01-01T12:05:00Z")));

        assert!(fx.repo.delete(fx.user_id, fx.service_id).await.unwrap());
        assert!(fx.repo.update_tokens(&stored).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_report_whether_delete_removed_a_row() {
        let fx = setup().await;
        fx.repo.create(link(&fx, "a1", None, now())).await.unwrap();

        assert!(fx.repo.delete(fx.user_id, fx.service_id).await.unwrap());
        assert!(!fx.repo.delete(fx.user_id, fx.service_id).await.unwrap());
        assert!(fx.repo.get(fx.user_id, fx.service_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_reject_link_for_unknown_user() {
        let fx = setup().await;
        let mut orphan = link(&fx, "a1", None, now());
        orphan.user_id = UserId::new();

        let err = fx.repo.create(orphan).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
