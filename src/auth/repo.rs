use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistent user records. Email uniqueness is enforced by `create` itself,
/// so a lookup beforehand is an early exit, never the guarantee.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> Result<User, CreateUserError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// Find a user by email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, firstname, lastname, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Insert a new user; the `users_email_key` constraint rejects duplicates.
    async fn create(&self, user: NewUser) -> Result<User, CreateUserError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (firstname, lastname, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, firstname, lastname, email, password_hash, created_at
            "#,
        )
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        Ok(created)
    }
}

fn map_insert_error(e: sqlx::Error) -> CreateUserError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => CreateUserError::Duplicate,
        other => CreateUserError::Other(anyhow::Error::new(other).context("insert user")),
    }
}

/// In-process store keyed by email. Check and insert happen under one write
/// lock, which gives the same guarantee as the database constraint.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, CreateUserError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(CreateUserError::Duplicate);
        }
        let created = User {
            id: Uuid::new_v4(),
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(created.email.clone(), created.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::sync::Arc;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            firstname: "Ada".into(),
            lastname: "Lovelace".into(),
            email: email.into(),
            password_hash: "$2b$10$notarealhashbutlongenoughtolookright".into(),
        }
    }

    #[derive(Debug)]
    struct FakeDbError {
        unique: bool,
    }

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("fake database error")
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }
        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }
    }

    #[test]
    fn unique_violation_maps_to_duplicate() {
        let err = map_insert_error(sqlx::Error::Database(Box::new(FakeDbError { unique: true })));
        assert!(matches!(err, CreateUserError::Duplicate));
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err = map_insert_error(sqlx::Error::Database(Box::new(FakeDbError { unique: false })));
        assert!(matches!(err, CreateUserError::Other(_)));

        let err = map_insert_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, CreateUserError::Other(_)));
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("ada@example.com")).await.unwrap();
        let found = store
            .find_by_email("ada@example.com")
            .await
            .unwrap()
            .expect("user should be found");
        assert_eq!(found.id, created.id);
        assert_eq!(found.firstname, "Ada");
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.create(new_user("ada@example.com")).await.unwrap();
        let err = store.create(new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, CreateUserError::Duplicate));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_creates_admit_one() {
        let store = Arc::new(MemoryUserStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create(new_user("race@example.com")).await })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(CreateUserError::Duplicate) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.count().await, 1);
    }
}
