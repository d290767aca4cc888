use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use todo_api::v1::ToDoItem;

use crate::{
    auth::{AuthError, Authorizer, Introspection},
    persistence::{PagingOptions, SqliteStore, StoreError, ToDoEntityManager, ToDoStore},
};

/// In-memory SQLite manager holding items 1..=10 described as
/// "Todo Item 0" through "Todo Item 9".
pub async fn test_manager() -> ToDoEntityManager {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let store = SqliteStore::new(pool.clone());
    store.migrate().await.unwrap();

    let now = Utc::now();
    for i in 0..10 {
        sqlx::query(
            "INSERT INTO to_do_items \
             (id, description, completed, due_date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(i + 1)
        .bind(format!("Todo Item {i}"))
        .bind(false)
        .bind(parse_test_date("2025-01-01"))
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();
    }

    ToDoEntityManager::new(Arc::new(store))
}

pub fn parse_test_date(date: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn collect_ids(items: &[ToDoItem]) -> Vec<u64> {
    items.iter().map(|item| item.id).collect()
}

pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn check_authorization(
        &self,
        _header: &str,
        _role: &str,
    ) -> Result<Introspection, AuthError> {
        Ok(Introspection::default())
    }
}

/// Store double that counts calls. A failing one errors on every call, a
/// page-failing one only when fetching a page, an empty one holds no rows.
#[derive(Default)]
pub struct RecordingStore {
    pub calls: AtomicUsize,
    fail: Failure,
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
enum Failure {
    #[default]
    Never,
    Always,
    FetchPage,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: Failure::Always,
        }
    }

    pub fn failing_page_fetch() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: Failure::FetchPage,
        }
    }

    pub fn failure() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }

    fn record(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail == Failure::Always {
            Err(Self::failure())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ToDoStore for RecordingStore {
    async fn insert(&self, _item: &ToDoItem) -> Result<u64, StoreError> {
        self.record()?;
        Ok(1)
    }

    async fn delete(&self, _id: u64) -> Result<u64, StoreError> {
        self.record()?;
        Ok(0)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.record()?;
        Ok(0)
    }

    async fn fetch_page(&self, _options: PagingOptions) -> Result<Vec<ToDoItem>, StoreError> {
        self.record()?;
        if self.fail == Failure::FetchPage {
            return Err(Self::failure());
        }
        Ok(Vec::new())
    }

    async fn fetch_one(&self, _id: u64) -> Result<Option<ToDoItem>, StoreError> {
        self.record()?;
        Ok(None)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        self.record()
    }

    async fn close(&self) {}
}
