mod paginate;
mod postgres;
mod sqlite;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use todo_api::v1::ToDoItem;
use tracing::{debug, info};

pub use paginate::{paginate, PageRequest, PagingConfigurator, PagingOptions};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use crate::config::{DbConfig, DbKind};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Row-level access to the `to_do_items` table.
///
/// Implementations only translate calls into SQL. Timestamps, pagination and
/// not-found handling belong to [`ToDoEntityManager`].
#[async_trait]
pub trait ToDoStore: Send + Sync {
    /// Inserts the item and returns the identifier the database assigned.
    async fn insert(&self, item: &ToDoItem) -> Result<u64, StoreError>;

    /// Returns the number of rows removed.
    async fn delete(&self, id: u64) -> Result<u64, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Fetches one window of items ordered by ascending identifier.
    async fn fetch_page(&self, options: PagingOptions) -> Result<Vec<ToDoItem>, StoreError>;

    async fn fetch_one(&self, id: u64) -> Result<Option<ToDoItem>, StoreError>;

    async fn migrate(&self) -> Result<(), StoreError>;

    async fn close(&self);
}

#[derive(Clone)]
pub struct ToDoEntityManager {
    store: Arc<dyn ToDoStore>,
}

impl fmt::Debug for ToDoEntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToDoEntityManager").finish_non_exhaustive()
    }
}

impl ToDoEntityManager {
    pub fn new(store: Arc<dyn ToDoStore>) -> Self {
        Self { store }
    }

    pub async fn connect(config: &DbConfig) -> eyre::Result<Self> {
        let dsn = config.dsn()?;

        let store: Arc<dyn ToDoStore> = match config.db_type {
            DbKind::Sqlite => {
                Arc::new(SqliteStore::connect(&dsn, config.db_max_connections).await?)
            }
            DbKind::Postgres => {
                Arc::new(PostgresStore::connect(&dsn, config.db_max_connections).await?)
            }
        };

        info!(db_type = ?config.db_type, "connected to database");

        if config.db_auto_migrate {
            store.migrate().await?;
            info!("applied to_do_items schema");
        }

        Ok(Self::new(store))
    }

    /// Stores a new item and writes the assigned identifier and timestamps
    /// back into `item`.
    #[tracing::instrument(skip_all)]
    pub async fn create(&self, item: &mut ToDoItem) -> Result<(), StoreError> {
        let now = Utc::now();
        item.id = 0;
        item.created_at = now;
        item.updated_at = now;

        let id = self.store.insert(item).await?;
        item.id = id;

        info!(id = item.id, "created todo");

        Ok(())
    }

    /// Deleting an identifier that does not exist is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: u64) -> Result<(), StoreError> {
        let removed = self.store.delete(id).await?;

        if removed == 0 {
            debug!(id, "no todo to delete");
        } else {
            info!(id, "deleted todo");
        }

        Ok(())
    }

    /// Returns one page of items and the size of the whole collection.
    #[tracing::instrument(skip_all)]
    pub async fn find_all(
        &self,
        configurators: &[&dyn PagingConfigurator],
    ) -> Result<(Vec<ToDoItem>, u64), StoreError> {
        let options = paginate(configurators);

        let total = self.store.count().await?;
        let items = self.store.fetch_page(options).await?;

        debug!(
            offset = options.offset,
            limit = options.limit,
            returned = items.len(),
            total,
            "listed todos"
        );

        Ok((items, total))
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_one(&self, id: u64) -> Result<ToDoItem, StoreError> {
        self.store.fetch_one(id).await?.ok_or(StoreError::NotFound)
    }

    /// Records every store call of this manager in `metrics`.
    #[cfg(feature = "metrics")]
    pub fn metered(self, metrics: Arc<crate::metrics::Metrics>) -> Self {
        Self::new(Arc::new(crate::metrics::MeteredStore::new(
            self.store, metrics,
        )))
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

// No row can carry an identifier the key column cannot hold.
fn to_db_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn from_db_id(id: i64) -> u64 {
    // primary keys come from an auto-increment sequence starting at 1
    u64::try_from(id).unwrap_or_default()
}
