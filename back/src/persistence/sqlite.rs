use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use todo_api::v1::ToDoItem;

use super::{from_db_id, to_db_id, PagingOptions, StoreError, ToDoStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS to_do_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL DEFAULT '',
    completed BOOLEAN NOT NULL DEFAULT FALSE,
    due_date DATETIME,
    completed_at DATETIME,
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL
)";

const COLUMNS: &str = "id, description, completed, due_date, completed_at, created_at, updated_at";

#[derive(FromRow)]
struct ToDoRow {
    id: i64,
    description: String,
    completed: bool,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ToDoRow> for ToDoItem {
    fn from(row: ToDoRow) -> Self {
        Self {
            id: from_db_id(row.id),
            description: row.description,
            completed: row.completed,
            due_date: row.due_date,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, StoreError> {
        // every connection to `sqlite::memory:` opens its own database
        let max_connections = if dsn.contains(":memory:") {
            1
        } else {
            max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(dsn)
            .await?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ToDoStore for SqliteStore {
    async fn insert(&self, item: &ToDoItem) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO to_do_items \
             (description, completed, due_date, completed_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.description)
        .bind(item.completed)
        .bind(item.due_date)
        .bind(item.completed_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(from_db_id(result.last_insert_rowid()))
    }

    async fn delete(&self, id: u64) -> Result<u64, StoreError> {
        let Some(id) = to_db_id(id) else {
            return Ok(0);
        };

        let result = sqlx::query("DELETE FROM to_do_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM to_do_items")
            .fetch_one(&self.pool)
            .await?;

        Ok(from_db_id(count))
    }

    async fn fetch_page(&self, options: PagingOptions) -> Result<Vec<ToDoItem>, StoreError> {
        let rows: Vec<ToDoRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM to_do_items ORDER BY id ASC LIMIT ? OFFSET ?"
        ))
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ToDoItem::from).collect())
    }

    async fn fetch_one(&self, id: u64) -> Result<Option<ToDoItem>, StoreError> {
        let Some(id) = to_db_id(id) else {
            return Ok(None);
        };

        let row: Option<ToDoRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM to_do_items WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ToDoItem::from))
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
