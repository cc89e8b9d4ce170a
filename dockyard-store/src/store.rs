use sqlx::SqlitePool;

/// Entry point for every read and write against the relational store.
///
/// Entity-specific operations live next to their types (`container.rs`,
/// `job.rs`, ...) as further `impl ConsoleStore` blocks.
#[derive(Clone)]
pub struct ConsoleStore {
    pool: SqlitePool,
}

impl ConsoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap connectivity probe used by readiness checks.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
