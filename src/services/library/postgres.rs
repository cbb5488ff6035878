use sqlx::PgPool;
use tokio::sync::watch;

use crate::{
    error::AppResult,
    services::library::{IdSet, LibraryStore, MemoryStore},
};

/// Library persisted in PostgreSQL
///
/// Both sets are loaded once at startup. Each mutation is committed to the
/// database before the in-memory snapshot is published, so subscribers never
/// see a state that was not persisted.
pub struct PostgresStore {
    db_pool: PgPool,
    snapshots: MemoryStore,
}

impl PostgresStore {
    pub async fn new(db_pool: PgPool) -> AppResult<Self> {
        let favorites = Self::load_ids(&db_pool, "SELECT book_id FROM favorite_books").await?;
        let blocked = Self::load_ids(&db_pool, "SELECT book_id FROM blocked_books").await?;

        tracing::info!(
            favorites = favorites.len(),
            blocked = blocked.len(),
            "Loaded library from database"
        );

        Ok(Self {
            db_pool,
            snapshots: MemoryStore::with_state(favorites, blocked),
        })
    }

    async fn load_ids(db_pool: &PgPool, sql: &str) -> AppResult<IdSet> {
        let rows = sqlx::query_scalar::<_, String>(sql).fetch_all(db_pool).await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl LibraryStore for PostgresStore {
    fn favorites(&self) -> watch::Receiver<IdSet> {
        self.snapshots.favorites()
    }

    fn blocked(&self) -> watch::Receiver<IdSet> {
        self.snapshots.blocked()
    }

    async fn add_favorite(&self, id: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO favorite_books (book_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        self.snapshots.add_favorite(id).await
    }

    async fn remove_favorite(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM favorite_books WHERE book_id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        self.snapshots.remove_favorite(id).await
    }

    async fn add_blocked(&self, id: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO blocked_books (book_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        self.snapshots.add_blocked(id).await
    }
}
