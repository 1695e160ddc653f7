//! Static ayah corpus lookups.

use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::Ayah;

use crate::StorageError;

/// Ayah repository. The corpus is seeded out-of-band and immutable at
/// runtime, so every method is read-only.
#[derive(Clone)]
pub struct AyahRepository {
    pool: PgPool,
}

impl AyahRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All ayahs of one mushaf page, in reading order.
    pub async fn list_page(&self, page_number: i32) -> Result<Vec<Ayah>, StorageError> {
        sqlx::query_as::<_, Ayah>(
            "SELECT * FROM ayahs WHERE page_number = $1 ORDER BY surah_number, ayah_number",
        )
        .bind(page_number)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Every seeded page number.
    pub async fn pages(&self) -> Result<Vec<i32>, StorageError> {
        let rows: Vec<(i32,)> =
            sqlx::query_as("SELECT DISTINCT page_number FROM ayahs ORDER BY page_number")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::Query)?;
        Ok(rows.into_iter().map(|(page,)| page).collect())
    }

    /// Pages on which the user has at least one memorized ayah.
    pub async fn memorized_pages(&self, user_id: Uuid) -> Result<Vec<i32>, StorageError> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT a.page_number
            FROM user_item_states s
            JOIN ayahs a ON a.id = s.ayah_id
            WHERE s.user_id = $1 AND s.status = 'MEMORIZED'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(rows.into_iter().map(|(page,)| page).collect())
    }
}
