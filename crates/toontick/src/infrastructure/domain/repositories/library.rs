use async_trait::async_trait;
use itertools::Itertools;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::{
    domain::{
        entities::library::{LibraryItem, ManhwaId, NewLibraryItem, normalize_status, title_key},
        repositories::library::{LibraryRepository, LibraryRepositoryError},
    },
    infrastructure::database::Pool,
};

const COLUMNS: &str = r#"id,
    user_id,
    manhwa_id,
    title,
    image,
    status,
    chapters,
    progress,
    average_score,
    popularity,
    year,
    created_at,
    updated_at"#;

#[derive(Clone)]
pub struct LibraryRepositoryImpl {
    pool: Pool,
}

impl LibraryRepositoryImpl {
    pub fn new<P: Into<Pool>>(pool: P) -> Self {
        Self { pool: pool.into() }
    }
}

fn row_to_item(row: SqliteRow) -> Result<LibraryItem, sqlx::Error> {
    let status: String = row.try_get("status")?;

    Ok(LibraryItem {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        manhwa_id: ManhwaId::new(row.try_get::<String, _>("manhwa_id")?),
        title: row.try_get("title")?,
        image: row.try_get("image")?,
        status: normalize_status(&status),
        chapters: row.try_get("chapters")?,
        progress: row.try_get("progress")?,
        average_score: row.try_get("average_score")?,
        popularity: row.try_get("popularity")?,
        year: row.try_get("year")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl LibraryRepository for LibraryRepositoryImpl {
    async fn get_library(&self, user_id: &str) -> Result<Vec<LibraryItem>, LibraryRepositoryError> {
        let items = sqlx::query(&format!(
            r#"SELECT {COLUMNS}
            FROM user_library
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC"#
        ))
        .bind(user_id)
        .fetch_all(&self.pool as &SqlitePool)
        .await?
        .into_iter()
        .map(row_to_item)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    async fn get_by_manhwa_id(
        &self,
        user_id: &str,
        manhwa_id: &ManhwaId,
    ) -> Result<Option<LibraryItem>, LibraryRepositoryError> {
        let row = sqlx::query(&format!(
            r#"SELECT {COLUMNS}
            FROM user_library
            WHERE user_id = ? AND manhwa_id = ?"#
        ))
        .bind(user_id)
        .bind(manhwa_id.as_str())
        .fetch_optional(&self.pool as &SqlitePool)
        .await?;

        Ok(row.map(row_to_item).transpose()?)
    }

    async fn get_by_title(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<Vec<LibraryItem>, LibraryRepositoryError> {
        // sqlite LOWER only folds ascii, compare with the same key as the guest slot
        let key = title_key(title);
        let items = sqlx::query(&format!(
            r#"SELECT {COLUMNS}
            FROM user_library
            WHERE user_id = ?
            ORDER BY created_at, id"#
        ))
        .bind(user_id)
        .fetch_all(&self.pool as &SqlitePool)
        .await?
        .into_iter()
        .map(row_to_item)
        .filter_ok(|item| title_key(&item.title) == key)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    async fn insert(&self, item: &NewLibraryItem) -> Result<LibraryItem, LibraryRepositoryError> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO user_library(
                user_id,
                manhwa_id,
                title,
                image,
                status,
                chapters,
                progress,
                average_score,
                popularity,
                year,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {COLUMNS}"#
        ))
        .bind(&item.user_id)
        .bind(item.manhwa_id.as_str())
        .bind(&item.title)
        .bind(&item.image)
        .bind(item.status.as_str())
        .bind(item.chapters)
        .bind(item.progress)
        .bind(item.average_score)
        .bind(item.popularity)
        .bind(item.year)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&self.pool as &SqlitePool)
        .await?;

        Ok(row_to_item(row)?)
    }

    async fn upsert(
        &self,
        items: &[NewLibraryItem],
    ) -> Result<Vec<LibraryItem>, LibraryRepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query(&format!(
                r#"INSERT INTO user_library(
                    user_id,
                    manhwa_id,
                    title,
                    image,
                    status,
                    chapters,
                    progress,
                    average_score,
                    popularity,
                    year,
                    created_at,
                    updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, manhwa_id) DO UPDATE SET
                    title = excluded.title,
                    image = excluded.image,
                    status = excluded.status,
                    chapters = excluded.chapters,
                    progress = excluded.progress,
                    average_score = excluded.average_score,
                    popularity = excluded.popularity,
                    year = excluded.year,
                    updated_at = excluded.updated_at
                RETURNING {COLUMNS}"#
            ))
            .bind(&item.user_id)
            .bind(item.manhwa_id.as_str())
            .bind(&item.title)
            .bind(&item.image)
            .bind(item.status.as_str())
            .bind(item.chapters)
            .bind(item.progress)
            .bind(item.average_score)
            .bind(item.popularity)
            .bind(item.year)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(&mut *tx)
            .await?;

            stored.push(row_to_item(row)?);
        }

        tx.commit().await?;

        Ok(stored)
    }

    async fn update(
        &self,
        item: &LibraryItem,
    ) -> Result<Option<LibraryItem>, LibraryRepositoryError> {
        let row = sqlx::query(&format!(
            r#"UPDATE user_library SET
                title = ?,
                image = ?,
                status = ?,
                chapters = ?,
                progress = ?,
                average_score = ?,
                popularity = ?,
                year = ?,
                updated_at = ?
            WHERE user_id = ? AND manhwa_id = ?
            RETURNING {COLUMNS}"#
        ))
        .bind(&item.title)
        .bind(&item.image)
        .bind(item.status.as_str())
        .bind(item.chapters)
        .bind(item.progress)
        .bind(item.average_score)
        .bind(item.popularity)
        .bind(item.year)
        .bind(item.updated_at)
        .bind(&item.user_id)
        .bind(item.manhwa_id.as_str())
        .fetch_optional(&self.pool as &SqlitePool)
        .await?;

        Ok(row.map(row_to_item).transpose()?)
    }

    async fn delete(
        &self,
        user_id: &str,
        manhwa_id: &ManhwaId,
    ) -> Result<(), LibraryRepositoryError> {
        sqlx::query("DELETE FROM user_library WHERE user_id = ? AND manhwa_id = ?")
            .bind(user_id)
            .bind(manhwa_id.as_str())
            .execute(&self.pool as &SqlitePool)
            .await?;

        Ok(())
    }

    async fn delete_by_id(&self, user_id: &str, id: i64) -> Result<bool, LibraryRepositoryError> {
        let result = sqlx::query("DELETE FROM user_library WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool as &SqlitePool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
