//! SQLite persistence for collected posts, accepted trends and queued search actions.

use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use trend_core::{
    CoreError, DatabaseError, NewSearchAction, NewTrend, SearchAction, SearchActionStatus,
    SocialInput, SourcePlatform, StoredPost, Trend,
};


/// The operations the collector and the trend pipeline need from storage.
pub trait TrendStore {
    /// Highest engagement first, ties by ascending id.
    async fn fetch_top_posts(&self, limit: u32) -> Result<Vec<StoredPost>, CoreError>;

    /// Insert or overwrite by `(source_platform, external_id)`. Returns rows affected.
    async fn upsert_social_inputs(&self, inputs: &[SocialInput]) -> Result<u64, CoreError>;

    async fn insert_trend(&self, trend: &NewTrend) -> Result<Trend, CoreError>;

    async fn insert_search_actions(
        &self,
        actions: &[NewSearchAction],
    ) -> Result<Vec<SearchAction>, CoreError>;
}

impl<T: TrendStore> TrendStore for &T {
    async fn fetch_top_posts(&self, limit: u32) -> Result<Vec<StoredPost>, CoreError> {
        (**self).fetch_top_posts(limit).await
    }

    async fn upsert_social_inputs(&self, inputs: &[SocialInput]) -> Result<u64, CoreError> {
        (**self).upsert_social_inputs(inputs).await
    }

    async fn insert_trend(&self, trend: &NewTrend) -> Result<Trend, CoreError> {
        (**self).insert_trend(trend).await
    }

    async fn insert_search_actions(
        &self,
        actions: &[NewSearchAction],
    ) -> Result<Vec<SearchAction>, CoreError> {
        (**self).insert_search_actions(actions).await
    }
}

pub struct Database {
    connection_string: String,
    max_connections: u32,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            max_connections: 4,
            pool: None,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Open the pool, creating the database file if needed.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| connection_failed(&self.connection_string, e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| connection_failed(&self.connection_string, e))?;

        info!("Connected to {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;

        debug!("Migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionFailed {
                reason: "database is not connected".to_string(),
            }
            .into()
        })
    }

    pub async fn count_social_inputs(&self) -> Result<i64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM social_inputs")
            .fetch_one(self.pool()?)
            .await
            .map_err(query_error)?;
        Ok(count)
    }

    pub async fn list_trends(&self) -> Result<Vec<Trend>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, summary, source_platform, created_at FROM trends ORDER BY id ASC",
        )
        .fetch_all(self.pool()?)
        .await
        .map_err(query_error)?;

        rows.iter().map(trend_from_row).collect()
    }

    pub async fn list_search_actions(
        &self,
        status: Option<SearchActionStatus>,
    ) -> Result<Vec<SearchAction>, CoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT id, trend_id, search_phrase, status, created_at \
                     FROM search_actions WHERE status = ? ORDER BY id ASC",
                )
                .bind(status.as_str())
                .fetch_all(self.pool()?)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, trend_id, search_phrase, status, created_at \
                     FROM search_actions ORDER BY id ASC",
                )
                .fetch_all(self.pool()?)
                .await
            }
        }
        .map_err(query_error)?;

        rows.iter().map(search_action_from_row).collect()
    }
}

impl TrendStore for Database {
    async fn fetch_top_posts(&self, limit: u32) -> Result<Vec<StoredPost>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, source_platform, title, content, engagement_score \
             FROM social_inputs ORDER BY engagement_score DESC, id ASC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool()?)
        .await
        .map_err(query_error)?;

        let posts = rows
            .iter()
            .map(stored_post_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Fetched {} posts", posts.len());
        Ok(posts)
    }

    async fn upsert_social_inputs(&self, inputs: &[SocialInput]) -> Result<u64, CoreError> {
        if inputs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool()?.begin().await.map_err(query_error)?;
        let collected_at = Utc::now();
        let mut affected = 0;

        for input in inputs {
            let result = sqlx::query(
                "INSERT INTO social_inputs \
                    (source_platform, external_id, title, content, url, author_name, \
                     posted_at, engagement_score, metadata, collected_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (source_platform, external_id) DO UPDATE SET \
                    title = excluded.title, \
                    content = excluded.content, \
                    url = excluded.url, \
                    author_name = excluded.author_name, \
                    posted_at = excluded.posted_at, \
                    engagement_score = excluded.engagement_score, \
                    metadata = excluded.metadata, \
                    collected_at = excluded.collected_at",
            )
            .bind(input.source_platform.as_str())
            .bind(&input.external_id)
            .bind(&input.title)
            .bind(&input.content)
            .bind(&input.url)
            .bind(&input.author_name)
            .bind(input.posted_at)
            .bind(input.engagement_score)
            .bind(input.metadata.to_string())
            .bind(collected_at)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

            affected += result.rows_affected();
        }

        tx.commit().await.map_err(query_error)?;
        debug!("Upserted {} social inputs", affected);
        Ok(affected)
    }

    async fn insert_trend(&self, trend: &NewTrend) -> Result<Trend, CoreError> {
        let created_at = Utc::now();
        let result =
            sqlx::query("INSERT INTO trends (summary, source_platform, created_at) VALUES (?, ?, ?)")
                .bind(&trend.summary)
                .bind(&trend.source_platform)
                .bind(created_at)
                .execute(self.pool()?)
                .await
                .map_err(query_error)?;

        Ok(Trend {
            id: result.last_insert_rowid(),
            summary: trend.summary.clone(),
            source_platform: trend.source_platform.clone(),
            created_at,
        })
    }

    async fn insert_search_actions(
        &self,
        actions: &[NewSearchAction],
    ) -> Result<Vec<SearchAction>, CoreError> {
        let mut tx = self.pool()?.begin().await.map_err(query_error)?;
        let created_at = Utc::now();
        let mut inserted = Vec::with_capacity(actions.len());

        for action in actions {
            let result = sqlx::query(
                "INSERT INTO search_actions (trend_id, search_phrase, status, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(action.trend_id)
            .bind(&action.search_phrase)
            .bind(action.status.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

            inserted.push(SearchAction {
                id: result.last_insert_rowid(),
                trend_id: action.trend_id,
                search_phrase: action.search_phrase.clone(),
                status: action.status,
                created_at,
            });
        }

        tx.commit().await.map_err(query_error)?;
        Ok(inserted)
    }
}

fn connection_failed(url: &str, error: impl std::fmt::Display) -> CoreError {
    DatabaseError::ConnectionFailed {
        reason: format!("{}: {}", url, error),
    }
    .into()
}

fn query_error(error: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_error) = &error {
        match db_error.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                return DatabaseError::ConstraintViolation {
                    constraint: db_error.message().to_string(),
                }
                .into();
            }
            _ if db_error.message().contains("database is locked") => {
                return DatabaseError::DatabaseLocked.into();
            }
            _ => {}
        }
    }
    DatabaseError::Sql(error).into()
}

fn corrupt(table: &str, details: impl ToString) -> CoreError {
    DatabaseError::CorruptRow {
        table: table.to_string(),
        details: details.to_string(),
    }
    .into()
}

fn stored_post_from_row(row: &SqliteRow) -> Result<StoredPost, CoreError> {
    let platform: String = row.try_get("source_platform").map_err(query_error)?;
    Ok(StoredPost {
        id: row.try_get("id").map_err(query_error)?,
        source_platform: SourcePlatform::from_str(&platform)
            .map_err(|e| corrupt("social_inputs", e))?,
        title: row.try_get("title").map_err(query_error)?,
        content: row.try_get("content").map_err(query_error)?,
        engagement_score: row.try_get("engagement_score").map_err(query_error)?,
    })
}

fn trend_from_row(row: &SqliteRow) -> Result<Trend, CoreError> {
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(query_error)?;
    Ok(Trend {
        id: row.try_get("id").map_err(query_error)?,
        summary: row.try_get("summary").map_err(query_error)?,
        source_platform: row.try_get("source_platform").map_err(query_error)?,
        created_at,
    })
}

fn search_action_from_row(row: &SqliteRow) -> Result<SearchAction, CoreError> {
    let status: String = row.try_get("status").map_err(query_error)?;
    Ok(SearchAction {
        id: row.try_get("id").map_err(query_error)?,
        trend_id: row.try_get("trend_id").map_err(query_error)?,
        search_phrase: row.try_get("search_phrase").map_err(query_error)?,
        status: SearchActionStatus::from_str(&status)
            .map_err(|e| corrupt("search_actions", e))?,
        created_at: row.try_get("created_at").map_err(query_error)?,
    })
}
