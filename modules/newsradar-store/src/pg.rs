// Postgres repositories. Writers are serialised by the database; readers
// see the effect of every committed insert.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use newsradar_common::{Article, Source};

use crate::error::{Result, StoreError};
use crate::{ArticleRepo, SourceRepo};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// A row from the articles table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    source_id: i32,
    url: String,
    title: String,
    content: String,
    published_at: chrono::DateTime<Utc>,
    created_at: chrono::DateTime<Utc>,
    cluster_id: Option<Uuid>,
    companies: Vec<String>,
    people: Vec<String>,
}

impl From<ArticleRow> for Article {
    fn from(r: ArticleRow) -> Self {
        Article {
            id: r.id,
            source_id: r.source_id,
            url: r.url,
            title: r.title,
            content: r.content,
            published_at: r.published_at,
            created_at: r.created_at,
            cluster_id: r.cluster_id,
            companies: r.companies,
            people: r.people,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: i32,
    name: String,
    url: String,
    reputation_score: f64,
    created_at: chrono::DateTime<Utc>,
}

impl From<SourceRow> for Source {
    fn from(r: SourceRow) -> Self {
        Source {
            id: r.id,
            name: r.name,
            url: r.url,
            reputation: r.reputation_score,
            created_at: r.created_at,
        }
    }
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ArticleRepo for PgStore {
    async fn insert(&self, article: &Article) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (id, source_id, url, title, content, published_at, created_at,
                 cluster_id, companies, people)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(article.id)
        .bind(article.source_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.published_at)
        .bind(article.created_at)
        .bind(article.cluster_id)
        .bind(&article.companies)
        .bind(&article.people)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateUrl(article.url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recent(&self, window_hours: u32) -> Result<Vec<Article>> {
        let cutoff = Utc::now() - Duration::hours(window_hours as i64);
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT * FROM articles
            WHERE published_at >= $1 AND published_at <= now()
            ORDER BY published_at DESC, id DESC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn by_cluster(&self, cluster_id: Uuid) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT * FROM articles
            WHERE cluster_id = $1
            ORDER BY published_at ASC, id ASC
            "#,
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn count_in_cluster(&self, cluster_id: Uuid, window_hours: u32) -> Result<i64> {
        let cutoff = Utc::now() - Duration::hours(window_hours as i64);
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT count(*) FROM articles
            WHERE cluster_id = $1 AND published_at >= $2
            "#,
        )
        .bind(cluster_id)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn urls(&self) -> Result<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>("SELECT url FROM articles")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }

    async fn cluster_members(&self) -> Result<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT id, cluster_id FROM articles WHERE cluster_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE id = ANY($1) ORDER BY published_at ASC, id ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }
}

#[async_trait]
impl SourceRepo for PgStore {
    async fn get_or_create(&self, name: &str, url: &str) -> Result<i32> {
        let inserted = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO sources (name, url)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        // Lost the race (or the row predates us): re-read.
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM sources WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn get(&self, id: i32) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Source::from))
    }

    async fn list(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Source::from).collect())
    }

    async fn reputations(&self) -> Result<HashMap<i32, f64>> {
        let rows = sqlx::query_as::<_, (i32, f64)>("SELECT id, reputation_score FROM sources")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn set_reputation(&self, id: i32, reputation: f64) -> Result<()> {
        let result = sqlx::query("UPDATE sources SET reputation_score = $1 WHERE id = $2")
            .bind(reputation)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SourceNotFound(id));
        }
        Ok(())
    }
}
