use std::io::Read;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    check_len, Suggestion, SuggestionPriority, SuggestionStatus, ANONYMOUS_NAME,
    DEFAULT_CATEGORY, MAX_CATEGORY_CHARS, MAX_CONTENT_CHARS, MAX_EMAIL_CHARS, MAX_NAME_CHARS,
};
use crate::store::SuggestionStore;

const SELECT_COLUMNS: &str = "SELECT id, content, customer_name, customer_email, created_at, \
     status, category, priority, is_anonymous, response, response_date \
     FROM survey_app.suggestions";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let mut inserted = 0usize;
    for suggestion in sample_suggestions(Utc::now())? {
        inserted += insert_if_absent(pool, &suggestion).await? as usize;
    }
    Ok(inserted)
}

/// Fixed sample set, dated relative to `now` so reports always have data.
pub fn sample_suggestions(now: DateTime<Utc>) -> anyhow::Result<Vec<Suggestion>> {
    let rows = vec![
        (
            "6f1c2a0e-5b0f-4d59-9d0c-3f6f3a7d2b10",
            "Add a dark mode to the survey builder",
            "Avery Lee",
            "avery.lee@example.com",
            3,
            SuggestionStatus::New,
            Some("UI/UX"),
            false,
        ),
        (
            "a2b7e4c1-0d8e-4b3a-8f65-2c1d9e7b5a44",
            "Export survey results to PDF reports",
            "Jules Moreno",
            "jules.moreno@example.com",
            18,
            SuggestionStatus::Implemented,
            Some("Features"),
            false,
        ),
        (
            "c9d4f1b2-7e3a-4c6d-b1a8-5e2f0d9c8b77",
            "Survey links sometimes expire before the deadline",
            ANONYMOUS_NAME,
            "anon@example.com",
            35,
            SuggestionStatus::Reviewed,
            Some("Bug Fix"),
            true,
        ),
        (
            "1e8a6b3d-2c5f-4a7e-9b0d-6f3c1a4e2d95",
            "Let customers save partially completed surveys",
            "Kiara Patel",
            "kiara.patel@example.com",
            64,
            SuggestionStatus::Implemented,
            Some("Features"),
            false,
        ),
        (
            "5b3e9c7a-4d1f-4e2b-a6c8-0d7f2b1e9a36",
            "Charts on the results page load slowly",
            "Noor Haddad",
            "noor.haddad@example.com",
            120,
            SuggestionStatus::Rejected,
            Some("Performance"),
            false,
        ),
    ];

    let mut suggestions = Vec::with_capacity(rows.len());
    for (id, content, name, email, days_ago, status, category, is_anonymous) in rows {
        suggestions.push(Suggestion {
            id: Uuid::parse_str(id)?,
            content: content.to_string(),
            customer_name: name.to_string(),
            customer_email: email.to_string(),
            created_at: now - Duration::days(days_ago),
            status,
            category: category.map(str::to_string),
            priority: None,
            is_anonymous,
            response: None,
            response_date: None,
        });
    }

    Ok(suggestions)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    id: Option<Uuid>,
    content: String,
    customer_name: String,
    customer_email: String,
    created_at: String,
    status: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    is_anonymous: Option<bool>,
}

impl CsvRow {
    fn into_suggestion(self) -> anyhow::Result<Suggestion> {
        let created_at = DateTime::parse_from_rfc3339(self.created_at.trim())
            .with_context(|| format!("invalid created_at `{}`", self.created_at))?
            .with_timezone(&Utc);
        let status = match non_blank(self.status) {
            Some(value) => value.parse()?,
            None => SuggestionStatus::New,
        };
        let priority = non_blank(self.priority)
            .map(|value| value.parse::<SuggestionPriority>())
            .transpose()?;
        let content = self.content.trim().to_string();
        if content.is_empty() {
            anyhow::bail!("content must not be empty");
        }
        let category = non_blank(self.category)
            .map(|category| category.trim().to_string())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let is_anonymous = self.is_anonymous.unwrap_or(false);
        let customer_name = if is_anonymous {
            ANONYMOUS_NAME.to_string()
        } else {
            self.customer_name
        };

        check_len("content", &content, MAX_CONTENT_CHARS).map_err(anyhow::Error::msg)?;
        check_len("customer_name", &customer_name, MAX_NAME_CHARS).map_err(anyhow::Error::msg)?;
        check_len("customer_email", &self.customer_email, MAX_EMAIL_CHARS)
            .map_err(anyhow::Error::msg)?;
        check_len("category", &category, MAX_CATEGORY_CHARS).map_err(anyhow::Error::msg)?;

        Ok(Suggestion {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            content,
            customer_name,
            customer_email: self.customer_email,
            created_at,
            status,
            category: Some(category),
            priority,
            is_anonymous,
            response: None,
            response_date: None,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Parses every row up front so a malformed file imports nothing.
pub fn parse_csv<R: Read>(source: R) -> anyhow::Result<Vec<Suggestion>> {
    let mut reader = csv::Reader::from_reader(source);
    let mut suggestions = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("row {line}: unreadable record"))?;
        let suggestion = row
            .into_suggestion()
            .with_context(|| format!("row {line}: rejected"))?;
        suggestions.push(suggestion);
    }

    Ok(suggestions)
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let suggestions = parse_csv(file)?;

    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;
    for suggestion in suggestions.iter() {
        let result = bind_suggestion(
            sqlx::query(
                r#"
                INSERT INTO survey_app.suggestions
                (id, content, customer_name, customer_email, created_at, status,
                 category, priority, is_anonymous, response, response_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (id) DO NOTHING
                "#,
            ),
            suggestion,
        )
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }
    tx.commit().await?;

    Ok(inserted)
}

async fn insert_if_absent(pool: &PgPool, suggestion: &Suggestion) -> anyhow::Result<bool> {
    let result = bind_suggestion(
        sqlx::query(
            r#"
            INSERT INTO survey_app.suggestions
            (id, content, customer_name, customer_email, created_at, status,
             category, priority, is_anonymous, response, response_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        ),
        suggestion,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_suggestion<'q>(query: PgQuery<'q>, suggestion: &'q Suggestion) -> PgQuery<'q> {
    query
        .bind(suggestion.id)
        .bind(&suggestion.content)
        .bind(&suggestion.customer_name)
        .bind(&suggestion.customer_email)
        .bind(suggestion.created_at)
        .bind(suggestion.status.as_str())
        .bind(suggestion.category.as_deref())
        .bind(suggestion.priority.map(SuggestionPriority::as_str))
        .bind(suggestion.is_anonymous)
        .bind(suggestion.response.as_deref())
        .bind(suggestion.response_date)
}

fn suggestion_from_row(row: &PgRow) -> anyhow::Result<Suggestion> {
    let status: String = row.try_get("status")?;
    let priority: Option<String> = row.try_get("priority")?;

    Ok(Suggestion {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        created_at: row.try_get("created_at")?,
        status: status.parse()?,
        category: row.try_get("category")?,
        priority: priority.map(|value| value.parse()).transpose()?,
        is_anonymous: row.try_get("is_anonymous")?,
        response: row.try_get("response")?,
        response_date: row.try_get("response_date")?,
    })
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, query: PgQuery<'_>) -> anyhow::Result<Vec<Suggestion>> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(suggestion_from_row).collect()
    }
}

#[async_trait]
impl SuggestionStore for PgStore {
    async fn all(&self) -> anyhow::Result<Vec<Suggestion>> {
        let query = format!("{SELECT_COLUMNS} ORDER BY created_at DESC");
        self.fetch(sqlx::query(&query))
            .await
            .context("failed to load suggestions")
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Suggestion>> {
        let query = format!("{SELECT_COLUMNS} WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(suggestion_from_row).transpose()
    }

    async fn by_status(&self, status: SuggestionStatus) -> anyhow::Result<Vec<Suggestion>> {
        let query = format!("{SELECT_COLUMNS} WHERE status = $1 ORDER BY created_at DESC");
        self.fetch(sqlx::query(&query).bind(status.as_str())).await
    }

    async fn by_category(&self, category: &str) -> anyhow::Result<Vec<Suggestion>> {
        let query = format!("{SELECT_COLUMNS} WHERE category = $1 ORDER BY created_at DESC");
        self.fetch(sqlx::query(&query).bind(category)).await
    }

    async fn search(&self, term: &str) -> anyhow::Result<Vec<Suggestion>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "{SELECT_COLUMNS} \
             WHERE LOWER(content) LIKE $1 \
             OR LOWER(customer_name) LIKE $1 \
             OR LOWER(COALESCE(category, '')) LIKE $1 \
             ORDER BY created_at DESC"
        );
        self.fetch(sqlx::query(&query).bind(escape_like(&term))).await
    }

    async fn insert(&self, suggestion: &Suggestion) -> anyhow::Result<()> {
        bind_suggestion(
            sqlx::query(
                r#"
                INSERT INTO survey_app.suggestions
                (id, content, customer_name, customer_email, created_at, status,
                 category, priority, is_anonymous, response, response_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            ),
            suggestion,
        )
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert suggestion {}", suggestion.id))?;
        Ok(())
    }

    async fn update(&self, suggestion: &Suggestion) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE survey_app.suggestions
            SET status = $2, category = $3, priority = $4, response = $5, response_date = $6
            WHERE id = $1
            "#,
        )
        .bind(suggestion.id)
        .bind(suggestion.status.as_str())
        .bind(suggestion.category.as_deref())
        .bind(suggestion.priority.map(SuggestionPriority::as_str))
        .bind(suggestion.response.as_deref())
        .bind(suggestion.response_date)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update suggestion {}", suggestion.id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM survey_app.suggestions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
