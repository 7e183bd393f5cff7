use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    check_len, MonthlyReport, NewSuggestion, StatusUpdate, Suggestion, SuggestionStatus,
    ANONYMOUS_NAME, DEFAULT_CATEGORY, MAX_CATEGORY_CHARS, MAX_CONTENT_CHARS, MAX_EMAIL_CHARS,
    MAX_NAME_CHARS, MAX_RESPONSE_CHARS,
};
use crate::report;
use crate::similar;
use crate::store::SuggestionStore;

pub const MAX_REPORT_MONTHS: i64 = 12;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes outgoing mail to the log instead of delivering it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(to, subject, body, "email queued");
        Ok(())
    }
}

pub struct SuggestionService {
    store: Arc<dyn SuggestionStore>,
    notifier: Arc<dyn Notifier>,
    admin_email: String,
}

impl SuggestionService {
    pub fn new(
        store: Arc<dyn SuggestionStore>,
        notifier: Arc<dyn Notifier>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            admin_email: admin_email.into(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Suggestion>, AppError> {
        Ok(self.store.all().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Suggestion, AppError> {
        self.store.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn by_status(&self, status: &str) -> Result<Vec<Suggestion>, AppError> {
        let status = parse_status(status)?;
        Ok(self.store.by_status(status).await?)
    }

    pub async fn by_category(&self, category: &str) -> Result<Vec<Suggestion>, AppError> {
        Ok(self.store.by_category(category).await?)
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Suggestion>, AppError> {
        Ok(self.store.search(term).await?)
    }

    pub async fn create(&self, input: NewSuggestion) -> Result<Suggestion, AppError> {
        validate_new(&input)?;

        let category = input
            .category
            .map(|category| category.trim().to_string())
            .filter(|category| !category.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let suggestion = Suggestion {
            id: Uuid::new_v4(),
            content: input.content.trim().to_string(),
            customer_name: if input.is_anonymous {
                ANONYMOUS_NAME.to_string()
            } else {
                input.customer_name
            },
            customer_email: input.customer_email,
            created_at: Utc::now(),
            status: SuggestionStatus::New,
            category: Some(category),
            priority: None,
            is_anonymous: input.is_anonymous,
            response: None,
            response_date: None,
        };

        self.store.insert(&suggestion).await?;
        info!(id = %suggestion.id, "suggestion received");

        self.notify(
            &self.admin_email,
            "New Suggestion Received",
            &format!(
                "A new suggestion has been received from {}: {}",
                suggestion.customer_name, suggestion.content
            ),
        )
        .await;

        Ok(suggestion)
    }

    pub async fn update_status(&self, id: Uuid, update: StatusUpdate) -> Result<(), AppError> {
        let status = parse_status(&update.status)?;
        let response = update
            .response
            .filter(|response| !response.trim().is_empty());
        if let Some(response) = response.as_deref() {
            check_len("response", response, MAX_RESPONSE_CHARS)
                .map_err(AppError::Validation)?;
        }

        let mut suggestion = self.store.get(id).await?.ok_or(AppError::NotFound)?;
        suggestion.status = status;
        if let Some(response) = response.as_ref() {
            suggestion.response = Some(response.clone());
            suggestion.response_date = Some(Utc::now());
        }

        if !self.store.update(&suggestion).await? {
            return Err(AppError::NotFound);
        }
        info!(id = %id, status = %status, "suggestion status updated");

        if let Some(response) = response {
            if !suggestion.is_anonymous {
                self.notify(
                    &suggestion.customer_email,
                    &format!("Update on Your Suggestion: {status}"),
                    &format!(
                        "Your suggestion has been updated to status: {status}.\n\nResponse: {response}"
                    ),
                )
                .await;
            }
        }

        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.delete(id).await? {
            info!(id = %id, "suggestion deleted");
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn monthly_report(&self, months: i64) -> Result<MonthlyReport, AppError> {
        if !(1..=MAX_REPORT_MONTHS).contains(&months) {
            return Err(AppError::validation("Months must be between 1 and 12"));
        }

        let suggestions = self.store.all().await?;
        Ok(report::generate_monthly_report(&suggestions, months as u32))
    }

    pub async fn find_similar(&self, content: &str) -> Result<Vec<Suggestion>, AppError> {
        if similar::search_terms(content).is_empty() {
            return Ok(Vec::new());
        }

        let suggestions = self.store.all().await?;
        Ok(similar::find_similar(content, &suggestions)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn notify(&self, to: &str, subject: &str, body: &str) {
        if let Err(e) = self.notifier.send(to, subject, body).await {
            warn!("failed to send notification to {to}: {e:#}");
        }
    }
}

fn parse_status(value: &str) -> Result<SuggestionStatus, AppError> {
    value
        .parse()
        .map_err(|_| AppError::validation("Invalid status value"))
}

fn validate_new(input: &NewSuggestion) -> Result<(), AppError> {
    if input.content.trim().is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    if !input.is_anonymous {
        if input.customer_name.trim().is_empty() {
            return Err(AppError::validation("customerName is required"));
        }
        if input.customer_email.trim().is_empty() {
            return Err(AppError::validation("customerEmail is required"));
        }
    }
    check_len("content", input.content.trim(), MAX_CONTENT_CHARS)
        .map_err(AppError::Validation)?;
    check_len("customerName", &input.customer_name, MAX_NAME_CHARS)
        .map_err(AppError::Validation)?;
    check_len("customerEmail", &input.customer_email, MAX_EMAIL_CHARS)
        .map_err(AppError::Validation)?;
    if let Some(category) = input.category.as_deref() {
        check_len("category", category.trim(), MAX_CATEGORY_CHARS)
            .map_err(AppError::Validation)?;
    }
    Ok(())
}
