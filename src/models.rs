use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ANONYMOUS_NAME: &str = "Anonymous";
pub const DEFAULT_CATEGORY: &str = "Other";

pub const MAX_CONTENT_CHARS: usize = 1000;
pub const MAX_NAME_CHARS: usize = 200;
pub const MAX_EMAIL_CHARS: usize = 200;
pub const MAX_CATEGORY_CHARS: usize = 100;
pub const MAX_RESPONSE_CHARS: usize = 1000;

/// Column limits shared by every intake path.
pub fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    New,
    Reviewed,
    Implemented,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionStatus::New => "new",
            SuggestionStatus::Reviewed => "reviewed",
            SuggestionStatus::Implemented => "implemented",
            SuggestionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(SuggestionStatus::New),
            "reviewed" => Ok(SuggestionStatus::Reviewed),
            "implemented" => Ok(SuggestionStatus::Implemented),
            "rejected" => Ok(SuggestionStatus::Rejected),
            other => anyhow::bail!("unknown suggestion status `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
}

impl SuggestionPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionPriority::Low => "low",
            SuggestionPriority::Medium => "medium",
            SuggestionPriority::High => "high",
        }
    }
}

impl FromStr for SuggestionPriority {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(SuggestionPriority::Low),
            "medium" => Ok(SuggestionPriority::Medium),
            "high" => Ok(SuggestionPriority::High),
            other => anyhow::bail!("unknown suggestion priority `{other}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: Uuid,
    pub content: String,
    pub customer_name: String,
    pub customer_email: String,
    pub created_at: DateTime<Utc>,
    pub status: SuggestionStatus,
    pub category: Option<String>,
    pub priority: Option<SuggestionPriority>,
    pub is_anonymous: bool,
    pub response: Option<String>,
    pub response_date: Option<DateTime<Utc>>,
}

impl Suggestion {
    /// Category used for ranking; blank categories count as missing.
    pub fn ranked_category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
    }

    pub fn is_implemented(&self) -> bool {
        self.status == SuggestionStatus::Implemented
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSuggestion {
    pub content: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    pub category: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: String,
    pub response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyData {
    pub month: u32,
    pub year: i32,
    pub total_suggestions: usize,
    pub implemented_suggestions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub total_suggestions: usize,
    pub implemented_suggestions: usize,
    pub top_categories: Vec<CategoryCount>,
    pub monthly_data: Vec<MonthlyData>,
    pub suggestions: Vec<Suggestion>,
}
