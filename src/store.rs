use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Suggestion, SuggestionStatus};

/// Data access for suggestions. Listings come back newest first.
#[async_trait]
pub trait SuggestionStore: Send + Sync {
    async fn all(&self) -> anyhow::Result<Vec<Suggestion>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Suggestion>>;
    async fn by_status(&self, status: SuggestionStatus) -> anyhow::Result<Vec<Suggestion>>;
    async fn by_category(&self, category: &str) -> anyhow::Result<Vec<Suggestion>>;
    async fn search(&self, term: &str) -> anyhow::Result<Vec<Suggestion>>;
    async fn insert(&self, suggestion: &Suggestion) -> anyhow::Result<()>;
    /// Returns false when no record has the given id.
    async fn update(&self, suggestion: &Suggestion) -> anyhow::Result<bool>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Default)]
pub struct MemoryStore {
    suggestions: RwLock<Vec<Suggestion>>,
}

impl MemoryStore {
    pub fn with_suggestions(suggestions: Vec<Suggestion>) -> Self {
        Self {
            suggestions: RwLock::new(suggestions),
        }
    }

    async fn select<F>(&self, keep: F) -> Vec<Suggestion>
    where
        F: Fn(&Suggestion) -> bool,
    {
        let mut selected: Vec<Suggestion> = self
            .suggestions
            .read()
            .await
            .iter()
            .filter(|suggestion| keep(*suggestion))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected
    }
}

#[async_trait]
impl SuggestionStore for MemoryStore {
    async fn all(&self) -> anyhow::Result<Vec<Suggestion>> {
        Ok(self.select(|_| true).await)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Suggestion>> {
        Ok(self
            .suggestions
            .read()
            .await
            .iter()
            .find(|suggestion| suggestion.id == id)
            .cloned())
    }

    async fn by_status(&self, status: SuggestionStatus) -> anyhow::Result<Vec<Suggestion>> {
        Ok(self.select(|suggestion| suggestion.status == status).await)
    }

    async fn by_category(&self, category: &str) -> anyhow::Result<Vec<Suggestion>> {
        Ok(self
            .select(|suggestion| suggestion.category.as_deref() == Some(category))
            .await)
    }

    async fn search(&self, term: &str) -> anyhow::Result<Vec<Suggestion>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .select(|suggestion| {
                suggestion.content.to_lowercase().contains(&term)
                    || suggestion.customer_name.to_lowercase().contains(&term)
                    || suggestion
                        .category
                        .as_deref()
                        .is_some_and(|category| category.to_lowercase().contains(&term))
            })
            .await)
    }

    async fn insert(&self, suggestion: &Suggestion) -> anyhow::Result<()> {
        let mut suggestions = self.suggestions.write().await;
        if suggestions.iter().any(|existing| existing.id == suggestion.id) {
            anyhow::bail!("suggestion {} already exists", suggestion.id);
        }
        suggestions.push(suggestion.clone());
        Ok(())
    }

    async fn update(&self, suggestion: &Suggestion) -> anyhow::Result<bool> {
        let mut suggestions = self.suggestions.write().await;
        match suggestions.iter_mut().find(|existing| existing.id == suggestion.id) {
            Some(existing) => {
                *existing = suggestion.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut suggestions = self.suggestions.write().await;
        let before = suggestions.len();
        suggestions.retain(|suggestion| suggestion.id != id);
        Ok(suggestions.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample(content: &str, days_ago: i64, category: &str) -> Suggestion {
        Suggestion {
            id: Uuid::new_v4(),
            content: content.to_string(),
            customer_name: "Kiara Patel".to_string(),
            customer_email: "kiara@example.com".to_string(),
            created_at: Utc::now() - Duration::days(days_ago),
            status: SuggestionStatus::New,
            category: Some(category.to_string()),
            priority: None,
            is_anonymous: false,
            response: None,
            response_date: None,
        }
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = MemoryStore::with_suggestions(vec![
            sample("older", 10, "Features"),
            sample("newest", 1, "Features"),
            sample("middle", 5, "UI/UX"),
        ]);

        let all = store.all().await.unwrap();
        let contents: Vec<&str> = all.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["newest", "middle", "older"]);
    }

    #[tokio::test]
    async fn search_covers_content_name_and_category() {
        let store = MemoryStore::with_suggestions(vec![
            sample("Faster exports", 1, "Performance"),
            sample("Better charts", 2, "UI/UX"),
        ]);

        assert_eq!(store.search("EXPORT").await.unwrap().len(), 1);
        assert_eq!(store.search("ui/ux").await.unwrap().len(), 1);
        assert_eq!(store.search("kiara").await.unwrap().len(), 2);
        assert!(store.search("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filters_by_status_and_category() {
        let mut implemented = sample("Done already", 3, "Features");
        implemented.status = SuggestionStatus::Implemented;
        let store = MemoryStore::with_suggestions(vec![
            implemented,
            sample("Still open", 1, "Features"),
        ]);

        assert_eq!(
            store
                .by_status(SuggestionStatus::Implemented)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(store.by_category("Features").await.unwrap().len(), 2);
        assert!(store.by_category("features").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_ids() {
        let store = MemoryStore::default();
        let mut suggestion = sample("Add filters", 1, "Features");
        store.insert(&suggestion).await.unwrap();
        assert!(store.insert(&suggestion).await.is_err());

        suggestion.status = SuggestionStatus::Reviewed;
        assert!(store.update(&suggestion).await.unwrap());
        assert_eq!(
            store.get(suggestion.id).await.unwrap().unwrap().status,
            SuggestionStatus::Reviewed
        );

        assert!(store.delete(suggestion.id).await.unwrap());
        assert!(!store.delete(suggestion.id).await.unwrap());
        assert!(!store.update(&suggestion).await.unwrap());
        assert!(store.get(suggestion.id).await.unwrap().is_none());
    }
}
