use crate::models::Suggestion;

pub const MIN_QUERY_CHARS: usize = 5;
pub const MIN_TOKEN_CHARS: usize = 4;
pub const MAX_MATCHES: usize = 5;

/// Keyword filter: a candidate matches when any query token longer than three
/// characters appears in its lower-cased content. Input order is preserved.
pub fn find_similar<'a>(content: &str, candidates: &'a [Suggestion]) -> Vec<&'a Suggestion> {
    let terms = search_terms(content);
    if terms.is_empty() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|candidate| {
            let text = candidate.content.to_lowercase();
            terms.iter().any(|term| text.contains(term.as_str()))
        })
        .take(MAX_MATCHES)
        .collect()
}

pub fn search_terms(content: &str) -> Vec<String> {
    if content.trim().is_empty() || content.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }

    content
        .to_lowercase()
        .split_whitespace()
        .filter(|term| term.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}
