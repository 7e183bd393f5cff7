use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use chrono::{DateTime, Datelike, Months, Utc};

use crate::models::{CategoryCount, MonthlyData, MonthlyReport, Suggestion};

pub const TOP_CATEGORY_LIMIT: usize = 5;

/// Builds the report for the `months` calendar months ending now.
pub fn generate_monthly_report(suggestions: &[Suggestion], months: u32) -> MonthlyReport {
    generate_monthly_report_at(suggestions, months, Utc::now())
}

/// Same as [`generate_monthly_report`] with an explicit window end.
///
/// A record is in the window when `window_start(now, months) <= created_at <= now`.
/// Input records are never mutated; the echoed list is sorted newest first.
pub fn generate_monthly_report_at(
    suggestions: &[Suggestion],
    months: u32,
    now: DateTime<Utc>,
) -> MonthlyReport {
    let start = window_start(now, months);
    let filtered: Vec<Suggestion> = suggestions
        .iter()
        .filter(|suggestion| suggestion.created_at >= start && suggestion.created_at <= now)
        .cloned()
        .collect();

    let implemented_suggestions = filtered.iter().filter(|s| s.is_implemented()).count();
    let top_categories = summarize_categories(&filtered, TOP_CATEGORY_LIMIT);
    let monthly_data = summarize_by_month(&filtered);

    let mut recent = filtered;
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    MonthlyReport {
        total_suggestions: recent.len(),
        implemented_suggestions,
        top_categories,
        monthly_data,
        suggestions: recent,
    }
}

/// Calendar-month subtraction; the day is clamped to the end of shorter months.
pub fn window_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Counts per category, highest first. Ties keep first-seen order.
pub fn summarize_categories(suggestions: &[Suggestion], limit: usize) -> Vec<CategoryCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();

    for category in suggestions.iter().filter_map(Suggestion::ranked_category) {
        match index.get(category) {
            Some(&position) => counts[position].count += 1,
            None => {
                index.insert(category, counts.len());
                counts.push(CategoryCount {
                    category: category.to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// One bucket per (year, month) of `created_at`, most recent first.
pub fn summarize_by_month(suggestions: &[Suggestion]) -> Vec<MonthlyData> {
    let mut buckets: BTreeMap<(i32, u32), (usize, usize)> = BTreeMap::new();

    for suggestion in suggestions {
        let key = (suggestion.created_at.year(), suggestion.created_at.month());
        let entry = buckets.entry(key).or_insert((0, 0));
        entry.0 += 1;
        if suggestion.is_implemented() {
            entry.1 += 1;
        }
    }

    buckets
        .into_iter()
        .rev()
        .map(|((year, month), (total, implemented))| MonthlyData {
            month,
            year,
            total_suggestions: total,
            implemented_suggestions: implemented,
        })
        .collect()
}

pub fn build_markdown(
    report: &MonthlyReport,
    months: u32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Suggestion Report");
    let _ = writeln!(
        output,
        "Last {} month(s): {} to {}",
        months,
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "- Total suggestions: {}", report.total_suggestions);
    let _ = writeln!(
        output,
        "- Implemented: {} ({:.1}%)",
        report.implemented_suggestions,
        implementation_rate(report)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Categories");

    if report.top_categories.is_empty() {
        let _ = writeln!(output, "No categorized suggestions in this window.");
    } else {
        for category in report.top_categories.iter() {
            let _ = writeln!(output, "- {}: {}", category.category, category.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Breakdown");

    if report.monthly_data.is_empty() {
        let _ = writeln!(output, "No suggestions recorded for this window.");
    } else {
        for bucket in report.monthly_data.iter() {
            let _ = writeln!(
                output,
                "- {}-{:02}: {} suggestions, {} implemented",
                bucket.year,
                bucket.month,
                bucket.total_suggestions,
                bucket.implemented_suggestions
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Suggestions");

    if report.suggestions.is_empty() {
        let _ = writeln!(output, "No suggestions recorded for this window.");
    } else {
        for suggestion in report.suggestions.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) on {}: {}",
                suggestion.customer_name,
                suggestion.ranked_category().unwrap_or("uncategorized"),
                suggestion.status,
                suggestion.created_at.format("%Y-%m-%d"),
                suggestion.content
            );
        }
    }

    output
}

fn implementation_rate(report: &MonthlyReport) -> f64 {
    if report.total_suggestions == 0 {
        0.0
    } else {
        report.implemented_suggestions as f64 * 100.0 / report.total_suggestions as f64
    }
}
