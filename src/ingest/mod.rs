// src/ingest/mod.rs
pub mod fetch;
pub mod providers;
pub mod scheduler;
pub mod types;

use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// Per-source cap on accepted entries.
pub const MAX_ITEMS_PER_SOURCE: usize = 50;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ainews_articles_scraped_total",
            "Articles returned by source adapters."
        );
        describe_counter!(
            "ainews_invalid_entries_total",
            "Entries dropped for missing title or link."
        );
        describe_counter!(
            "ainews_duplicates_total",
            "Articles dropped by URL or title-similarity dedup."
        );
        describe_counter!("ainews_news_saved_total", "News rows inserted.");
        describe_counter!(
            "ainews_insert_conflicts_total",
            "Inserts rolled back on unique-URL conflict."
        );
        describe_counter!(
            "ainews_source_errors_total",
            "Sources that failed to fetch or parse."
        );
        describe_counter!("ainews_featured_total", "News marked as featured.");
        describe_counter!("ainews_runs_total", "Pipeline runs started.");
        describe_histogram!("ainews_fetch_ms", "Source fetch time in milliseconds.");
        describe_gauge!(
            "ainews_last_run_ts",
            "Unix ts when the pipeline last finished."
        );
    });
}

/// Strip tags, decode entities, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?s)<[^>]+>").unwrap());
    let out = re_tags.replace_all(s, "");

    let out = html_escape::decode_html_entities(&out).to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Canonical form used for the unique-URL guarantee: no query string, no trailing slash.
pub fn normalize_url(url: &str) -> String {
    let base = url.split('?').next().unwrap_or_default();
    base.trim().trim_end_matches('/').to_string()
}

/// Best-effort timestamp parsing for feed and page dates. Always returns UTC.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive forms are taken as UTC.
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
