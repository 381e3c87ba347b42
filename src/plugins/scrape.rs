//! Heading-walk scraper for vendor changelog pages that publish no feed.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::RawArticle;

const DATE_PATTERN: &str = r"(?i)(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2}";

const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d", "%d %B %Y", "%d %b %Y"];

/// Scrapes changelog-style pages: walks heading elements, detects a date
/// pattern in each, and collects the following text blocks as content until
/// the next heading.
pub struct ChangelogScraper {
    plugin_name: String,
    id_prefix: String,
    vendor: String,
    page_url: String,
    categories: Vec<String>,
    date_pattern: Regex,
}

impl ChangelogScraper {
    pub fn new(
        plugin_name: impl Into<String>,
        id_prefix: impl Into<String>,
        vendor: impl Into<String>,
        page_url: impl Into<String>,
        categories: &[&str],
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            id_prefix: id_prefix.into(),
            vendor: vendor.into(),
            page_url: page_url.into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            date_pattern: Regex::new(DATE_PATTERN).expect("date pattern compiles"),
        }
    }

    /// Extract changelog entries from a fetched page.
    pub fn parse(&self, html: &str, since: Option<DateTime<Utc>>) -> Vec<RawArticle> {
        let document = Html::parse_document(html);
        let headings = Selector::parse("h1, h2, h3, h4").expect("heading selector compiles");

        let mut articles: Vec<RawArticle> = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();

        for heading in document.select(&headings) {
            let text = collapse_whitespace(&heading.text().collect::<String>());
            let Some(date_match) = self.date_pattern.find(&text) else {
                continue;
            };
            let date_str = date_match.as_str().to_string();
            let published_at = parse_entry_date(&date_str);

            if let (Some(since), Some(published)) = (since, published_at) {
                if published < since {
                    continue;
                }
            }

            let mut title = text.clone();
            if title.len() > 200 {
                let cut = title
                    .char_indices()
                    .take_while(|(i, _)| *i <= 200)
                    .last()
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                title.truncate(cut);
                title.push_str("...");
            }

            let content = self.collect_entry_content(heading);
            if content.len() < 20 {
                continue;
            }

            let external_id = self.entry_id(&title, &date_str);
            if !seen_ids.insert(external_id.clone()) {
                continue;
            }

            let mut article = RawArticle::new(external_id, self.page_url.clone());
            article.title = title;
            article.content = content;
            article.published_at = published_at;
            article.vendor = self.vendor.clone();
            article.categories = self.categories.clone();
            article
                .metadata
                .insert("source".to_string(), self.plugin_name.clone());
            article
                .metadata
                .insert("url".to_string(), self.page_url.clone());
            articles.push(article);
        }

        articles
    }

    /// `external_id = vendor + hash(title|date)`, truncated for readability.
    fn entry_id(&self, title: &str, date_str: &str) -> String {
        let digest = md5::compute(format!("{title}-{date_str}").as_bytes());
        let hex = format!("{digest:x}");
        format!("{}-{}", self.id_prefix, &hex[..12])
    }

    /// Text blocks adjacent to the heading, until the next heading or ten
    /// blocks, whichever comes first.
    fn collect_entry_content(&self, heading: ElementRef<'_>) -> String {
        let mut parts: Vec<String> = Vec::new();

        for sibling in heading.next_siblings() {
            let Some(element) = ElementRef::wrap(sibling) else {
                continue;
            };
            let tag = element.value().name();
            if matches!(tag, "h1" | "h2" | "h3" | "h4") {
                break;
            }
            let text = collapse_whitespace(&element.text().collect::<String>());
            if text.len() > 10 && !self.date_pattern.is_match(&text) {
                parts.push(text);
            }
            if parts.len() >= 10 {
                break;
            }
        }

        parts.join(" ")
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_entry_date(date_str: &str) -> Option<DateTime<Utc>> {
    let cleaned = collapse_whitespace(date_str);
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    const SAMPLE_PAGE: &str = r#"
        <html><body>
          <h2>January 15, 2024</h2>
          <p>Added streaming support to the messages endpoint for all models.</p>
          <p>Raised default rate limits for paid tiers.</p>
          <h2>2023-12-01</h2>
          <p>Introduced tool use in public beta across the platform.</p>
          <h2>Roadmap</h2>
          <p>This heading has no date and must be skipped entirely.</p>
        </body></html>
    "#;

    fn scraper() -> ChangelogScraper {
        ChangelogScraper::new(
            "anthropic-changelog",
            "anthropic",
            "Anthropic",
            "https://docs.anthropic.com/en/release-notes/overview",
            &["api", "changelog"],
        )
    }

    #[test]
    fn extracts_dated_entries() {
        let articles = scraper().parse(SAMPLE_PAGE, None);
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert!(first.external_id.starts_with("anthropic-"));
        assert_eq!(first.published_at.unwrap().year(), 2024);
        assert!(first.content.contains("streaming support"));
        assert!(first.content.contains("rate limits"));
        assert_eq!(first.vendor, "Anthropic");

        let second = &articles[1];
        assert_eq!(second.published_at.unwrap().month(), 12);
        assert!(second.content.contains("tool use"));
    }

    #[test]
    fn since_filter_drops_older_entries() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let articles = scraper().parse(SAMPLE_PAGE, Some(since));
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].published_at.unwrap().year(), 2024);
    }

    #[test]
    fn stable_ids_for_same_entry() {
        let a = scraper().parse(SAMPLE_PAGE, None);
        let b = scraper().parse(SAMPLE_PAGE, None);
        assert_eq!(a[0].external_id, b[0].external_id);
    }

    #[test]
    fn date_formats_parse() {
        assert!(parse_entry_date("January 15, 2024").is_some());
        assert!(parse_entry_date("Jan 15, 2024").is_some());
        assert!(parse_entry_date("2024-01-15").is_some());
        assert!(parse_entry_date("not a date").is_none());
    }
}
