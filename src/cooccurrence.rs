//! Tag co-occurrence mining: technologies adjacent to the user's stack.

use std::collections::{BTreeSet, HashMap};

use crate::models::{Article, TrendingTechnology};

const MIN_COOCCURRENCE: usize = 2;
const MAX_SAMPLE_ARTICLES: usize = 3;

/// Finds technologies that frequently appear alongside the user's declared
/// stack but are not part of it. Purely combinatorial; no LLM involved, and
/// accuracy improves as articles accumulate.
pub struct CoOccurrenceAnalyzer {
    tech_stack: BTreeSet<String>,
    max_results: usize,
}

struct TagEntry {
    count: usize,
    related_to: BTreeSet<String>,
    sample_article_ids: Vec<String>,
}

impl CoOccurrenceAnalyzer {
    pub fn new(tech_stack: &[String], max_results: usize) -> Self {
        Self {
            tech_stack: tech_stack.iter().map(|t| t.trim().to_lowercase()).collect(),
            max_results,
        }
    }

    /// Rank tags outside the stack by how often they co-occur with it.
    pub fn analyze(&self, articles: &[Article]) -> Vec<TrendingTechnology> {
        if self.tech_stack.is_empty() || articles.is_empty() {
            return Vec::new();
        }

        let mut outside_tags: HashMap<String, TagEntry> = HashMap::new();

        for article in articles {
            if article.tags.is_empty() {
                continue;
            }

            let normalized: BTreeSet<String> = article
                .tags
                .iter()
                .filter_map(|t| normalize_tag(t))
                .collect();

            let stack_hits: BTreeSet<String> = normalized
                .intersection(&self.tech_stack)
                .cloned()
                .collect();
            if stack_hits.is_empty() {
                continue;
            }

            for tag in normalized.difference(&self.tech_stack) {
                let entry = outside_tags.entry(tag.clone()).or_insert_with(|| TagEntry {
                    count: 0,
                    related_to: BTreeSet::new(),
                    sample_article_ids: Vec::new(),
                });
                entry.count += 1;
                entry.related_to.extend(stack_hits.iter().cloned());
                if entry.sample_article_ids.len() < MAX_SAMPLE_ARTICLES {
                    entry.sample_article_ids.push(article.external_id.clone());
                }
            }
        }

        let mut ranked: Vec<(String, TagEntry)> = outside_tags
            .into_iter()
            .filter(|(_, entry)| entry.count >= MIN_COOCCURRENCE)
            .collect();
        // Count descending, name ascending for deterministic output.
        ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_results);

        ranked
            .into_iter()
            .map(|(name, entry)| TrendingTechnology {
                name,
                count: entry.count,
                related_to: entry.related_to.into_iter().collect(),
                sample_article_ids: entry.sample_article_ids,
            })
            .collect()
    }
}

/// Normalize a tag for comparison: lowercase, keep the segment after a
/// structured prefix (`category:aws` -> `aws`) and before a comma.
fn normalize_tag(tag: &str) -> Option<String> {
    let mut tag = tag.trim().to_lowercase();
    if let Some((_, after)) = tag.rsplit_once(':') {
        tag = after.trim().to_string();
    }
    if let Some((before, _)) = tag.split_once(',') {
        tag = before.trim().to_string();
    }
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}
