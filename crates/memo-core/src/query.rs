//! Derived view over the session collection: category filter, text search
//! and aggregate counts. Nothing here holds state of its own; a view is
//! recomputed from the collection and the current [`MemoQuery`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Category, CategoryFilter, Memo};

/// Inputs to the query view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoQuery {
    /// Free-text search. Blank disables the search filter.
    #[serde(alias = "q")]
    pub search: String,
    pub category: CategoryFilter,
}

impl MemoQuery {
    pub fn new(search: impl Into<String>, category: CategoryFilter) -> Self {
        Self {
            search: search.into(),
            category,
        }
    }

    /// Lowercased, trimmed search needle, or `None` when search is disabled.
    fn needle(&self) -> Option<String> {
        let trimmed = self.search.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }

    pub fn matches(&self, memo: &Memo) -> bool {
        self.category.matches(memo.category)
            && self.needle().map_or(true, |needle| memo.contains_text(&needle))
    }
}

/// Aggregate counts for the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    /// Size of the unfiltered collection.
    pub total: usize,
    /// Per-category counts over the unfiltered collection.
    pub by_category: BTreeMap<Category, usize>,
    /// Size of the filtered sequence.
    pub filtered: usize,
}

/// Filtered memos plus stats, borrowing from the collection.
#[derive(Debug, Clone)]
pub struct QueryView<'a> {
    pub memos: Vec<&'a Memo>,
    pub stats: QueryStats,
}

impl QueryView<'_> {
    /// Owned copy of the filtered memos.
    pub fn to_memos(&self) -> Vec<Memo> {
        self.memos.iter().map(|m| (*m).clone()).collect()
    }
}

/// Apply the category filter, then the search filter. Order is preserved.
pub fn filter_memos<'a>(memos: &'a [Memo], query: &MemoQuery) -> Vec<&'a Memo> {
    let needle = query.needle();
    memos
        .iter()
        .filter(|m| query.category.matches(m.category))
        .filter(|m| needle.as_deref().map_or(true, |n| m.contains_text(n)))
        .collect()
}

/// Count memos per category. Every category is present, zero when unused.
pub fn count_by_category(memos: &[Memo]) -> BTreeMap<Category, usize> {
    let mut counts: BTreeMap<Category, usize> =
        Category::ALL.iter().map(|c| (*c, 0)).collect();
    for memo in memos {
        *counts.entry(memo.category).or_insert(0) += 1;
    }
    counts
}

/// Derive the full view for `query` over `memos`.
pub fn derive<'a>(memos: &'a [Memo], query: &MemoQuery) -> QueryView<'a> {
    let filtered = filter_memos(memos, query);
    let stats = QueryStats {
        total: memos.len(),
        by_category: count_by_category(memos),
        filtered: filtered.len(),
    };
    QueryView {
        memos: filtered,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoForm;
    use chrono::{Duration, Utc};

    fn collection() -> Vec<Memo> {
        let now = Utc::now();
        let rows = [
            ("Sprint retro", "went well", Category::Work, vec!["agile"]),
            ("Rust notes", "borrow checker", Category::Study, vec!["rust", "lang"]),
            ("Startup idea", "memo app with AI", Category::Idea, vec![]),
            ("Team lunch", "Friday", Category::Work, vec!["food"]),
            ("Diary", "quiet day", Category::Personal, vec!["Rust"]),
        ];
        rows
            .into_iter()
            .enumerate()
            .map(|(i, (title, content, category, tags))| {
                Memo::from_form(
                    MemoForm::new(title, content)
                        .with_category(category)
                        .with_tags(tags),
                    now - Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    fn titles(view: &[&Memo]) -> Vec<String> {
        view.iter().map(|m| m.title.clone()).collect()
    }

    #[test]
    fn test_no_filter_keeps_everything_in_order() {
        let memos = collection();
        let view = derive(&memos, &MemoQuery::default());
        assert_eq!(view.memos.len(), 5);
        assert_eq!(view.memos[0].title, "Sprint retro");
        assert_eq!(view.memos[4].title, "Diary");
        assert_eq!(view.stats.filtered, 5);
    }

    #[test]
    fn test_category_filter() {
        let memos = collection();
        let view = derive(&memos, &MemoQuery::new("", CategoryFilter::Only(Category::Work)));
        assert_eq!(titles(&view.memos), vec!["Sprint retro", "Team lunch"]);
    }

    #[test]
    fn test_search_matches_title_content_and_tags_case_insensitive() {
        let memos = collection();
        let by_tag = derive(&memos, &MemoQuery::new("RUST", CategoryFilter::All));
        assert_eq!(titles(&by_tag.memos), vec!["Rust notes", "Diary"]);

        let by_content = derive(&memos, &MemoQuery::new("friday", CategoryFilter::All));
        assert_eq!(titles(&by_content.memos), vec!["Team lunch"]);
    }

    #[test]
    fn test_blank_search_disables_filter() {
        let memos = collection();
        let view = derive(&memos, &MemoQuery::new("   \t", CategoryFilter::All));
        assert_eq!(view.memos.len(), memos.len());
    }

    #[test]
    fn test_search_is_trimmed() {
        let memos = collection();
        let view = derive(&memos, &MemoQuery::new("  lunch ", CategoryFilter::All));
        assert_eq!(titles(&view.memos), vec!["Team lunch"]);
    }

    #[test]
    fn test_filters_commute() {
        let memos = collection();
        let queries = [
            ("rust", Category::Study),
            ("rust", Category::Personal),
            ("e", Category::Work),
            ("zzz", Category::Idea),
        ];
        for (search, category) in queries {
            let combined = filter_memos(&memos, &MemoQuery::new(search, CategoryFilter::Only(category)));

            let searched = filter_memos(&memos, &MemoQuery::new(search, CategoryFilter::All));
            let search_then_category: Vec<&Memo> = searched
                .into_iter()
                .filter(|m| m.category == category)
                .collect();

            assert_eq!(combined, search_then_category, "query {search:?}/{category}");
        }
    }

    #[test]
    fn test_stats() {
        let memos = collection();
        let view = derive(&memos, &MemoQuery::new("", CategoryFilter::Only(Category::Work)));
        assert_eq!(view.stats.total, 5);
        assert_eq!(view.stats.filtered, 2);
        assert_eq!(view.stats.by_category[&Category::Work], 2);
        assert_eq!(view.stats.by_category[&Category::Other], 0);
        assert_eq!(view.stats.by_category.values().sum::<usize>(), view.stats.total);
    }

    #[test]
    fn test_stats_serialize_camelcase() {
        let memos = collection();
        let json = serde_json::to_value(derive(&memos, &MemoQuery::default()).stats).unwrap();
        assert_eq!(json["total"], 5);
        assert_eq!(json["byCategory"]["work"], 2);
        assert_eq!(json["byCategory"]["idea"], 1);
    }

    #[test]
    fn test_query_matches() {
        let memos = collection();
        let query = MemoQuery::new("lang", CategoryFilter::Only(Category::Study));
        assert!(query.matches(&memos[1]));
        assert!(!query.matches(&memos[0]));
    }

    #[test]
    fn test_query_deserialize() {
        let q: MemoQuery = serde_json::from_str(r#"{"q":"rust","category":"all"}"#).unwrap();
        assert_eq!(q.search, "rust");
        assert_eq!(q.category, CategoryFilter::All);
    }
}
