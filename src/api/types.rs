use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Filter Criteria
// ============================================================================

/// Filter parameters for the bookmark list query.
///
/// A `None` field places no constraint on that dimension, so the default
/// value (all fields absent) fetches every bookmark. Equality is by value
/// across all three fields, which makes the struct usable as a cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub favourited: Option<bool>,
    pub archived: Option<bool>,
    pub ids: Option<Vec<String>>,
}

impl FilterCriteria {
    /// Criteria for a fixed id set.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// True for an explicitly empty id set, which no bookmark can match.
    pub fn matches_nothing(&self) -> bool {
        self.ids.as_ref().is_some_and(Vec::is_empty)
    }

    /// Query-string pairs for the list endpoint.
    ///
    /// Absent fields produce no pair; each id produces its own `ids` pair so
    /// the server sees them in order. An empty id set has no query form, so
    /// callers check [`matches_nothing`](Self::matches_nothing) first.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(favourited) = self.favourited {
            pairs.push(("favourited", favourited.to_string()));
        }
        if let Some(archived) = self.archived {
            pairs.push(("archived", archived.to_string()));
        }
        if let Some(ids) = &self.ids {
            pairs.extend(ids.iter().map(|id| ("ids", id.clone())));
        }
        pairs
    }

    /// Short human-readable description, used in the list title.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        match self.favourited {
            Some(true) => parts.push("favourited".to_string()),
            Some(false) => parts.push("not favourited".to_string()),
            None => {}
        }
        match self.archived {
            Some(true) => parts.push("archived".to_string()),
            Some(false) => parts.push("not archived".to_string()),
            None => {}
        }
        if let Some(ids) = &self.ids {
            parts.push(format!("{} ids", ids.len()));
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(", ")
        }
    }
}

// ============================================================================
// Bookmark Records
// ============================================================================

/// A bookmark as returned by the server.
///
/// Only `id` is required. The remaining fields are read by the card renderer
/// and the detail screen; anything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favourited: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl BookmarkSummary {
    /// A record carrying nothing but its id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            url: None,
            note: None,
            tags: Vec::new(),
            favourited: false,
            archived: false,
            created_at: None,
        }
    }

    /// Best available label: title, then url, then id.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.url.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

/// Response of the list query. `bookmarks` is in server order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub bookmarks: Vec<BookmarkSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_criteria_has_no_pairs() {
        assert!(FilterCriteria::default().query_pairs().is_empty());
        assert_eq!(FilterCriteria::default().describe(), "all");
    }

    #[test]
    fn test_query_pairs_in_field_order() {
        let criteria = FilterCriteria {
            favourited: Some(true),
            archived: Some(false),
            ids: Some(vec!["a".into(), "b".into()]),
        };
        assert_eq!(
            criteria.query_pairs(),
            vec![
                ("favourited", "true".to_string()),
                ("archived", "false".to_string()),
                ("ids", "a".to_string()),
                ("ids", "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_criteria_equality_is_by_value() {
        let a = FilterCriteria::with_ids(["x", "y"]);
        let b = FilterCriteria::with_ids(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, FilterCriteria::with_ids(["y", "x"]));
    }

    #[test]
    fn test_describe_combines_fields() {
        let criteria = FilterCriteria {
            favourited: Some(true),
            archived: None,
            ids: Some(vec!["a".into()]),
        };
        assert_eq!(criteria.describe(), "favourited, 1 ids");
    }

    #[test]
    fn test_bookmark_deserializes_with_only_id() {
        let bookmark: BookmarkSummary = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(bookmark, BookmarkSummary::new("abc"));
    }

    #[test]
    fn test_bookmark_ignores_unknown_fields() {
        let json = r#"{
            "id": "abc",
            "title": "Rust",
            "url": "https://rust-lang.org",
            "favourited": true,
            "createdAt": "2024-01-01T00:00:00Z",
            "content": {"type": "link"}
        }"#;
        let bookmark: BookmarkSummary = serde_json::from_str(json).unwrap();
        assert_eq!(bookmark.title.as_deref(), Some("Rust"));
        assert!(bookmark.favourited);
        assert!(bookmark.created_at.is_some());
    }

    #[test]
    fn test_display_title_fallbacks() {
        let mut bookmark = BookmarkSummary::new("id-1");
        assert_eq!(bookmark.display_title(), "id-1");
        bookmark.url = Some("https://example.com".into());
        assert_eq!(bookmark.display_title(), "https://example.com");
        bookmark.title = Some("   ".into());
        assert_eq!(bookmark.display_title(), "https://example.com");
        bookmark.title = Some("Example".into());
        assert_eq!(bookmark.display_title(), "Example");
    }

    #[test]
    fn test_query_result_deserializes() {
        let result: QueryResult =
            serde_json::from_str(r#"{"bookmarks":[{"id":"a"},{"id":"b"}],"nextCursor":null}"#)
                .unwrap();
        let ids: Vec<&str> = result.bookmarks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn criteria() -> impl Strategy<Value = FilterCriteria> {
            (
                proptest::option::of(any::<bool>()),
                proptest::option::of(any::<bool>()),
                proptest::option::of(proptest::collection::vec("[a-z0-9]{1,8}", 0..5)),
            )
                .prop_map(|(favourited, archived, ids)| FilterCriteria {
                    favourited,
                    archived,
                    ids,
                })
        }

        proptest! {
            #[test]
            fn one_pair_per_present_value(criteria in criteria()) {
                let pairs = criteria.query_pairs();
                let expected = usize::from(criteria.favourited.is_some())
                    + usize::from(criteria.archived.is_some())
                    + criteria.ids.as_ref().map_or(0, Vec::len);
                prop_assert_eq!(pairs.len(), expected);

                let ids: Vec<&str> = pairs
                    .iter()
                    .filter(|(k, _)| *k == "ids")
                    .map(|(_, v)| v.as_str())
                    .collect();
                let want: Vec<&str> = criteria
                    .ids
                    .iter()
                    .flatten()
                    .map(String::as_str)
                    .collect();
                prop_assert_eq!(ids, want);
            }

            #[test]
            fn only_unconstrained_criteria_send_no_pairs(criteria in criteria()) {
                if criteria.query_pairs().is_empty() {
                    prop_assert!(criteria == FilterCriteria::default() || criteria.matches_nothing());
                }
                prop_assert_eq!(
                    criteria.matches_nothing(),
                    criteria.ids.as_ref().is_some_and(|ids| ids.is_empty())
                );
            }
        }
    }
}
