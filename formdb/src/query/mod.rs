// Query engine - search, stable sort and pagination over a snapshot of the collection

use crate::record::Record;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_SORT_BY: &str = Record::CREATED_AT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` (any case) is ascending; every other value is descending
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }
}

/// Validated query parameters. `page` and `limit` are at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub page: usize,
    pub limit: usize,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub search: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        QueryParams {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort_by: DEFAULT_SORT_BY.to_string(),
            sort_order: SortOrder::default(),
            search: String::new(),
        }
    }
}

impl QueryParams {
    /// Parameters for one page; zero page or limit is raised to 1
    pub fn new(page: usize, limit: usize) -> Self {
        QueryParams {
            page: page.max(1),
            limit: limit.max(1),
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = sort_by.into();
        self.sort_order = order;
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }
}

/// Query parameters as they arrive from a transport layer, before
/// normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueryParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

impl RawQueryParams {
    /// Collect parameters from decoded key/value pairs. A repeated key keeps
    /// its first value; unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut raw = RawQueryParams::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "page" => &mut raw.page,
                "limit" => &mut raw.limit,
                "sortBy" => &mut raw.sort_by,
                "sortOrder" => &mut raw.sort_order,
                "search" => &mut raw.search,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        raw
    }

    /// Replace anything outside the expected domain with its default.
    /// Non-numeric, zero or negative page/limit become 1/10, an empty sort
    /// key becomes `createdAt`.
    pub fn normalize(&self) -> QueryParams {
        QueryParams {
            page: parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE),
            limit: parse_positive(self.limit.as_deref()).unwrap_or(DEFAULT_LIMIT),
            sort_by: self
                .sort_by
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SORT_BY)
                .to_string(),
            sort_order: self
                .sort_order
                .as_deref()
                .map(SortOrder::parse_lenient)
                .unwrap_or_default(),
            search: self.search.clone().unwrap_or_default(),
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// Pagination metadata. `total` counts records after search filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// One page of records plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Record>,
    pub meta: PageMeta,
}

/// Filter, sort and paginate `records`.
///
/// Records are a snapshot in insertion order; equal sort keys keep that
/// order in both directions.
pub fn query(records: &[Record], params: &QueryParams) -> QueryResult {
    let page = params.page.max(1);
    let limit = params.limit.max(1);

    let mut matched = filter(records, &params.search);
    sort(&mut matched, &params.sort_by, params.sort_order);

    let total = matched.len();
    let start = (page - 1).saturating_mul(limit);
    let data = matched
        .into_iter()
        .skip(start)
        .take(limit)
        .cloned()
        .collect();

    QueryResult {
        data,
        meta: PageMeta {
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        },
    }
}

/// Case-insensitive substring match against any payload value. `id` and
/// `createdAt` are not searched.
fn filter<'a>(records: &'a [Record], search: &str) -> Vec<&'a Record> {
    if search.is_empty() {
        return records.iter().collect();
    }

    let needle = search.to_lowercase();
    records
        .iter()
        .filter(|record| {
            record
                .data
                .values()
                .any(|value| value.to_string().to_lowercase().contains(&needle))
        })
        .collect()
}

/// Where a sort key's value comes from. Top-level record fields take
/// precedence over payload keys of the same name.
enum KeySource<'k> {
    Id,
    CreatedAt,
    Data(&'k str),
}

impl<'k> KeySource<'k> {
    fn resolve(sort_by: &'k str) -> Self {
        match sort_by {
            Record::ID => KeySource::Id,
            Record::CREATED_AT => KeySource::CreatedAt,
            other => KeySource::Data(other),
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            KeySource::Id => a.id.cmp(&b.id),
            KeySource::CreatedAt => a.created_at.cmp(&b.created_at),
            KeySource::Data(key) => compare_values(a.data.get(*key), b.data.get(*key)),
        }
    }
}

/// Missing values sort with null, before every other value
fn compare_values(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (None, None) => Ordering::Equal,
        (None, Some(b)) => missing_vs(b),
        (Some(a), None) => missing_vs(a).reverse(),
    }
}

fn missing_vs(value: &FieldValue) -> Ordering {
    if matches!(value, FieldValue::Null) {
        Ordering::Equal
    } else {
        Ordering::Less
    }
}

fn sort(records: &mut [&Record], sort_by: &str, order: SortOrder) {
    let source = KeySource::resolve(sort_by);
    // sort_by is stable; reversing the comparator (not the output) keeps
    // ties in insertion order for descending sorts too.
    records.sort_by(|a, b| {
        let ordering = source.compare(a, b);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::payload_from_json;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;

    fn record(id: &str, created_at: &str, data: serde_json::Value) -> Record {
        Record {
            id: id.to_string(),
            created_at: format!("{created_at}T00:00:00Z").parse().unwrap(),
            data: payload_from_json(data).unwrap(),
        }
    }

    fn ids(result: &QueryResult) -> Vec<&str> {
        result.data.iter().map(|r| r.id.as_str()).collect()
    }

    fn staff() -> Vec<Record> {
        vec![
            record("r1", "2024-01-05", json!({ "fullName": "Alice Chen", "age": 30, "department": "engineering", "skills": ["react", "go"] })),
            record("r2", "2024-01-01", json!({ "fullName": "Bob Stone", "age": 9, "department": "design", "skills": ["python"] })),
            record("r3", "2024-01-03", json!({ "fullName": "carol king", "age": 41, "department": "engineering", "remoteWork": true })),
            record("r4", "2024-01-04", json!({ "fullName": "Dan Fox", "department": "product" })),
            record("r5", "2024-01-02", json!({ "fullName": "Eve Adams", "age": 30, "department": "marketing" })),
        ]
    }

    #[test]
    fn test_defaults() {
        let params = QueryParams::default();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 10);
        assert_eq!(params.sort_by, "createdAt");
        assert_eq!(params.sort_order, SortOrder::Desc);
        assert_eq!(params.search, "");

        let result = query(&staff(), &params);
        assert_eq!(ids(&result), vec!["r1", "r4", "r3", "r5", "r2"]);
        assert_eq!(
            result.meta,
            PageMeta { total: 5, page: 1, limit: 10, total_pages: 1 }
        );
    }

    #[test]
    fn test_created_at_ascending_first_page() {
        let records = vec![
            record("jan", "2024-01-01", json!({})),
            record("mar", "2024-03-01", json!({})),
            record("feb", "2024-02-01", json!({})),
        ];
        let params = QueryParams::new(1, 2).sorted("createdAt", SortOrder::Asc);
        let result = query(&records, &params);

        assert_eq!(ids(&result), vec!["jan", "feb"]);
        assert_eq!(
            result.meta,
            PageMeta { total: 3, page: 1, limit: 2, total_pages: 2 }
        );
    }

    #[test]
    fn test_search_is_case_insensitive_over_payload_values() {
        let records = staff();

        let result = query(&records, &QueryParams::default().search("ENGINEER"));
        assert_eq!(ids(&result), vec!["r1", "r3"]);
        assert_eq!(result.meta.total, 2);

        let result = query(&records, &QueryParams::default().search("King"));
        assert_eq!(ids(&result), vec!["r3"]);

        // Lists and numbers are searched through their string form
        let result = query(&records, &QueryParams::default().search("react,go"));
        assert_eq!(ids(&result), vec!["r1"]);
        let result = query(&records, &QueryParams::default().search("41"));
        assert_eq!(ids(&result), vec!["r3"]);
        let result = query(&records, &QueryParams::default().search("true"));
        assert_eq!(ids(&result), vec!["r3"]);
    }

    #[test]
    fn test_search_ignores_top_level_fields() {
        let records = staff();
        assert_eq!(query(&records, &QueryParams::default().search("r2")).meta.total, 0);
        assert_eq!(query(&records, &QueryParams::default().search("2024")).meta.total, 0);
    }

    #[test]
    fn test_search_treats_null_as_empty_text() {
        let records = vec![
            record("cleared", "2024-01-01", json!({ "bio": null })),
            record("written", "2024-01-02", json!({ "bio": "null pointer fan" })),
        ];
        let result = query(&records, &QueryParams::default().search("null"));
        assert_eq!(ids(&result), vec!["written"]);
    }

    #[test]
    fn test_search_narrows_or_preserves() {
        let records = staff();
        let all = query(&records, &QueryParams::default()).meta.total;
        for term in ["", "a", "e", "zzz", "30", "ENG", " "] {
            let total = query(&records, &QueryParams::default().search(term)).meta.total;
            assert!(total <= all, "search {term:?} grew the result");
        }
        assert_eq!(query(&records, &QueryParams::default().search("")).meta.total, all);
    }

    #[test]
    fn test_sort_by_payload_field_numeric() {
        let params = QueryParams::default().sorted("age", SortOrder::Asc);
        let result = query(&staff(), &params);
        // r4 has no age and sorts first; r1 and r5 tie at 30 and keep
        // insertion order
        assert_eq!(ids(&result), vec!["r4", "r2", "r1", "r5", "r3"]);
    }

    #[test]
    fn test_descending_sort_is_stable() {
        let params = QueryParams::default().sorted("age", SortOrder::Desc);
        let result = query(&staff(), &params);
        assert_eq!(ids(&result), vec!["r3", "r1", "r5", "r2", "r4"]);
    }

    #[test]
    fn test_sort_by_text_is_lexicographic() {
        let params = QueryParams::default().sorted("fullName", SortOrder::Asc);
        let result = query(&staff(), &params);
        // Uppercase sorts before lowercase
        assert_eq!(ids(&result), vec!["r1", "r2", "r4", "r5", "r3"]);
    }

    #[test]
    fn test_sort_by_id() {
        let params = QueryParams::default().sorted("id", SortOrder::Asc);
        let result = query(&staff(), &params);
        assert_eq!(ids(&result), vec!["r1", "r2", "r3", "r4", "r5"]);
    }

    #[test]
    fn test_sort_by_unknown_key_keeps_insertion_order() {
        for order in [SortOrder::Asc, SortOrder::Desc] {
            let params = QueryParams::default().sorted("nonexistent", order);
            let result = query(&staff(), &params);
            assert_eq!(ids(&result), vec!["r1", "r2", "r3", "r4", "r5"]);
        }
    }

    #[test]
    fn test_sort_mixed_types_is_deterministic() {
        let records = vec![
            record("text", "2024-01-01", json!({ "v": "10" })),
            record("num", "2024-01-01", json!({ "v": 2 })),
            record("null", "2024-01-01", json!({ "v": null })),
            record("none", "2024-01-01", json!({})),
            record("bool", "2024-01-01", json!({ "v": false })),
            record("list", "2024-01-01", json!({ "v": ["a"] })),
        ];
        let params = QueryParams::default().sorted("v", SortOrder::Asc);
        let result = query(&records, &params);
        assert_eq!(ids(&result), vec!["null", "none", "bool", "num", "text", "list"]);
    }

    #[test]
    fn test_pages_reconstruct_collection() {
        let records: Vec<Record> = (0..23)
            .map(|i| record(&format!("r{i:02}"), &format!("2024-01-{:02}", i % 28 + 1), json!({ "n": i })))
            .collect();
        let full = query(&records, &QueryParams::new(1, 100));

        for limit in [1, 4, 5, 10, 23, 50] {
            let first = query(&records, &QueryParams::new(1, limit));
            let mut seen = Vec::new();
            for page in 1..=first.meta.total_pages {
                let result = query(&records, &QueryParams::new(page, limit));
                assert!(result.data.len() <= limit);
                seen.extend(result.data);
            }
            assert_eq!(seen, full.data, "limit {limit}");
            let unique: HashSet<&str> = seen.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(unique.len(), 23);
        }
    }

    #[test]
    fn test_meta_consistency_and_page_past_end() {
        let records = staff();
        for limit in 1..=6 {
            let meta = query(&records, &QueryParams::new(1, limit)).meta;
            assert_eq!(meta.total_pages, meta.total.div_ceil(limit));

            let past = query(&records, &QueryParams::new(meta.total_pages + 1, limit));
            assert!(past.data.is_empty());
            assert_eq!(past.meta.total, 5);
        }

        let last = query(&records, &QueryParams::new(3, 2));
        assert_eq!(last.data.len(), 1);
    }

    #[test]
    fn test_empty_collection() {
        let result = query(&[], &QueryParams::default());
        assert!(result.data.is_empty());
        assert_eq!(
            result.meta,
            PageMeta { total: 0, page: 1, limit: 10, total_pages: 0 }
        );
    }

    #[test]
    fn test_engine_clamps_zero_page_and_limit() {
        let params = QueryParams { page: 0, limit: 0, ..QueryParams::default() };
        let result = query(&staff(), &params);
        assert_eq!(result.meta.page, 1);
        assert_eq!(result.meta.limit, 1);
        assert_eq!(result.data.len(), 1);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let result = query(&staff(), &QueryParams::new(usize::MAX, 10));
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_normalize_raw_params() {
        let raw = RawQueryParams {
            page: Some("2".into()),
            limit: Some("5".into()),
            sort_by: Some("age".into()),
            sort_order: Some("ASC".into()),
            search: Some("eng".into()),
        };
        assert_eq!(
            raw.normalize(),
            QueryParams {
                page: 2,
                limit: 5,
                sort_by: "age".into(),
                sort_order: SortOrder::Asc,
                search: "eng".into(),
            }
        );

        let bad = RawQueryParams {
            page: Some("-3".into()),
            limit: Some("0".into()),
            sort_by: Some("  ".into()),
            sort_order: Some("sideways".into()),
            search: None,
        };
        assert_eq!(bad.normalize(), QueryParams::default());

        let junk = RawQueryParams {
            page: Some("two".into()),
            limit: Some("".into()),
            ..RawQueryParams::default()
        };
        assert_eq!(junk.normalize(), QueryParams::default());
        assert_eq!(RawQueryParams::default().normalize(), QueryParams::default());
    }

    #[test]
    fn test_raw_params_from_repeated_pairs() {
        let raw = RawQueryParams::from_pairs([
            ("page", "2"),
            ("page", "3"),
            ("limit", "5"),
            ("limit", "x"),
            ("sortOrder", "asc"),
            ("color", "blue"),
        ]);
        assert_eq!(
            raw,
            RawQueryParams {
                page: Some("2".into()),
                limit: Some("5".into()),
                sort_order: Some("asc".into()),
                ..RawQueryParams::default()
            }
        );
        assert_eq!(raw.normalize(), QueryParams::new(2, 5).sorted(DEFAULT_SORT_BY, SortOrder::Asc));

        let junk_first = RawQueryParams::from_pairs(vec![
            ("limit".to_string(), "x".to_string()),
            ("limit".to_string(), "5".to_string()),
        ]);
        assert_eq!(junk_first.normalize().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_result_wire_shape() {
        let records = vec![record("a", "2024-01-01", json!({ "x": 1 }))];
        let json = serde_json::to_value(query(&records, &QueryParams::default())).unwrap();
        assert_eq!(
            json,
            json!({
                "data": [{ "id": "a", "createdAt": "2024-01-01T00:00:00.000Z", "data": { "x": 1 } }],
                "meta": { "total": 1, "page": 1, "limit": 10, "totalPages": 1 }
            })
        );
    }
}
