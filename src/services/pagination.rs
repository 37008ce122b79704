use serde::Deserialize;

use crate::services::db_utils::{Window, WriteMode};
use crate::types::{DEFAULT_PAGE, DEFAULT_RECORDS_PER_PAGE};

/// Raw listing parameters. Kept as strings so that garbage falls back to the
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub record_per_page: Option<String>,
    pub page: Option<String>,
    pub start_index: Option<String>,
}

fn parse_at_least(raw: Option<&str>, min: i64) -> Option<u64> {
    raw?.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| *value >= min)
        .and_then(|value| u64::try_from(value).ok())
}

impl PageQuery {
    pub fn window(&self) -> Window {
        let limit = parse_at_least(self.record_per_page.as_deref(), 1)
            .unwrap_or(DEFAULT_RECORDS_PER_PAGE);
        let page = parse_at_least(self.page.as_deref(), 1).unwrap_or(DEFAULT_PAGE);

        let skip = parse_at_least(self.start_index.as_deref(), 0)
            .unwrap_or_else(|| (page - 1).saturating_mul(limit));

        Window { skip, limit }
    }
}

/// `?upsert=false` turns a PATCH on a missing id into a not-found error.
#[derive(Debug, Default, Deserialize)]
pub struct WriteQuery {
    pub upsert: Option<bool>,
}

impl WriteQuery {
    pub fn mode(&self) -> WriteMode {
        match self.upsert {
            Some(false) => WriteMode::UpdateOnly,
            _ => WriteMode::Upsert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(record_per_page: Option<&str>, page: Option<&str>, start: Option<&str>) -> PageQuery {
        PageQuery {
            record_per_page: record_per_page.map(str::to_owned),
            page: page.map(str::to_owned),
            start_index: start.map(str::to_owned),
        }
    }

    #[test]
    fn absent_values_use_defaults() {
        assert_eq!(PageQuery::default().window(), Window { skip: 0, limit: 10 });
    }

    #[test]
    fn values_below_one_use_defaults() {
        assert_eq!(
            query(Some("0"), Some("-3"), None).window(),
            Window { skip: 0, limit: 10 }
        );
    }

    #[test]
    fn unparseable_values_use_defaults() {
        assert_eq!(
            query(Some("ten"), Some("2.5"), None).window(),
            Window { skip: 0, limit: 10 }
        );
    }

    #[test]
    fn page_derives_offset() {
        assert_eq!(
            query(Some("5"), Some("3"), None).window(),
            Window { skip: 10, limit: 5 }
        );
    }

    #[test]
    fn start_index_overrides_page() {
        assert_eq!(
            query(Some("5"), Some("3"), Some("7")).window(),
            Window { skip: 7, limit: 5 }
        );
        assert_eq!(
            query(None, Some("4"), Some("0")).window(),
            Window { skip: 0, limit: 10 }
        );
    }

    #[test]
    fn negative_start_index_is_ignored() {
        assert_eq!(
            query(Some("5"), Some("2"), Some("-1")).window(),
            Window { skip: 5, limit: 5 }
        );
    }

    #[test]
    fn huge_pages_saturate() {
        let window = query(Some("1000000"), Some(&i64::MAX.to_string()), None).window();

        assert_eq!(window.skip, u64::MAX);
    }

    #[test]
    fn upsert_is_the_default_write_mode() {
        assert_eq!(WriteQuery::default().mode(), WriteMode::Upsert);
        assert_eq!(WriteQuery { upsert: Some(true) }.mode(), WriteMode::Upsert);
        assert_eq!(WriteQuery { upsert: Some(false) }.mode(), WriteMode::UpdateOnly);
    }
}
