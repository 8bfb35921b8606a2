//! Paging state
//!
//! Druid select queries return at most `threshold` rows per request along
//! with `pagingIdentifiers`, a per-segment offset map. The next page is
//! requested by sending those offsets back, each advanced by one.
//!
//! The [`PagingCache`] remembers, per query [`Fingerprint`], the advanced
//! identifiers obtained after each page so later pages can be requested
//! without re-walking the ones before them.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::query::ast::Query;
use crate::query::error::QueryResult;

/// Continuation token: segment identifier → row offset
pub type PagingIdentifiers = BTreeMap<String, i64>;

/// Paging directive attached to a single outgoing select request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingSpec {
    pub paging_identifiers: PagingIdentifiers,
    pub threshold: usize,
}

impl PagingSpec {
    /// Directive for the first page
    pub fn first(threshold: usize) -> Self {
        Self {
            paging_identifiers: PagingIdentifiers::new(),
            threshold,
        }
    }

    /// Directive resuming after the given token
    pub fn resume(token: PagingIdentifiers, threshold: usize) -> Self {
        Self {
            paging_identifiers: token,
            threshold,
        }
    }
}

/// Advance every offset by one so the next request starts past the last row
pub fn advance(identifiers: &PagingIdentifiers) -> PagingIdentifiers {
    identifiers
        .iter()
        .map(|(segment, offset)| (segment.clone(), offset + 1))
        .collect()
}

/// Content fingerprint of a query with paging excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u32);

impl Fingerprint {
    pub fn of(query: &Query) -> QueryResult<Self> {
        let bytes = serde_json::to_vec(&query.without_paging())?;
        Ok(Self(crc32fast::hash(&bytes)))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Continuation tokens per query shape, keyed by page number
///
/// Entries are created lazily and only ever grow.
#[derive(Debug, Default)]
pub struct PagingCache {
    entries: HashMap<Fingerprint, BTreeMap<u32, PagingIdentifiers>>,
}

impl PagingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to send when requesting `page`; empty for the first page
    pub fn token_for(&self, fingerprint: Fingerprint, page: u32) -> Option<PagingIdentifiers> {
        if page <= 1 {
            return Some(PagingIdentifiers::new());
        }
        self.entries
            .get(&fingerprint)
            .and_then(|pages| pages.get(&(page - 1)))
            .cloned()
    }

    pub fn contains(&self, fingerprint: Fingerprint, page: u32) -> bool {
        self.entries
            .get(&fingerprint)
            .is_some_and(|pages| pages.contains_key(&page))
    }

    /// Pages before `page` whose tokens are not cached yet, in increasing order
    pub fn missing_before(&self, fingerprint: Fingerprint, page: u32) -> Vec<u32> {
        (1..page)
            .filter(|p| !self.contains(fingerprint, *p))
            .collect()
    }

    /// Store the (already advanced) token obtained after fetching `page`
    pub fn record(&mut self, fingerprint: Fingerprint, page: u32, token: PagingIdentifiers) {
        self.entries
            .entry(fingerprint)
            .or_default()
            .insert(page, token);
    }

    /// Number of pages cached for a fingerprint
    pub fn pages_cached(&self, fingerprint: Fingerprint) -> usize {
        self.entries.get(&fingerprint).map_or(0, BTreeMap::len)
    }

    /// Number of distinct query shapes tracked
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{DataSourceMetadataQuery, SelectQuery};
    use serde_json::json;

    fn select(source: &str) -> Query {
        Query::Select(SelectQuery {
            data_source: source.into(),
            intervals: vec!["2020-01-01/2020-01-02".into()],
            granularity: "all".into(),
            filter: None,
            dimensions: vec![],
            metrics: vec![],
            descending: false,
            paging_spec: None,
        })
    }

    #[test]
    fn test_paging_spec_serialization() {
        let mut token = PagingIdentifiers::new();
        token.insert("seg_1".into(), 5);
        let spec = PagingSpec::resume(token, 100);
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"pagingIdentifiers": {"seg_1": 5}, "threshold": 100})
        );
        assert_eq!(
            serde_json::to_value(PagingSpec::first(10)).unwrap(),
            json!({"pagingIdentifiers": {}, "threshold": 10})
        );
    }

    #[test]
    fn test_advance_increments_every_offset() {
        let mut token = PagingIdentifiers::new();
        token.insert("a".into(), 4);
        token.insert("b".into(), 9);
        let next = advance(&token);
        assert_eq!(next["a"], 5);
        assert_eq!(next["b"], 10);
    }

    #[test]
    fn test_fingerprint_ignores_paging() {
        let plain = select("ads");
        let paged = plain.clone().with_paging(PagingSpec::first(10)).unwrap();
        assert_eq!(
            Fingerprint::of(&plain).unwrap(),
            Fingerprint::of(&paged).unwrap()
        );

        let other = Query::DataSourceMetadata(DataSourceMetadataQuery {
            data_source: "ads".into(),
        });
        assert_ne!(
            Fingerprint::of(&plain).unwrap(),
            Fingerprint::of(&other).unwrap()
        );
    }

    #[test]
    fn test_cache_tracks_pages() {
        let fp = Fingerprint::of(&select("ads")).unwrap();
        let mut cache = PagingCache::new();

        assert_eq!(cache.token_for(fp, 1), Some(PagingIdentifiers::new()));
        assert_eq!(cache.token_for(fp, 2), None);
        assert_eq!(cache.missing_before(fp, 3), vec![1, 2]);

        let mut token = PagingIdentifiers::new();
        token.insert("seg".into(), 3);
        cache.record(fp, 1, token.clone());

        assert_eq!(cache.token_for(fp, 2), Some(token));
        assert_eq!(cache.missing_before(fp, 3), vec![2]);
        assert_eq!(cache.pages_cached(fp), 1);
        assert_eq!(cache.len(), 1);
    }
}
