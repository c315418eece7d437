//! Builds the smallest set of currency pairs worth requesting.
//!
//! The quote service answers `A->B` and the reverse direction is derived
//! locally, so asking for both `A->B` and `B->A` would only double the
//! response. For `n` distinct currencies exactly `n*(n-1)/2` pairs are
//! requested.

use reqwest::Url;

use crate::core::config::WireFormat;
use crate::core::currency::CurrencyCode;
use crate::error::FetchError;

const QUOTE_TABLE: &str = "yahoo.finance.xchange";
const TABLE_ENV: &str = "store://datatables.org/alltableswithkeys";

/// An unordered set of pairs, each kept in the direction it will be asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuery {
    pairs: Vec<(CurrencyCode, CurrencyCode)>,
}

impl RateQuery {
    /// Pairs every source code with every destination code still in the
    /// pool, removing each source from the pool once it has been paired.
    ///
    /// The destination pool is an owned copy, so passing the same list twice
    /// is fine. Duplicates and self pairs are dropped.
    pub fn build(sources: &[CurrencyCode], dests: &[CurrencyCode]) -> Self {
        let mut pool: Vec<CurrencyCode> = Vec::with_capacity(dests.len());
        for code in dests {
            if !pool.contains(code) {
                pool.push(*code);
            }
        }

        let mut pairs = Vec::new();
        let mut seen: Vec<CurrencyCode> = Vec::with_capacity(sources.len());
        for source in sources {
            if seen.contains(source) {
                continue;
            }
            seen.push(*source);

            for dest in pool.iter().filter(|d| *d != source) {
                pairs.push((*source, *dest));
            }
            pool.retain(|d| d != source);
        }
        Self { pairs }
    }

    /// Convenience for the common case of one currency universe.
    pub fn for_currencies(codes: &[CurrencyCode]) -> Self {
        Self::build(codes, codes)
    }

    pub fn pairs(&self) -> &[(CurrencyCode, CurrencyCode)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The pair list as the quote service expects it: `"USDEUR","USDJPY"`.
    pub fn pair_list(&self) -> String {
        self.pairs
            .iter()
            .map(|(s, d)| format!("\"{s}{d}\""))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The full query statement, before URL encoding.
    pub fn statement(&self) -> String {
        format!(
            "select * from {QUOTE_TABLE} where pair in ({})",
            self.pair_list()
        )
    }

    /// GET URL for this query. Spaces, quotes and commas in the statement
    /// are percent-encoded.
    pub fn to_url(&self, base_url: &str, format: WireFormat) -> Result<Url, FetchError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", &self.statement());
            if format == WireFormat::Json {
                query.append_pair("format", "json");
            }
            query.append_pair("env", TABLE_ENV);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::parse_codes;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn codes(list: &[&str]) -> Vec<CurrencyCode> {
        parse_codes(list).unwrap()
    }

    #[test]
    fn test_three_currencies_give_three_pairs() {
        let list = codes(&["USD", "EUR", "JPY"]);
        let query = RateQuery::for_currencies(&list);
        let ids: Vec<String> = query
            .pairs()
            .iter()
            .map(|(s, d)| format!("{s}{d}"))
            .collect();
        assert_eq!(ids, vec!["USDEUR", "USDJPY", "EURJPY"]);
    }

    #[test]
    fn test_distinct_source_and_dest_lists() {
        let query = RateQuery::build(&codes(&["USD"]), &codes(&["EUR", "USD", "GBP"]));
        assert_eq!(query.len(), 2);
        assert_eq!(query.pair_list(), "\"USDEUR\",\"USDGBP\"");
    }

    #[test]
    fn test_single_currency_is_empty() {
        assert!(RateQuery::for_currencies(&codes(&["USD"])).is_empty());
        assert!(RateQuery::for_currencies(&[]).is_empty());
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let query = RateQuery::for_currencies(&codes(&["USD", "EUR", "USD", "EUR"]));
        assert_eq!(query.len(), 1);
    }

    #[test]
    fn test_url_is_escaped() {
        let query = RateQuery::for_currencies(&codes(&["USD", "EUR"]));
        let url = query
            .to_url("http://localhost:8080/v1/public/yql", WireFormat::Json)
            .unwrap();
        let raw = url.as_str();
        assert!(!raw.contains(' '));
        assert!(!raw.contains('"'));
        assert!(raw.contains("format=json"));

        let q: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(q[0].0, "q");
        assert_eq!(
            q[0].1,
            "select * from yahoo.finance.xchange where pair in (\"USDEUR\")"
        );
    }

    #[test]
    fn test_xml_url_has_no_format_parameter() {
        let query = RateQuery::for_currencies(&codes(&["USD", "EUR"]));
        let url = query
            .to_url("http://localhost/yql", WireFormat::Xml)
            .unwrap();
        assert!(url.query_pairs().all(|(k, _)| k != "format"));
    }

    #[test]
    fn test_invalid_base_url() {
        let query = RateQuery::for_currencies(&codes(&["USD", "EUR"]));
        let result = query.to_url("not a url", WireFormat::Xml);
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    fn unique_codes() -> impl Strategy<Value = Vec<CurrencyCode>> {
        prop::collection::hash_set("[A-Z]{3}", 0..12).prop_map(|set| {
            set.into_iter()
                .map(|c| CurrencyCode::new(&c).unwrap())
                .collect()
        })
    }

    proptest! {
        #[test]
        fn emits_n_choose_2_pairs_without_converses(list in unique_codes()) {
            let n = list.len();
            let query = RateQuery::for_currencies(&list);
            prop_assert_eq!(query.len(), n * n.saturating_sub(1) / 2);

            let mut seen = HashSet::new();
            for (s, d) in query.pairs() {
                prop_assert_ne!(s, d);
                prop_assert!(!seen.contains(&(*d, *s)));
                prop_assert!(seen.insert((*s, *d)));
            }
        }
    }
}
