//! In-memory bidirectional rate map.
//!
//! In [`MapMode::Compact`] at most one of `A->B` and `B->A` is ever held; the
//! other direction is the rounded inverse, computed on read. In
//! [`MapMode::Redundant`] both directions are stored explicitly.
//!
//! The map does no locking of its own. Wrap it in a mutex to share it.

use crate::core::book::RateBook;
use crate::core::currency::{CurrencyCode, RatePair, reciprocal_rate};
use crate::error::{RateError, StoreError};
use std::collections::HashMap;
use tracing::debug;

/// Returned by [`CompactRateMap::get_rate`] when no rate is known.
pub const UNKNOWN_RATE: f64 = 0.0;

/// Returned by [`CompactRateMap::remove_rate`] when nothing was removed.
pub const NOT_REMOVED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    Compact,
    Redundant,
}

#[derive(Debug, Clone)]
pub struct CompactRateMap {
    mode: MapMode,
    rates: HashMap<(CurrencyCode, CurrencyCode), f64>,
    rate_count: usize,
}

// Directional rates one stored compact entry stands for.
fn logical_rates(source: CurrencyCode, dest: CurrencyCode) -> usize {
    if source == dest { 1 } else { 2 }
}

impl CompactRateMap {
    pub fn new(mode: MapMode) -> Self {
        Self {
            mode,
            rates: HashMap::new(),
            rate_count: 0,
        }
    }

    pub fn compact() -> Self {
        Self::new(MapMode::Compact)
    }

    pub fn redundant() -> Self {
        Self::new(MapMode::Redundant)
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Validates and adds a rate given as raw codes.
    ///
    /// With `force` exactly the given direction is written: no reciprocal in
    /// redundant mode, and in compact mode it displaces a stored reverse
    /// entry instead of updating it.
    pub fn add_rate(&mut self, src: &str, dst: &str, rate: f64, force: bool) -> Result<(), RateError> {
        let pair = RatePair::from_codes(src, dst, rate)?;
        self.insert(pair, force);
        Ok(())
    }

    pub fn insert(&mut self, pair: RatePair, force: bool) {
        match self.mode {
            MapMode::Compact => self.insert_compact(pair, force),
            MapMode::Redundant => self.insert_redundant(pair, force),
        }
    }

    fn insert_compact(&mut self, pair: RatePair, force: bool) {
        let forward = (pair.source(), pair.dest());
        let reverse = (pair.dest(), pair.source());

        if let Some(rate) = self.rates.get_mut(&forward) {
            *rate = pair.rate();
            return;
        }
        if self.rates.contains_key(&reverse) {
            if force {
                self.rates.remove(&reverse);
                self.rates.insert(forward, pair.rate());
            } else if let Some(rate) = self.rates.get_mut(&reverse) {
                *rate = reciprocal_rate(pair.rate());
            }
            return;
        }

        self.rates.insert(forward, pair.rate());
        self.rate_count += logical_rates(pair.source(), pair.dest());
    }

    fn insert_redundant(&mut self, pair: RatePair, force: bool) {
        if self
            .rates
            .insert((pair.source(), pair.dest()), pair.rate())
            .is_none()
        {
            self.rate_count += 1;
        }
        if force || pair.source() == pair.dest() {
            return;
        }
        let reciprocal = pair.reciprocal();
        if self
            .rates
            .insert((reciprocal.source(), reciprocal.dest()), reciprocal.rate())
            .is_none()
        {
            self.rate_count += 1;
        }
    }

    /// Rate for `source -> dest`, derived from the reverse entry if that is
    /// the one stored.
    pub fn rate(&self, source: CurrencyCode, dest: CurrencyCode) -> Option<f64> {
        if let Some(rate) = self.rates.get(&(source, dest)) {
            return Some(*rate);
        }
        self.rates
            .get(&(dest, source))
            .map(|rate| reciprocal_rate(*rate))
    }

    /// Sentinel form of [`rate`](Self::rate): [`UNKNOWN_RATE`] when the rate
    /// is unknown or a code is malformed. Never a valid conversion factor.
    pub fn get_rate(&self, src: &str, dst: &str) -> f64 {
        match (CurrencyCode::new(src), CurrencyCode::new(dst)) {
            (Ok(source), Ok(dest)) => self.rate(source, dest).unwrap_or(UNKNOWN_RATE),
            _ => UNKNOWN_RATE,
        }
    }

    /// Removes the rate between `source` and `dest`, returning it as seen in
    /// the `source -> dest` direction.
    pub fn take_rate(&mut self, source: CurrencyCode, dest: CurrencyCode) -> Option<f64> {
        if let Some(rate) = self.rates.remove(&(source, dest)) {
            self.forget(source, dest);
            return Some(rate);
        }
        if let Some(rate) = self.rates.remove(&(dest, source)) {
            self.forget(dest, source);
            return Some(reciprocal_rate(rate));
        }
        None
    }

    // Count bookkeeping after the stored `source -> dest` entry is gone.
    fn forget(&mut self, source: CurrencyCode, dest: CurrencyCode) {
        let removed = match self.mode {
            MapMode::Compact => logical_rates(source, dest),
            MapMode::Redundant => {
                let twin = if source != dest {
                    self.rates.remove(&(dest, source)).is_some()
                } else {
                    false
                };
                if twin { 2 } else { 1 }
            }
        };
        self.rate_count = self.rate_count.saturating_sub(removed);
        debug!(%source, %dest, removed, "Removed rate");
    }

    /// Sentinel form of [`take_rate`](Self::take_rate): [`NOT_REMOVED`] when
    /// nothing was removed.
    pub fn remove_rate(&mut self, src: &str, dst: &str) -> f64 {
        match (CurrencyCode::new(src), CurrencyCode::new(dst)) {
            (Ok(source), Ok(dest)) => self.take_rate(source, dest).unwrap_or(NOT_REMOVED),
            _ => NOT_REMOVED,
        }
    }

    /// Directional rates known, for diagnostics.
    pub fn rate_count(&self) -> usize {
        self.rate_count
    }

    /// Entries physically held.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl Default for CompactRateMap {
    fn default() -> Self {
        Self::compact()
    }
}

impl RateBook for CompactRateMap {
    fn lookup(&self, source: CurrencyCode, dest: CurrencyCode) -> Result<Option<f64>, StoreError> {
        Ok(self.rate(source, dest))
    }

    fn upsert(&mut self, pairs: &[RatePair]) -> Result<(), StoreError> {
        for pair in pairs {
            self.insert(*pair, false);
        }
        Ok(())
    }

    fn wants_reciprocals(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    #[test]
    fn test_compact_add_get_remove() {
        let mut map = CompactRateMap::compact();
        map.add_rate("USD", "CAD", 1.2283, false).unwrap();

        assert_eq!(map.get_rate("USD", "CAD"), 1.2283);
        assert_eq!(map.get_rate("CAD", "USD"), 0.814133);
        assert_eq!(map.rate_count(), 2);
        assert_eq!(map.len(), 1);

        assert_eq!(map.remove_rate("USD", "CAD"), 1.2283);
        assert_eq!(map.rate_count(), 0);
        assert_eq!(map.get_rate("USD", "CAD"), UNKNOWN_RATE);
        assert_eq!(map.get_rate("CAD", "USD"), UNKNOWN_RATE);
    }

    #[test]
    fn test_compact_updates_counter_pair_in_place() {
        let mut map = CompactRateMap::compact();
        map.add_rate("USD", "EUR", 0.8, false).unwrap();
        map.add_rate("EUR", "USD", 1.25, false).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.rate_count(), 2);
        // The stored USD->EUR entry now holds the inverse of the new rate.
        assert_eq!(map.rate(code("USD"), code("EUR")), Some(0.8));

        map.add_rate("EUR", "USD", 2.0, false).unwrap();
        assert_eq!(map.rate(code("USD"), code("EUR")), Some(0.5));
        assert_eq!(map.rate(code("EUR"), code("USD")), Some(2.0));
    }

    #[test]
    fn test_compact_forced_add_displaces_reverse() {
        let mut map = CompactRateMap::compact();
        map.add_rate("USD", "EUR", 0.8, false).unwrap();
        map.add_rate("EUR", "USD", 1.3, true).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.rate_count(), 2);
        assert_eq!(map.get_rate("EUR", "USD"), 1.3);
        assert_eq!(map.get_rate("USD", "EUR"), 0.769231);
    }

    #[test]
    fn test_remove_through_reverse_returns_reciprocal() {
        let mut map = CompactRateMap::compact();
        map.add_rate("USD", "EUR", 0.8, false).unwrap();

        assert_eq!(map.remove_rate("EUR", "USD"), 1.25);
        assert!(map.is_empty());
        assert_eq!(map.rate_count(), 0);
        assert_eq!(map.remove_rate("EUR", "USD"), NOT_REMOVED);
        assert_eq!(map.rate_count(), 0);
    }

    #[test]
    fn test_redundant_stores_both_directions() {
        let mut map = CompactRateMap::redundant();
        map.add_rate("USD", "CAD", 1.2283, false).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.rate_count(), 2);
        assert_eq!(map.get_rate("CAD", "USD"), 0.814133);

        // Re-adding only replaces values.
        map.add_rate("USD", "CAD", 1.25, false).unwrap();
        assert_eq!(map.rate_count(), 2);
        assert_eq!(map.get_rate("CAD", "USD"), 0.8);

        assert_eq!(map.remove_rate("USD", "CAD"), 1.25);
        assert_eq!(map.rate_count(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_redundant_forced_single_direction() {
        let mut map = CompactRateMap::redundant();
        map.add_rate("USD", "JPY", 110.0, true).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.rate_count(), 1);
        assert_eq!(map.get_rate("JPY", "USD"), 0.009091);

        assert_eq!(map.remove_rate("USD", "JPY"), 110.0);
        assert_eq!(map.rate_count(), 0);
    }

    #[test]
    fn test_add_validates_before_mutating() {
        let mut map = CompactRateMap::compact();
        assert!(map.add_rate("US", "EUR", 1.0, false).is_err());
        assert!(map.add_rate("USD", "EURO", 1.0, false).is_err());
        assert!(map.add_rate("USD", "EUR", 0.0, false).is_err());
        assert!(map.add_rate("USD", "EUR", -3.0, false).is_err());
        assert!(map.is_empty());
        assert_eq!(map.rate_count(), 0);
    }

    #[test]
    fn test_malformed_codes_read_as_sentinels() {
        let mut map = CompactRateMap::compact();
        assert_eq!(map.get_rate("USDX", "EUR"), UNKNOWN_RATE);
        assert_eq!(map.remove_rate("USD", ""), NOT_REMOVED);
    }

    #[test]
    fn test_self_pair_counts_once() {
        let mut map = CompactRateMap::compact();
        map.add_rate("USD", "USD", 1.0, false).unwrap();
        assert_eq!(map.rate_count(), 1);
        assert_eq!(map.remove_rate("USD", "USD"), 1.0);
        assert_eq!(map.rate_count(), 0);
    }

    #[test]
    fn test_upsert_through_rate_book() {
        let mut map = CompactRateMap::compact();
        let pair = RatePair::from_codes("GBP", "EUR", 1.17).unwrap();
        RateBook::upsert(&mut map, &[pair, pair.reciprocal()]).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup(code("EUR"), code("GBP")).unwrap(), Some(0.854701));
        assert!(!map.wants_reciprocals());
    }
}
