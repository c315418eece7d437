//! Rate lookup and upsert capability shared by the durable store and the
//! in-memory compact map.

use crate::core::currency::{CurrencyCode, RatePair};
use crate::error::StoreError;
use chrono::{DateTime, Utc};

pub trait RateBook {
    /// Rate for one unit of `source` in `dest`, if known.
    fn lookup(&self, source: CurrencyCode, dest: CurrencyCode) -> Result<Option<f64>, StoreError>;

    /// Inserts or replaces every pair in the batch.
    fn upsert(&mut self, pairs: &[RatePair]) -> Result<(), StoreError>;

    /// Whether this book needs both directions of a pair supplied
    /// explicitly. Books that derive the reverse on read return `false`.
    fn wants_reciprocals(&self) -> bool {
        true
    }

    /// Stores the outcome of a successful synchronization pass. Books that
    /// persist the completion time write it together with the rates.
    fn record_sync(&mut self, pairs: &[RatePair], _at: DateTime<Utc>) -> Result<(), StoreError> {
        self.upsert(pairs)
    }

    /// Completion time of the last pass recorded through [`record_sync`].
    ///
    /// [`record_sync`]: RateBook::record_sync
    fn last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(None)
    }
}

/// Converts `amount` of `from` into `to` using whatever `book` knows.
///
/// Self pairs convert at 1.0. Falls back to the reverse direction when only
/// that one is stored.
pub fn convert<B: RateBook + ?Sized>(
    book: &B,
    amount: f64,
    from: CurrencyCode,
    to: CurrencyCode,
) -> Result<Option<f64>, StoreError> {
    if from == to {
        return Ok(Some(amount));
    }
    if let Some(rate) = book.lookup(from, to)? {
        return Ok(Some(amount * rate));
    }
    Ok(book
        .lookup(to, from)?
        .filter(|r| *r > 0.0)
        .map(|r| amount / r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct OneWayBook {
        rates: HashMap<(CurrencyCode, CurrencyCode), f64>,
    }

    impl RateBook for OneWayBook {
        fn lookup(
            &self,
            source: CurrencyCode,
            dest: CurrencyCode,
        ) -> Result<Option<f64>, StoreError> {
            Ok(self.rates.get(&(source, dest)).copied())
        }

        fn upsert(&mut self, pairs: &[RatePair]) -> Result<(), StoreError> {
            for p in pairs {
                self.rates.insert((p.source(), p.dest()), p.rate());
            }
            Ok(())
        }
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    #[test]
    fn test_convert_direct_and_reverse() {
        let mut book = OneWayBook::default();
        book.upsert(&[RatePair::from_codes("USD", "EUR", 0.5).unwrap()])
            .unwrap();

        assert_eq!(
            convert(&book, 10.0, code("USD"), code("EUR")).unwrap(),
            Some(5.0)
        );
        assert_eq!(
            convert(&book, 5.0, code("EUR"), code("USD")).unwrap(),
            Some(10.0)
        );
        assert_eq!(
            convert(&book, 3.0, code("GBP"), code("GBP")).unwrap(),
            Some(3.0)
        );
        assert_eq!(convert(&book, 3.0, code("GBP"), code("USD")).unwrap(), None);
    }
}
