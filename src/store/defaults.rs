//! Bundled rates used before the first successful synchronization.

use crate::core::currency::{CurrencyCode, RatePair};
use crate::error::RateError;

/// Units of each currency per US dollar, in default display order.
pub const DEFAULT_USD_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.9192),
    ("GBP", 0.7186),
    ("JPY", 113.56),
    ("CAD", 1.3525),
    ("AUD", 1.4032),
    ("CHF", 0.9968),
    ("CNY", 6.5491),
    ("INR", 68.1),
];

/// Default display ordering, position starting at zero.
pub fn default_display_order() -> Result<Vec<(CurrencyCode, u32)>, RateError> {
    DEFAULT_USD_RATES
        .iter()
        .zip(0u32..)
        .map(|((code, _), position)| Ok((CurrencyCode::new(code)?, position)))
        .collect()
}

/// Every ordered pair between the bundled currencies, crossed through USD.
pub fn default_pairs() -> Result<Vec<RatePair>, RateError> {
    let mut pairs = Vec::with_capacity(DEFAULT_USD_RATES.len() * DEFAULT_USD_RATES.len());
    for (source, per_usd_source) in DEFAULT_USD_RATES {
        for (dest, per_usd_dest) in DEFAULT_USD_RATES {
            if source == dest {
                continue;
            }
            pairs.push(RatePair::from_codes(
                source,
                dest,
                per_usd_dest / per_usd_source,
            )?);
        }
    }
    Ok(pairs)
}
