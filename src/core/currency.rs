//! Currency codes and directional exchange rates.

use crate::error::RateError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places kept for every stored rate.
pub const RATE_SCALE: u32 = 6;

/// Rounds a decimal rate to six places, half-up.
///
/// Rates are always positive, so midpoint-away-from-zero is half-up.
pub fn round6_decimal(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Shortest decimal form of a float, the same digits `Display` prints.
fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// Rounds a rate to six decimal places, half-up.
///
/// The value goes through its shortest decimal representation first, so
/// `0.8141335` rounds to `0.814134` rather than being at the mercy of the
/// binary expansion.
pub fn round6(value: f64) -> f64 {
    to_decimal(value)
        .map(round6_decimal)
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Rounded multiplicative inverse of a positive rate.
pub fn reciprocal_rate(rate: f64) -> f64 {
    match to_decimal(rate) {
        Some(d) if !d.is_zero() => round6_decimal(Decimal::ONE / d)
            .to_f64()
            .unwrap_or(1.0 / rate),
        _ => round6(1.0 / rate),
    }
}

/// An ISO 4217 style currency code: exactly three ASCII letters, upper-case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, RateError> {
        let code = code.trim();
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(RateError::InvalidCode(code.to_string()));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for CurrencyCode {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = RateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

/// Parses a list of raw codes, failing on the first invalid one.
pub fn parse_codes<S: AsRef<str>>(codes: &[S]) -> Result<Vec<CurrencyCode>, RateError> {
    codes.iter().map(|c| CurrencyCode::new(c.as_ref())).collect()
}

/// One directional exchange-rate fact: one unit of `source` buys `rate` units
/// of `dest`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePair {
    source: CurrencyCode,
    dest: CurrencyCode,
    rate: f64,
}

impl RatePair {
    /// Builds a pair, rounding the rate to six places.
    pub fn new(source: CurrencyCode, dest: CurrencyCode, rate: f64) -> Result<Self, RateError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(RateError::InvalidRate(rate));
        }
        let rounded = round6(rate);
        if rounded <= 0.0 {
            return Err(RateError::InvalidRate(rate));
        }
        Ok(Self {
            source,
            dest,
            rate: rounded,
        })
    }

    /// Builds a pair from raw codes.
    pub fn from_codes(source: &str, dest: &str, rate: f64) -> Result<Self, RateError> {
        Self::new(CurrencyCode::new(source)?, CurrencyCode::new(dest)?, rate)
    }

    /// Builds a pair from a six character identifier (`"USDEUR"`) and a
    /// decimal rate string as they appear on the wire.
    pub fn from_wire(id: &str, rate: &str) -> Result<Self, RateError> {
        let id = id.trim();
        if id.chars().count() != 6 || !id.is_ascii() {
            return Err(RateError::InvalidPairId(id.to_string()));
        }
        let (source, dest) = id.split_at(3);
        let source = CurrencyCode::new(source)?;
        let dest = CurrencyCode::new(dest)?;

        let parsed = Decimal::from_str(rate.trim())
            .or_else(|_| Decimal::from_scientific(rate.trim()))
            .map_err(|_| RateError::UnparsableRate(rate.to_string()))?;
        if parsed <= Decimal::ZERO {
            return Err(RateError::UnparsableRate(rate.to_string()));
        }
        let value = round6_decimal(parsed)
            .to_f64()
            .ok_or_else(|| RateError::UnparsableRate(rate.to_string()))?;
        Self::new(source, dest, value)
    }

    pub fn source(&self) -> CurrencyCode {
        self.source
    }

    pub fn dest(&self) -> CurrencyCode {
        self.dest
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The opposite direction, rate rounded to six places.
    pub fn reciprocal(&self) -> Self {
        Self {
            source: self.dest,
            dest: self.source,
            rate: reciprocal_rate(self.rate),
        }
    }

    /// The six character wire identifier, e.g. `USDEUR`.
    pub fn id(&self) -> String {
        format!("{}{}", self.source, self.dest)
    }
}

impl fmt::Display for RatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{} {:.6}", self.source, self.dest, self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    #[test]
    fn test_code_normalizes_case() {
        assert_eq!(code("usd").as_str(), "USD");
        assert_eq!(code(" eUr ").to_string(), "EUR");
    }

    #[test]
    fn test_code_rejects_wrong_length() {
        assert!(CurrencyCode::new("US").is_err());
        assert!(CurrencyCode::new("USDX").is_err());
        assert!(CurrencyCode::new("").is_err());
        assert!(CurrencyCode::new("U5D").is_err());
    }

    #[test]
    fn test_round6_half_up() {
        assert_eq!(round6(0.8141335), 0.814134);
        assert_eq!(round6(1.2283), 1.2283);
        assert_eq!(round6(0.0000005), 0.000001);
        assert_eq!(round6(2.0000004), 2.0);
    }

    #[test]
    fn test_pair_rejects_non_positive_rate() {
        assert_eq!(
            RatePair::from_codes("USD", "EUR", 0.0),
            Err(RateError::InvalidRate(0.0))
        );
        assert!(RatePair::from_codes("USD", "EUR", -1.5).is_err());
        assert!(RatePair::from_codes("USD", "EUR", f64::NAN).is_err());
        assert!(RatePair::from_codes("USD", "EUR", f64::INFINITY).is_err());
    }

    #[test]
    fn test_pair_rejects_rate_that_rounds_to_zero() {
        assert!(RatePair::from_codes("USD", "EUR", 0.0000001).is_err());
    }

    #[test]
    fn test_from_wire_fixture() {
        let pair = RatePair::from_wire("USDCAD", "1.2283").unwrap();
        assert_eq!(pair.source(), code("USD"));
        assert_eq!(pair.dest(), code("CAD"));
        assert_eq!(pair.rate(), 1.2283);

        let reciprocal = pair.reciprocal();
        assert_eq!(reciprocal.source(), code("CAD"));
        assert_eq!(reciprocal.dest(), code("USD"));
        assert_eq!(reciprocal.rate(), 0.814133);
        assert_eq!(reciprocal.id(), "CADUSD");
    }

    #[test]
    fn test_from_wire_rejects_malformed() {
        assert!(matches!(
            RatePair::from_wire("USDCA", "1.0"),
            Err(RateError::InvalidPairId(_))
        ));
        assert!(matches!(
            RatePair::from_wire("USDCADX", "1.0"),
            Err(RateError::InvalidPairId(_))
        ));
        assert!(matches!(
            RatePair::from_wire("USDCAD", "N/A"),
            Err(RateError::UnparsableRate(_))
        ));
        assert!(matches!(
            RatePair::from_wire("USDCAD", "0"),
            Err(RateError::UnparsableRate(_))
        ));
        assert!(matches!(
            RatePair::from_wire("USDCAD", "-2.5"),
            Err(RateError::UnparsableRate(_))
        ));
    }

    #[test]
    fn test_from_wire_rounds_long_rates() {
        let pair = RatePair::from_wire("EURJPY", "123.45678951").unwrap();
        assert_eq!(pair.rate(), 123.45679);
    }

    #[test]
    fn test_self_pair_is_legal() {
        let pair = RatePair::from_codes("USD", "USD", 1.0).unwrap();
        assert_eq!(pair.reciprocal().rate(), 1.0);
    }

    #[test]
    fn test_code_serde_round_trip() {
        let json = serde_json::to_string(&code("gbp")).unwrap();
        assert_eq!(json, "\"GBP\"");
        let back: CurrencyCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code("GBP"));
        assert!(serde_json::from_str::<CurrencyCode>("\"GB\"").is_err());
    }

    proptest! {
        #[test]
        fn reciprocal_of_reciprocal_is_within_rounding(rate in 0.01f64..100.0) {
            let pair = RatePair::from_codes("USD", "EUR", rate).unwrap();
            let back = pair.reciprocal().reciprocal();
            prop_assert_eq!(back.source(), pair.source());
            prop_assert_eq!(back.dest(), pair.dest());
            // Each rounding step loses at most half a unit in the sixth place,
            // amplified by rate^2 through the inversion.
            let tolerance = 1e-6 * (1.0 + pair.rate() * pair.rate());
            prop_assert!((back.rate() - pair.rate()).abs() <= tolerance);
        }
    }
}
