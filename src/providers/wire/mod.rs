//! Decoding quote service responses into rate pairs.
//!
//! Each wire format only has to pull `(id, rate)` tuples out of the
//! document. Validation, rounding and reciprocal derivation live in
//! [`pairs_from_quotes`] so both formats behave identically.

pub mod json;
pub mod xml;

use crate::core::config::WireFormat;
use crate::core::currency::RatePair;
use crate::error::ParseError;
use tracing::{debug, warn};

pub use json::JsonDecoder;
pub use xml::XmlDecoder;

/// One record as it appeared on the wire, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQuote {
    pub id: String,
    pub rate: String,
}

impl RawQuote {
    pub fn new(id: impl Into<String>, rate: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rate: rate.into(),
        }
    }
}

/// A wire format strategy.
///
/// Decoders work on the whole response body, buffered in memory by the
/// fetcher. Quote documents are a few kilobytes; the XML decoder still
/// reads its input as a stream of events rather than building a tree.
pub trait QuoteDecoder: Send + Sync {
    /// Extracts every record from a full response body.
    ///
    /// Only a structurally broken document is an error. An absent or null
    /// results section yields an empty list.
    fn decode(&self, body: &[u8]) -> Result<Vec<RawQuote>, ParseError>;
}

/// Picks the decoder matching the requested response encoding.
pub fn decoder_for(format: WireFormat) -> Box<dyn QuoteDecoder> {
    match format {
        WireFormat::Json => Box::new(JsonDecoder),
        WireFormat::Xml => Box::new(XmlDecoder),
    }
}

/// Validates raw records into rate pairs, skipping malformed ones.
///
/// With `with_reciprocals` every forward pair is followed by its rounded
/// reverse direction.
pub fn pairs_from_quotes(quotes: &[RawQuote], with_reciprocals: bool) -> Vec<RatePair> {
    let mut pairs = Vec::with_capacity(quotes.len() * if with_reciprocals { 2 } else { 1 });
    for quote in quotes {
        match RatePair::from_wire(&quote.id, &quote.rate) {
            Ok(pair) => {
                pairs.push(pair);
                if with_reciprocals {
                    pairs.push(pair.reciprocal());
                }
            }
            Err(e) => {
                warn!(id = %quote.id, rate = %quote.rate, error = %e, "Skipping malformed rate record");
            }
        }
    }
    debug!(
        records = quotes.len(),
        pairs = pairs.len(),
        "Decoded rate records"
    );
    pairs
}

/// Decodes a body and validates it in one step.
pub fn parse_pairs(
    decoder: &dyn QuoteDecoder,
    body: &[u8],
    with_reciprocals: bool,
) -> Result<Vec<RatePair>, ParseError> {
    let quotes = decoder.decode(body)?;
    Ok(pairs_from_quotes(&quotes, with_reciprocals))
}
