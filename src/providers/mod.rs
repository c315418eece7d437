//! Talking to the quote service: request building, transport and wire decoding.

pub mod fetcher;
pub mod request;
pub mod wire;

pub use fetcher::{HttpRateFetcher, RateFetcher};
pub use request::RateQuery;
pub use wire::{QuoteDecoder, RawQuote, decoder_for, parse_pairs};
