//! Core abstractions: currency codes, rate pairs, config and logging

pub mod book;
pub mod config;
pub mod currency;
pub mod log;

// Re-export main types for cleaner imports
pub use book::{RateBook, convert};
pub use currency::{CurrencyCode, RatePair, reciprocal_rate, round6};
