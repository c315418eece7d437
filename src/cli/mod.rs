//! Terminal front end: command handlers and table rendering.

pub mod rates;
pub mod setup;
pub mod sync;
pub mod ui;
