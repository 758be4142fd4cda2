//! Price source adapters.

mod yahoo;

pub use yahoo::{YahooAdapter, YAHOO_BASE_URL};
