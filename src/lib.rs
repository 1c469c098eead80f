//! Cross-marketplace resale scanner: pairs the same item across Amazon
//! marketplaces, nets out VAT, discounts and fees, and ranks every pair by a
//! weighted opportunity score with qualitative badges.

pub mod api;
pub mod config;
pub mod detector;
pub mod error;
pub mod loader;
pub mod netting;
pub mod pairing;
pub mod parsing;
pub mod pipeline;
pub mod scorer;
pub mod types;

pub use error::{AppError, Result};
pub use pipeline::{run, RunInput, RunSummary, ScoredRun};
