use crate::error::{AppError, Result};
use crate::types::ShipMode;

/// Default VAT rates by marketplace country (fraction of net price).
pub const DEFAULT_VAT: &[(&str, f64)] = &[
    ("IT", 0.22),
    ("DE", 0.19),
    ("FR", 0.20),
    ("ES", 0.21),
    ("NL", 0.21),
    ("BE", 0.21),
    ("AT", 0.20),
    ("PL", 0.23),
    ("SE", 0.25),
    ("DK", 0.25),
    ("IE", 0.23),
    ("PT", 0.23),
    ("UK", 0.20),
];

/// VAT applied to countries missing from the map.
pub const FALLBACK_VAT: f64 = 0.22;

/// The buy-side country whose discount is taken off the gross price.
pub const DOMESTIC_COUNTRY: &str = "IT";

/// Referral fee fraction used when the sell record carries none.
pub const REFERRAL_FEE_DEFAULT: f64 = 0.15;

/// Flat per-unit shipping charged in FBM mode (EUR).
pub const FBM_FLAT_EUR: f64 = 4.00;

/// Default number of ranked pairs returned by the API.
pub const DEFAULT_TOP_N: usize = 200;

/// Logistic margin score: centre and steepness.
pub mod margin_curve {
    pub const THRESHOLD: f64 = 0.15;
    pub const STEEPNESS: f64 = 8.0;
}

/// Floor for the min-max range so degenerate bounds never divide by zero.
pub const NORM_EPSILON: f64 = 1e-9;

/// Badge rule thresholds.
pub mod badge_thresholds {
    pub const WINDOW_OOS_DAYS: f64 = 10.0;
    pub const WINDOW_MIN_DEMAND: f64 = 0.55;
    pub const WINDOW_MIN_MARGIN: f64 = 0.12;
    pub const FLIP_MIN_FLIPABILITY: f64 = 80.0;
    pub const FLIP_STD_PRICE_RATIO: f64 = 0.12;
    pub const FLIP_MIN_DEMAND: f64 = 0.45;
    pub const LOW_GUARD_MAX_AMZ_SHARE: f64 = 0.20;
    pub const LOW_GUARD_MAX_OFFERS: f64 = 8.0;
    pub const RISK_MAX_RETURN_RATE: f64 = 0.15;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Ship mode used when a request does not name one (SHIP_MODE)
    pub ship_mode: ShipMode,
    /// Ranked pairs returned when a request does not set top_n (TOP_N)
    pub top_n: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            ship_mode: std::env::var("SHIP_MODE")
                .unwrap_or_else(|_| "FBA".to_string())
                .parse::<ShipMode>()?,
            top_n: std::env::var("TOP_N")
                .unwrap_or_else(|_| DEFAULT_TOP_N.to_string())
                .parse::<usize>()
                .unwrap_or(DEFAULT_TOP_N),
        })
    }
}

/// Splits a comma-separated country list (BUY_COUNTRIES / SELL_COUNTRIES).
pub fn country_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_list_trims_and_uppercases() {
        assert_eq!(country_list(" de, fr ,,es"), vec!["DE", "FR", "ES"]);
        assert!(country_list("").is_empty());
    }

    #[test]
    fn default_vat_table_is_in_range() {
        for (code, rate) in DEFAULT_VAT {
            assert_eq!(code.len(), 2);
            assert!((0.0..=1.0).contains(rate));
        }
    }
}
