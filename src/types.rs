use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{DEFAULT_VAT, FALLBACK_VAT, FBM_FLAT_EUR, REFERRAL_FEE_DEFAULT};
use crate::error::AppError;
use crate::parsing::parse_price;

// ---------------------------------------------------------------------------
// Market records
// ---------------------------------------------------------------------------

/// One catalog item in one marketplace. Every signal is optional: absent
/// cells stay `None` and each consumer decides its own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketRecord {
    pub asin: String,
    /// Marketplace code, upper-cased on input.
    #[serde(deserialize_with = "lenient::country")]
    pub country: Option<String>,
    pub title: Option<String>,

    // Prices
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_current: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub new_current: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_30d_avg: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_90d_avg: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub amazon_current: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub list_price_current: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub competitive_price_threshold: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub suggested_lower_price: Option<f64>,

    // Demand
    #[serde(deserialize_with = "lenient::number")]
    pub sales_rank_current: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub sales_rank_drops_30d: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub sales_rank_drops_90d: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub bought_past_month: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub reviews_rating: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub reviews_count: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub reviews_90d_avg: Option<f64>,

    // Buy box dynamics
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_std_30d: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_std_90d: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub flipability_30d: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub flipability_90d: Option<f64>,
    /// Share of the last 90 days Amazon held the buy box, as a fraction.
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_pct_amz_90d: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_winner_cnt_90d: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub buybox_90d_oos: Option<f64>,

    // Competition
    #[serde(deserialize_with = "lenient::number")]
    pub total_offer_count: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub new_offer_count_current: Option<f64>,

    // Amazon availability
    #[serde(deserialize_with = "lenient::number")]
    pub amazon_90d_oos: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub amazon_oos_cnt_30d: Option<f64>,
    #[serde(deserialize_with = "lenient::text")]
    pub amazon_offer_availability: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub amazon_offer_shipping_delay: Option<String>,

    // Fees
    /// Either a fraction or a 0-100 percentage; see `netting::referral_fraction`.
    #[serde(deserialize_with = "lenient::number")]
    pub referral_fee_pct: Option<f64>,
    /// Absolute referral fee at the current buy box price.
    #[serde(deserialize_with = "lenient::number")]
    pub referral_fee_on_bb: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub fba_pickpack_fee: Option<f64>,

    // Coupons
    #[serde(deserialize_with = "lenient::number")]
    pub coupon_abs: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub coupon_pct: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub business_discount_pct: Option<f64>,

    // Logistics
    #[serde(deserialize_with = "lenient::number")]
    pub item_weight_g: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub package_weight_g: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub package_volume_cm3: Option<f64>,
    pub prime_eligible: Flag,

    // Risk
    #[serde(deserialize_with = "lenient::number")]
    pub return_rate: Option<f64>,
    pub map_restriction: Flag,
}

impl MarketRecord {
    pub fn new(asin: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            asin: asin.into(),
            country: Some(country.into().trim().to_uppercase()),
            ..Self::default()
        }
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country.as_deref()
    }
}

/// A yes/no style column. Only `yes`, `true` and `1` (any case) count as set;
/// anything else, including absence, is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Flag(pub Option<String>);

impl Flag {
    pub fn yes() -> Self {
        Flag(Some("yes".to_string()))
    }

    pub fn is_set(&self) -> bool {
        self.0
            .as_deref()
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "yes" | "true" | "1"))
            .unwrap_or(false)
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient::text(deserializer).map(Flag)
    }
}

/// Field deserializers that never reject a cell: bad values become `None`.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::parse_price;

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => Some(parse_price(&s)),
            Some(Value::Bool(b)) => Some(if b { 1.0 } else { 0.0 }),
            _ => None,
        }
        .filter(|v| v.is_finite()))
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => Some(s),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn country<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(text(deserializer)?
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Pairs
// ---------------------------------------------------------------------------

/// One buy-side and one sell-side record for the same item.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub buy: MarketRecord,
    pub sell: MarketRecord,
}

impl Pair {
    pub fn item_key(&self) -> &str {
        &self.buy.asin
    }
}

// ---------------------------------------------------------------------------
// Source columns
// ---------------------------------------------------------------------------

/// Column names the source table declared, whether or not any cell in them
/// holds a value. A record cannot tell an absent column from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns(BTreeSet<String>);

impl Columns {
    pub const SELL_PRICE: &'static str = "buybox_current";
    pub const SALES_RANK: &'static str = "sales_rank_current";

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Columns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for Columns {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

// ---------------------------------------------------------------------------
// Configuration values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShipMode {
    /// Fulfilled by the platform: the pick & pack fee applies.
    #[default]
    Fba,
    /// Fulfilled by the merchant: a flat per-unit shipping cost applies.
    Fbm,
}

impl std::str::FromStr for ShipMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FBA" => Ok(ShipMode::Fba),
            "FBM" => Ok(ShipMode::Fbm),
            other => Err(AppError::Config(format!(
                "ship mode must be FBA or FBM, got {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for ShipMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShipMode::Fba => write!(f, "FBA"),
            ShipMode::Fbm => write!(f, "FBM"),
        }
    }
}

/// Tax, discount and fee parameters for one run. Immutable: the `with_*`
/// builders return a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct NettingConfig {
    vat: BTreeMap<String, f64>,
    discount: BTreeMap<String, f64>,
    pub ship_mode: ShipMode,
    /// Referral fraction used when a sell record has neither a fixed fee nor a percentage.
    pub referral_fee_fallback: f64,
    /// Pick & pack fee used in FBA mode when the record carries none.
    pub fulfillment_fee_fallback: f64,
    pub fbm_flat_shipping: f64,
    pub shipping_per_unit: f64,
    pub other_costs_sell: f64,
}

impl Default for NettingConfig {
    fn default() -> Self {
        Self {
            vat: DEFAULT_VAT
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
            discount: BTreeMap::new(),
            ship_mode: ShipMode::default(),
            referral_fee_fallback: REFERRAL_FEE_DEFAULT,
            fulfillment_fee_fallback: 0.0,
            fbm_flat_shipping: FBM_FLAT_EUR,
            shipping_per_unit: 0.0,
            other_costs_sell: 0.0,
        }
    }
}

impl NettingConfig {
    pub fn with_vat(mut self, country: &str, rate: f64) -> Self {
        self.vat.insert(country.trim().to_uppercase(), rate);
        self
    }

    pub fn with_discount(mut self, country: &str, discount: f64) -> Self {
        self.discount.insert(country.trim().to_uppercase(), discount);
        self
    }

    pub fn with_ship_mode(mut self, ship_mode: ShipMode) -> Self {
        self.ship_mode = ship_mode;
        self
    }

    /// VAT for a country, falling back to 0.22, clamped to [0, 1].
    pub fn vat_for(&self, country: Option<&str>) -> f64 {
        country
            .and_then(|c| self.vat.get(&c.trim().to_uppercase()))
            .copied()
            .filter(|v| !v.is_nan())
            .unwrap_or(FALLBACK_VAT)
            .clamp(0.0, 1.0)
    }

    /// Purchase discount for a country, 0 when unset, clamped to [0, 1].
    pub fn discount_for(&self, country: Option<&str>) -> f64 {
        clamp_unit(
            country
                .and_then(|c| self.discount.get(&c.trim().to_uppercase()))
                .copied()
                .unwrap_or(0.0),
        )
    }
}

/// Clamps into [0, 1]; NaN becomes 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Weights of the eight score components. Not required to sum to 1; missing
/// entries in a JSON override keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub margin: f64,
    pub demand: f64,
    pub competition: f64,
    pub availability: f64,
    #[serde(alias = "priceedge")]
    pub price_edge: f64,
    pub logistics: f64,
    pub risk: f64,
    pub stability: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            margin: 0.35,
            demand: 0.20,
            competition: 0.12,
            availability: 0.10,
            price_edge: 0.10,
            logistics: 0.06,
            risk: 0.04,
            stability: 0.03,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.margin
            + self.demand
            + self.competition
            + self.availability
            + self.price_edge
            + self.logistics
            + self.risk
            + self.stability
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A ranked buy/sell opportunity. NaN values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPair {
    pub item_key: String,
    pub title: Option<String>,
    pub buy_country: Option<String>,
    pub sell_country: Option<String>,
    pub buy_price: f64,
    pub sell_price: f64,
    pub vat_buy: f64,
    pub vat_sell: f64,
    pub discount_buy: f64,
    pub fees: f64,
    pub net_cost_purchase: f64,
    pub net_proceeds_sale: f64,
    pub gross_margin: f64,
    pub margin_pct: f64,
    pub score_margin: f64,
    pub score_demand: f64,
    pub score_price_edge: f64,
    pub score_competition: f64,
    pub score_availability: f64,
    pub score_stability: f64,
    pub score_logistics: f64,
    pub score_risk: f64,
    pub opportunity_score: f64,
    /// Detector labels joined by ", "; empty when no rule fires.
    pub badges: String,
    /// Sell-side market tags joined by a space; empty when none apply.
    pub pair_badges: String,
}
