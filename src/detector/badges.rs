use crate::config::badge_thresholds::*;
use crate::types::MarketRecord;

/// Qualitative tag attached next to the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    /// Amazon often out of stock while demand and margin hold up.
    WindowAdvantage,
    /// Price swings wide enough to trade on, with demand behind them.
    VolatilityFlip,
    /// Amazon rarely holds the buy box and few sellers compete.
    LowGuardedBuybox,
    /// MAP restriction or high returns.
    RiskAlert,
}

impl std::fmt::Display for Badge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Badge::WindowAdvantage => "Window Advantage",
            Badge::VolatilityFlip => "Volatility Flip",
            Badge::LowGuardedBuybox => "Low Guarded Buybox",
            Badge::RiskAlert => "Risk Alert",
        };
        write!(f, "{s}")
    }
}

/// Signals the rules read, already coerced: anything missing or NaN is 0.
#[derive(Debug, Clone, Default)]
pub struct BadgeSignals {
    pub amazon_90d_oos: f64,
    pub demand: f64,
    pub margin_pct: f64,
    pub flipability_90d: f64,
    pub buybox_std_90d: f64,
    pub buybox_current: f64,
    pub buybox_pct_amz_90d: f64,
    pub total_offer_count: f64,
    pub return_rate: f64,
    pub map_restriction: bool,
}

fn coerce(v: Option<f64>) -> f64 {
    v.filter(|x| !x.is_nan()).unwrap_or(0.0)
}

impl BadgeSignals {
    pub fn from_sell_side(sell: &MarketRecord, demand: f64, margin_pct: f64) -> Self {
        Self {
            amazon_90d_oos: coerce(sell.amazon_90d_oos),
            demand: coerce(Some(demand)),
            margin_pct: coerce(Some(margin_pct)),
            flipability_90d: coerce(sell.flipability_90d),
            buybox_std_90d: coerce(sell.buybox_std_90d),
            buybox_current: coerce(sell.buybox_current),
            buybox_pct_amz_90d: coerce(sell.buybox_pct_amz_90d),
            total_offer_count: coerce(sell.total_offer_count),
            return_rate: coerce(sell.return_rate),
            map_restriction: sell.map_restriction.is_set(),
        }
    }
}

/// Evaluates the four independent rules. Output order is fixed:
/// window, flip, low guard, risk.
pub fn classify(s: &BadgeSignals) -> Vec<Badge> {
    let window = s.amazon_90d_oos > WINDOW_OOS_DAYS
        && s.demand > WINDOW_MIN_DEMAND
        && s.margin_pct > WINDOW_MIN_MARGIN;
    let flip = (s.flipability_90d > FLIP_MIN_FLIPABILITY
        || s.buybox_std_90d > s.buybox_current * FLIP_STD_PRICE_RATIO)
        && s.demand > FLIP_MIN_DEMAND;
    let low_guard = s.buybox_pct_amz_90d < LOW_GUARD_MAX_AMZ_SHARE
        && s.total_offer_count <= LOW_GUARD_MAX_OFFERS;
    let risk = s.map_restriction || s.return_rate > RISK_MAX_RETURN_RATE;

    [
        (window, Badge::WindowAdvantage),
        (flip, Badge::VolatilityFlip),
        (low_guard, Badge::LowGuardedBuybox),
        (risk, Badge::RiskAlert),
    ]
    .into_iter()
    .filter_map(|(fired, badge)| fired.then_some(badge))
    .collect()
}

/// Renders badges as `"A, B"`; no badges render as `""`.
pub fn render(badges: &[Badge]) -> String {
    badges
        .iter()
        .map(Badge::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
