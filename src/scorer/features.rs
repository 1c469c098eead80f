//! Seven 0-1 component scores derived from a pair's sell-side signals.
//!
//! Each component is the unweighted mean of independently normalized terms.
//! Missing signals are read as 0 before scaling, so an item with sparse data
//! scores low rather than failing.

use serde::Serialize;

use crate::config::NORM_EPSILON;
use crate::types::{Columns, MarketRecord};

/// Bounded min-max scaling into [0, 1].
///
/// A NaN `x` is treated as 0. When `high - low` collapses below the epsilon
/// floor the range is degenerate and the result is a step at `low`.
pub fn normalize(x: f64, low: f64, high: f64) -> f64 {
    let x = if x.is_nan() { 0.0 } else { x };
    let range = (high - low).max(NORM_EPSILON);
    if range <= NORM_EPSILON {
        return if x >= low { 1.0 } else { 0.0 };
    }
    ((x - low) / range).clamp(0.0, 1.0)
}

/// `1 - normalize(..)`: for signals where smaller is better.
pub fn inverse(x: f64, low: f64, high: f64) -> f64 {
    1.0 - normalize(x, low, high)
}

/// `a / b` with zero or NaN denominators mapped to 0 and `+inf` clipped to 1.
pub fn safe_ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 || b.is_nan() {
        return 0.0;
    }
    let r = a / b;
    if r.is_nan() || r == f64::NEG_INFINITY {
        0.0
    } else if r == f64::INFINITY {
        1.0
    } else {
        r
    }
}

fn indicator(set: bool) -> f64 {
    if set {
        1.0
    } else {
        0.0
    }
}

fn mean(terms: &[f64]) -> f64 {
    terms.iter().sum::<f64>() / terms.len() as f64
}

fn or_zero(v: Option<f64>) -> f64 {
    v.unwrap_or(0.0)
}

/// Table-wide inputs some terms are scaled against. Computed once per run
/// over every sell-side record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableBounds {
    /// Whether the table declares a sales rank column at all.
    pub rank_column: bool,
    /// Substitute for a missing sales rank; `None` when no record has one.
    pub rank_fill: Option<f64>,
    /// Largest current price, missing prices counted as 1.
    pub price_ceiling: f64,
}

impl TableBounds {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a MarketRecord>,
        columns: &Columns,
    ) -> Self {
        let mut max_rank: Option<f64> = None;
        let mut max_price: Option<f64> = None;
        for record in records {
            if let Some(rank) = record.sales_rank_current {
                max_rank = Some(max_rank.map_or(rank, |m| m.max(rank)));
            }
            let price = record.buybox_current.unwrap_or(1.0);
            max_price = Some(max_price.map_or(price, |m| m.max(price)));
        }
        Self {
            rank_column: columns.contains(Columns::SALES_RANK),
            rank_fill: max_rank.map(|m| if m == 0.0 { 1.0 } else { m }),
            price_ceiling: max_price.unwrap_or(1.0),
        }
    }

    fn volatility_ceiling_30d(&self) -> f64 {
        self.price_ceiling * 0.25
    }

    fn volatility_ceiling_90d(&self) -> f64 {
        self.price_ceiling * 0.30
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScores {
    pub demand: f64,
    pub price_edge: f64,
    pub competition: f64,
    pub availability: f64,
    pub stability: f64,
    pub logistics: f64,
    pub risk: f64,
}

impl ComponentScores {
    pub fn for_record(r: &MarketRecord, bounds: &TableBounds) -> Self {
        Self {
            demand: demand_score(r, bounds),
            price_edge: price_edge_score(r, bounds),
            competition: competition_score(r),
            availability: availability_score(r),
            stability: stability_score(r, bounds),
            logistics: logistics_score(r),
            risk: risk_score(r),
        }
    }
}

/// Rank, rank drops, monthly sales and review growth.
pub fn demand_score(r: &MarketRecord, bounds: &TableBounds) -> f64 {
    // An undeclared rank column contributes 0; a declared but empty one reads
    // as rank 0 after coercion, which scores 1.
    let rank_term = if bounds.rank_column {
        let rank = r.sales_rank_current.or(bounds.rank_fill).unwrap_or(f64::NAN);
        normalize(-rank.ln_1p(), -15.0, 0.0)
    } else {
        0.0
    };
    let drops = normalize(or_zero(r.sales_rank_drops_30d), 0.0, 20.0);
    let bought = normalize(or_zero(r.bought_past_month), 0.0, 2000.0);

    let reviews_base = match r.reviews_90d_avg {
        Some(avg) if avg == 0.0 => 1.0,
        Some(avg) => avg,
        None => f64::NAN,
    };
    let growth = safe_ratio(or_zero(r.reviews_count), reviews_base);
    let review_term = normalize(growth, 0.9, 1.5);

    mean(&[rank_term, drops, bought, review_term])
}

/// Headroom below competitive and suggested prices, plus swing potential.
pub fn price_edge_score(r: &MarketRecord, bounds: &TableBounds) -> f64 {
    let current = r.buybox_current.unwrap_or(f64::NAN);
    let gap = |reference: Option<f64>| {
        let d = reference.unwrap_or(f64::NAN) - current;
        normalize(d, -50.0, 50.0)
    };
    let edge_threshold = gap(r.competitive_price_threshold);
    let edge_suggested = gap(r.suggested_lower_price);
    let volatility = normalize(
        or_zero(r.buybox_std_30d),
        0.0,
        bounds.volatility_ceiling_30d(),
    );
    let flip = normalize(or_zero(r.flipability_90d), 0.0, 200.0);

    mean(&[edge_threshold, edge_suggested, volatility, flip])
}

/// Fewer sellers, less Amazon presence, fewer buy box winners.
pub fn competition_score(r: &MarketRecord) -> f64 {
    mean(&[
        inverse(or_zero(r.total_offer_count), 0.0, 50.0),
        inverse(or_zero(r.new_offer_count_current), 0.0, 30.0),
        inverse(or_zero(r.buybox_pct_amz_90d), 0.0, 1.0),
        inverse(or_zero(r.buybox_winner_cnt_90d), 1.0, 25.0),
    ])
}

/// How often Amazon itself is out of stock or not competing.
pub fn availability_score(r: &MarketRecord) -> f64 {
    let no_amazon = r
        .amazon_offer_availability
        .as_deref()
        .map(|s| s.to_lowercase().contains("no amazon offer"))
        .unwrap_or(false);
    let delayed = r
        .amazon_offer_shipping_delay
        .as_deref()
        .map(|s| s.contains("delay"))
        .unwrap_or(false);

    mean(&[
        normalize(or_zero(r.amazon_90d_oos), 0.0, 90.0),
        normalize(or_zero(r.amazon_oos_cnt_30d), 0.0, 15.0),
        indicator(no_amazon),
        indicator(delayed),
    ])
}

/// 60/40 blend toward low 90-day volatility. The blend is affine in the
/// normalized deviation (`0.6 - 0.2 * s`).
pub fn stability_score(r: &MarketRecord, bounds: &TableBounds) -> f64 {
    let s = normalize(
        or_zero(r.buybox_std_90d),
        0.0,
        bounds.volatility_ceiling_90d(),
    );
    0.6 * (1.0 - s) + 0.4 * s
}

/// Cheap to fulfil, light, prime eligible.
pub fn logistics_score(r: &MarketRecord) -> f64 {
    mean(&[
        inverse(or_zero(r.fba_pickpack_fee), 0.0, 7.0),
        inverse(or_zero(r.item_weight_g), 0.0, 3000.0),
        indicator(r.prime_eligible.is_set()),
    ])
}

/// Low return rate and no minimum advertised price restriction.
pub fn risk_score(r: &MarketRecord) -> f64 {
    mean(&[
        inverse(or_zero(r.return_rate), 0.0, 0.2),
        1.0 - indicator(r.map_restriction.is_set()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Flag;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn bounds_for(records: &[MarketRecord]) -> TableBounds {
        let columns: Columns = [Columns::SELL_PRICE, Columns::SALES_RANK].into_iter().collect();
        TableBounds::from_records(records.iter(), &columns)
    }

    #[test]
    fn normalize_scales_and_clamps() {
        assert_eq!(normalize(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalize(-3.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize(30.0, 0.0, 10.0), 1.0);
        assert_eq!(normalize(f64::NAN, 0.0, 10.0), 0.0);
        assert_eq!(normalize(f64::NAN, -15.0, 0.0), 1.0);
    }

    #[test]
    fn normalize_degenerate_range_is_a_step() {
        assert_eq!(normalize(4.0, 4.0, 4.0), 1.0);
        assert_eq!(normalize(9.0, 4.0, 4.0), 1.0);
        assert_eq!(normalize(3.9, 4.0, 4.0), 0.0);
        assert_eq!(normalize(5.0, 4.0, 2.0), 1.0);
    }

    #[test]
    fn normalize_is_monotonic_and_bounded() {
        let xs: Vec<f64> = (-40..=40).map(|i| i as f64 * 0.5).collect();
        for (low, high) in [(0.0, 10.0), (-5.0, 5.0), (3.0, 3.0), (1.0, 1.0 + 1e-12)] {
            let ys: Vec<f64> = xs.iter().map(|&x| normalize(x, low, high)).collect();
            assert!(ys.iter().all(|y| (0.0..=1.0).contains(y)));
            assert!(ys.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn safe_ratio_edge_cases() {
        assert_eq!(safe_ratio(3.0, 0.0), 0.0);
        assert_eq!(safe_ratio(3.0, f64::NAN), 0.0);
        assert_eq!(safe_ratio(f64::INFINITY, 1.0), 1.0);
        assert_eq!(safe_ratio(6.0, 3.0), 2.0);
    }

    #[test]
    fn empty_record_scores_within_unit_interval() {
        let r = MarketRecord::new("A", "IT");
        let bounds = TableBounds::from_records(std::slice::from_ref(&r), &Columns::default());
        let s = ComponentScores::for_record(&r, &bounds);
        for v in [
            s.demand,
            s.price_edge,
            s.competition,
            s.availability,
            s.stability,
            s.logistics,
            s.risk,
        ] {
            assert!((0.0..=1.0).contains(&v), "score {v} out of range");
        }
        // No rank column in the table: the rank term contributes nothing.
        assert_eq!(s.demand, normalize(0.0, 0.9, 1.5) / 4.0);
        // Empty signals read as no competition at all.
        assert!(approx(s.competition, 1.0));
        assert!(approx(s.risk, 1.0));
        assert!(approx(s.stability, 0.6));
    }

    #[test]
    fn missing_rank_takes_table_maximum() {
        let mut ranked = MarketRecord::new("A", "IT");
        ranked.sales_rank_current = Some(1000.0);
        let unranked = MarketRecord::new("B", "IT");
        let bounds = bounds_for(&[ranked.clone(), unranked.clone()]);
        assert_eq!(bounds.rank_fill, Some(1000.0));
        assert!(approx(demand_score(&ranked, &bounds), demand_score(&unranked, &bounds)));
    }

    #[test]
    fn declared_but_empty_rank_column_scores_top_rank() {
        let r = MarketRecord::new("A", "IT");
        let bounds = bounds_for(std::slice::from_ref(&r));
        assert!(bounds.rank_column);
        assert_eq!(bounds.rank_fill, None);
        assert!(approx(demand_score(&r, &bounds), (1.0 + normalize(0.0, 0.9, 1.5)) / 4.0));
    }

    #[test]
    fn better_rank_means_higher_demand() {
        let mut hot = MarketRecord::new("A", "IT");
        hot.sales_rank_current = Some(50.0);
        let mut cold = MarketRecord::new("B", "IT");
        cold.sales_rank_current = Some(500_000.0);
        let bounds = bounds_for(&[hot.clone(), cold.clone()]);
        assert!(demand_score(&hot, &bounds) > demand_score(&cold, &bounds));
    }

    #[test]
    fn review_growth_term() {
        let mut r = MarketRecord::new("A", "IT");
        r.reviews_count = Some(150.0);
        r.reviews_90d_avg = Some(100.0);
        let bounds = TableBounds {
            rank_column: false,
            rank_fill: None,
            price_ceiling: 1.0,
        };
        // 1.5 growth saturates the review term.
        assert!(approx(demand_score(&r, &bounds), 0.25));
    }

    #[test]
    fn price_edge_rewards_headroom() {
        let mut r = MarketRecord::new("A", "IT");
        r.buybox_current = Some(100.0);
        r.competitive_price_threshold = Some(150.0);
        r.suggested_lower_price = Some(50.0);
        r.flipability_90d = Some(100.0);
        let bounds = bounds_for(std::slice::from_ref(&r));
        // threshold gap +50 -> 1, suggested gap -50 -> 0, no std, flip 0.5
        assert!(approx(price_edge_score(&r, &bounds), (1.0 + 0.0 + 0.0 + 0.5) / 4.0));
    }

    #[test]
    fn stability_blend_is_literal() {
        let mut r = MarketRecord::new("A", "IT");
        r.buybox_current = Some(100.0);
        r.buybox_std_90d = Some(15.0);
        let bounds = bounds_for(std::slice::from_ref(&r));
        // ceiling = 100 * 0.3 = 30, s = 0.5
        assert!(approx(stability_score(&r, &bounds), 0.6 * 0.5 + 0.4 * 0.5));
    }

    #[test]
    fn availability_and_logistics_indicators() {
        let mut r = MarketRecord::new("A", "IT");
        r.amazon_offer_availability = Some("No Amazon offer exists".into());
        r.amazon_offer_shipping_delay = Some("shipping delay".into());
        r.amazon_90d_oos = Some(90.0);
        r.amazon_oos_cnt_30d = Some(15.0);
        assert!(approx(availability_score(&r), 1.0));

        r.prime_eligible = Flag::yes();
        r.fba_pickpack_fee = Some(7.0);
        r.item_weight_g = Some(0.0);
        assert!(approx(logistics_score(&r), (0.0 + 1.0 + 1.0) / 3.0));
    }

    #[test]
    fn risk_penalizes_map_and_returns() {
        let mut r = MarketRecord::new("A", "IT");
        r.map_restriction = Flag::yes();
        r.return_rate = Some(0.1);
        assert!(approx(risk_score(&r), (0.5 + 0.0) / 2.0));
    }
}
