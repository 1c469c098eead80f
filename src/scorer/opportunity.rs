use crate::config::margin_curve::{STEEPNESS, THRESHOLD};
use crate::netting::Netting;
use crate::scorer::features::{ComponentScores, TableBounds};
use crate::types::{Columns, Pair, ScoreWeights};

/// Component scores plus the aggregate for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub components: ComponentScores,
    pub margin: f64,
    pub opportunity: f64,
}

/// Combines the margin curve with the seven component scores.
/// Holds only the weights; every call is a pure function of its inputs.
pub struct OpportunityScorer {
    weights: ScoreWeights,
}

impl OpportunityScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Scores every pair against bounds taken from the whole sell side.
    /// `nettings[i]` must belong to `pairs[i]`.
    pub fn score_pairs(
        &self,
        pairs: &[Pair],
        nettings: &[Netting],
        columns: &Columns,
    ) -> Vec<PairScore> {
        debug_assert_eq!(pairs.len(), nettings.len());
        let bounds = TableBounds::from_records(pairs.iter().map(|p| &p.sell), columns);

        pairs
            .iter()
            .zip(nettings)
            .map(|(pair, netting)| {
                let components = ComponentScores::for_record(&pair.sell, &bounds);
                let margin = margin_score(netting.margin_pct);
                PairScore {
                    components,
                    margin,
                    opportunity: weighted_sum(margin, &components, &self.weights),
                }
            })
            .collect()
    }
}

/// Logistic curve centred on a 15% margin ratio. NaN margins score as 0%.
pub fn margin_score(margin_pct: f64) -> f64 {
    let m = if margin_pct.is_nan() { 0.0 } else { margin_pct };
    1.0 / (1.0 + (-STEEPNESS * (m - THRESHOLD)).exp())
}

/// Weighted sum over the eight components. Weights are used as given.
pub fn weighted_sum(margin: f64, c: &ComponentScores, w: &ScoreWeights) -> f64 {
    w.margin * margin
        + w.demand * c.demand
        + w.competition * c.competition
        + w.availability * c.availability
        + w.price_edge * c.price_edge
        + w.logistics * c.logistics
        + w.risk * c.risk
        + w.stability * c.stability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netting::compute_margins;
    use crate::types::{MarketRecord, NettingConfig};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn unit_components(v: f64) -> ComponentScores {
        ComponentScores {
            demand: v,
            price_edge: v,
            competition: v,
            availability: v,
            stability: v,
            logistics: v,
            risk: v,
        }
    }

    #[test]
    fn margin_curve_is_centred_on_threshold() {
        assert!(approx(margin_score(0.15), 0.5));
        assert!(margin_score(0.40) > 0.85);
        assert!(margin_score(-0.20) < 0.1);
        assert!(approx(margin_score(f64::NAN), margin_score(0.0)));
        assert!(margin_score(1e6) <= 1.0);
        assert!(margin_score(-1e6) >= 0.0);
    }

    #[test]
    fn weighted_sum_uses_raw_weights() {
        let w = ScoreWeights::default();
        assert!(approx(weighted_sum(1.0, &unit_components(1.0), &w), w.total()));

        let doubled = ScoreWeights {
            margin: 0.70,
            ..ScoreWeights::default()
        };
        assert!(approx(
            weighted_sum(1.0, &unit_components(0.0), &doubled),
            0.70
        ));
    }

    #[test]
    fn scoring_is_idempotent() {
        let mut buy = MarketRecord::new("A", "DE");
        buy.buybox_current = Some(40.0);
        let mut sell = MarketRecord::new("A", "IT");
        sell.buybox_current = Some(80.0);
        sell.sales_rank_current = Some(1200.0);
        sell.total_offer_count = Some(4.0);
        let pairs = vec![Pair { buy, sell }];
        let cfg = NettingConfig::default();
        let nettings: Vec<_> = pairs.iter().map(|p| compute_margins(p, &cfg)).collect();

        let columns: Columns = ["buybox_current", "sales_rank_current", "total_offer_count"]
            .into_iter()
            .collect();

        let scorer = OpportunityScorer::new(ScoreWeights::default());
        let first = scorer.score_pairs(&pairs, &nettings, &columns);
        let second = scorer.score_pairs(&pairs, &nettings, &columns);
        assert_eq!(first, second);
        assert!(first[0].opportunity > 0.0);
        assert!(first[0].opportunity <= scorer.weights().total());
    }
}
