use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::detector::{self, BadgeSignals};
use crate::error::Result;
use crate::netting::{compute_margins, ensure_sell_price, Netting};
use crate::pairing::build_pairs;
use crate::scorer::{OpportunityScorer, PairScore};
use crate::types::{Columns, MarketRecord, NettingConfig, Pair, ScoreWeights, ScoredPair};

/// Everything one run needs. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct RunInput<'a> {
    pub records: &'a [MarketRecord],
    /// Columns the source table declared, even if every cell is empty.
    pub columns: &'a Columns,
    pub buy_countries: &'a [String],
    pub sell_countries: &'a [String],
    pub netting: &'a NettingConfig,
    pub weights: &'a ScoreWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub distinct_items: usize,
    pub pair_count: usize,
    /// Mean over pairs with a known margin; `None` when there are none.
    pub mean_gross_margin: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredRun {
    pub summary: RunSummary,
    pub pairs: Vec<ScoredPair>,
}

/// Pairs -> netting -> component scores -> aggregate -> badges, ranked by
/// opportunity score. Fails only when the sell price column is undeclared.
pub fn run(input: RunInput<'_>) -> Result<ScoredRun> {
    ensure_sell_price(input.columns)?;
    let pairs = build_pairs(input.records, input.buy_countries, input.sell_countries);

    let nettings: Vec<Netting> = pairs
        .iter()
        .map(|pair| compute_margins(pair, input.netting))
        .collect();
    let scores = OpportunityScorer::new(*input.weights).score_pairs(&pairs, &nettings, input.columns);

    let mut scored: Vec<ScoredPair> = pairs
        .iter()
        .zip(&nettings)
        .zip(&scores)
        .map(|((pair, netting), score)| assemble(pair, netting, score))
        .collect();
    rank(&mut scored);

    let summary = summarize(&scored);
    info!(
        records = input.records.len(),
        pairs = summary.pair_count,
        items = summary.distinct_items,
        "[PIPELINE] scored {} pairs over {} items (buy: {} | sell: {} | mode: {})",
        summary.pair_count,
        summary.distinct_items,
        input.buy_countries.join(","),
        input.sell_countries.join(","),
        input.netting.ship_mode,
    );

    Ok(ScoredRun {
        summary,
        pairs: scored,
    })
}

fn assemble(pair: &Pair, n: &Netting, score: &PairScore) -> ScoredPair {
    let c = &score.components;
    let signals = BadgeSignals::from_sell_side(&pair.sell, c.demand, n.margin_pct);

    ScoredPair {
        item_key: pair.item_key().to_string(),
        title: pair.sell.title.clone().or_else(|| pair.buy.title.clone()),
        buy_country: pair.buy.country.clone(),
        sell_country: pair.sell.country.clone(),
        buy_price: n.buy_price,
        sell_price: n.sell_price,
        vat_buy: n.vat_buy,
        vat_sell: n.vat_sell,
        discount_buy: n.discount_buy,
        fees: n.fees,
        net_cost_purchase: n.net_cost_purchase,
        net_proceeds_sale: n.net_proceeds_sale,
        gross_margin: n.gross_margin,
        margin_pct: n.margin_pct,
        score_margin: score.margin,
        score_demand: c.demand,
        score_price_edge: c.price_edge,
        score_competition: c.competition,
        score_availability: c.availability,
        score_stability: c.stability,
        score_logistics: c.logistics,
        score_risk: c.risk,
        opportunity_score: score.opportunity,
        badges: detector::render(&detector::classify(&signals)),
        pair_badges: detector::pair_tags(&pair.sell),
    }
}

/// Highest opportunity first; NaN scores sink. Stable for ties.
pub fn rank(pairs: &mut [ScoredPair]) {
    pairs.sort_by(|a, b| {
        match (a.opportunity_score.is_nan(), b.opportunity_score.is_nan()) {
            (false, false) => b
                .opportunity_score
                .partial_cmp(&a.opportunity_score)
                .unwrap_or(Ordering::Equal),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => Ordering::Equal,
        }
    });
}

pub fn summarize(pairs: &[ScoredPair]) -> RunSummary {
    let distinct_items = pairs
        .iter()
        .map(|p| p.item_key.as_str())
        .collect::<HashSet<_>>()
        .len();
    let (sum, count) = pairs
        .iter()
        .map(|p| p.gross_margin)
        .filter(|m| m.is_finite())
        .fold((0.0, 0usize), |(s, n), m| (s + m, n + 1));

    RunSummary {
        distinct_items,
        pair_count: pairs.len(),
        mean_gross_margin: (count > 0).then(|| sum / count as f64),
    }
}
