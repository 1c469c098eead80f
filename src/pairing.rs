use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::DOMESTIC_COUNTRY;
use crate::types::{MarketRecord, Pair};

/// Inner-joins the buy-country records with the sell-country records on ASIN.
///
/// Every buy record is paired with every sell record for the same item, so
/// N buy countries x M sell countries yield up to N*M pairs per item. Items
/// missing from either side produce nothing. Output follows buy-side order,
/// then sell-side order.
pub fn build_pairs(
    records: &[MarketRecord],
    buy_countries: &[String],
    sell_countries: &[String],
) -> Vec<Pair> {
    let in_set = |record: &MarketRecord, set: &[String]| {
        record
            .country_code()
            .map(|c| set.iter().any(|s| s.eq_ignore_ascii_case(c)))
            .unwrap_or(false)
    };

    let mut sell_by_item: HashMap<&str, Vec<&MarketRecord>> = HashMap::new();
    for record in records.iter().filter(|r| in_set(r, sell_countries)) {
        sell_by_item.entry(record.asin.as_str()).or_default().push(record);
    }

    let mut pairs = Vec::new();
    let mut unmatched = 0usize;
    for buy in records.iter().filter(|r| in_set(r, buy_countries)) {
        let Some(sells) = sell_by_item.get(buy.asin.as_str()) else {
            unmatched += 1;
            continue;
        };
        pairs.extend(sells.iter().map(|sell| Pair {
            buy: buy.clone(),
            sell: (*sell).clone(),
        }));
    }

    debug!(
        pairs = pairs.len(),
        unmatched_buy_records = unmatched,
        "[PAIRING] built {} pairs, {} buy records had no sell-side match",
        pairs.len(),
        unmatched,
    );
    pairs
}

/// Sorted, distinct country codes present in the records.
pub fn countries(records: &[MarketRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.country_code())
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Market selection used when the caller names none: buy everywhere except
/// the domestic market, sell domestically.
pub fn default_selection(countries: &[String]) -> (Vec<String>, Vec<String>) {
    let foreign: Vec<String> = countries
        .iter()
        .filter(|c| !c.eq_ignore_ascii_case(DOMESTIC_COUNTRY))
        .cloned()
        .collect();
    let buy = if foreign.is_empty() {
        countries.to_vec()
    } else {
        foreign
    };

    let sell = if countries.iter().any(|c| c.eq_ignore_ascii_case(DOMESTIC_COUNTRY)) {
        vec![DOMESTIC_COUNTRY.to_string()]
    } else {
        countries.iter().take(1).cloned().collect()
    };

    (buy, sell)
}
