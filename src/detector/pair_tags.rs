//! Short market tags for the sell side of a pair, shown next to the badges.

use crate::types::MarketRecord;

/// Tags in fixed order, joined by a single space. Empty when none apply.
pub fn pair_tags(sell: &MarketRecord) -> String {
    let no_amazon = sell
        .amazon_offer_availability
        .as_deref()
        .map(|s| s.to_lowercase().contains("no amazon offer"))
        .unwrap_or(false);
    let oos_90d = sell.amazon_90d_oos.unwrap_or(0.0) > 10.0;
    let low_amazon_share = sell.buybox_pct_amz_90d.unwrap_or(0.0) < 0.2;
    let few_sellers = sell.total_offer_count.unwrap_or(0.0) <= 8.0;

    [
        (no_amazon, "No Amazon"),
        (oos_90d, "OOS90"),
        (low_amazon_share, "Low%AMZ"),
        (few_sellers, "FewSellers"),
    ]
    .into_iter()
    .filter_map(|(on, tag)| on.then_some(tag))
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tags() {
        let mut sell = MarketRecord::new("A1", "IT");
        sell.amazon_offer_availability = Some("no amazon offer".into());
        sell.amazon_90d_oos = Some(11.0);
        sell.buybox_pct_amz_90d = Some(0.1);
        sell.total_offer_count = Some(8.0);
        assert_eq!(pair_tags(&sell), "No Amazon OOS90 Low%AMZ FewSellers");
    }

    #[test]
    fn none_apply() {
        let mut sell = MarketRecord::new("A2", "IT");
        sell.amazon_90d_oos = Some(5.0);
        sell.buybox_pct_amz_90d = Some(0.5);
        sell.total_offer_count = Some(12.0);
        assert_eq!(pair_tags(&sell), "");
    }

    #[test]
    fn missing_signals_read_as_zero() {
        let sell = MarketRecord::new("A3", "IT");
        assert_eq!(pair_tags(&sell), "Low%AMZ FewSellers");
    }
}
