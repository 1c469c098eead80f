//! VAT-, discount- and fee-aware netting of a buy/sell pair.

use serde::Serialize;

use crate::config::DOMESTIC_COUNTRY;
use crate::error::{AppError, Result};
use crate::parsing::scale_fraction;
use crate::types::{clamp_unit, Columns, NettingConfig, Pair, ShipMode};

/// Netted figures for one pair. NaN marks a value that could not be derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Netting {
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
}

/// Net purchase cost of a gross price `price`.
///
/// Domestic purchases take the discount off the gross amount after VAT is
/// removed; cross-border purchases discount the VAT-exclusive amount. The two
/// formulas differ for any non-zero discount and both are intentional.
pub fn net_cost_purchase(price: f64, vat: f64, discount: f64, country: Option<&str>) -> f64 {
    if price.is_nan() {
        return f64::NAN;
    }
    let vat = clamp_unit(vat);
    let discount = clamp_unit(discount);
    let ex_vat = price / (1.0 + vat);
    let domestic = country
        .map(|c| c.trim().eq_ignore_ascii_case(DOMESTIC_COUNTRY))
        .unwrap_or(false);

    if domestic {
        ex_vat - price * discount
    } else {
        ex_vat * (1.0 - discount)
    }
}

/// Referral percentages above 1 are taken to be on a 0-100 scale.
pub fn referral_fraction(pct: f64) -> f64 {
    scale_fraction(pct)
}

/// Sell-side fee inputs taken from the sell record.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeInputs {
    pub referral_fixed: Option<f64>,
    pub referral_pct: Option<f64>,
    pub pick_pack: Option<f64>,
}

/// Total per-unit selling cost: referral + fulfillment + shipping + other.
pub fn estimate_fees(sell_price: f64, inputs: FeeInputs, cfg: &NettingConfig) -> f64 {
    let price = if sell_price.is_finite() { sell_price } else { 0.0 };

    let referral = match (inputs.referral_fixed, inputs.referral_pct) {
        (Some(fixed), _) => fixed,
        (None, Some(pct)) => price * referral_fraction(pct),
        (None, None) => price * cfg.referral_fee_fallback,
    };

    let fulfillment = match cfg.ship_mode {
        ShipMode::Fba => inputs.pick_pack.unwrap_or(cfg.fulfillment_fee_fallback),
        ShipMode::Fbm => cfg.fbm_flat_shipping,
    };

    referral + fulfillment + cfg.shipping_per_unit + cfg.other_costs_sell
}

/// Gross sale price with VAT and fees removed.
pub fn net_proceeds_sale(sell_price: f64, vat_sell: f64, fees: f64) -> f64 {
    sell_price / (1.0 + clamp_unit(vat_sell)) - fees
}

/// `gross_margin / net_cost`, NaN when the cost is zero or unknown.
pub fn margin_ratio(gross_margin: f64, net_cost: f64) -> f64 {
    if net_cost == 0.0 || net_cost.is_nan() {
        f64::NAN
    } else {
        gross_margin / net_cost
    }
}

/// Nets one pair. Buy price prefers the new-offer price over the buy box.
pub fn compute_margins(pair: &Pair, cfg: &NettingConfig) -> Netting {
    let buy_country = pair.buy.country_code();
    let sell_country = pair.sell.country_code();

    let buy_price = pair
        .buy
        .new_current
        .or(pair.buy.buybox_current)
        .unwrap_or(f64::NAN);
    let sell_price = pair.sell.buybox_current.unwrap_or(f64::NAN);

    let vat_buy = cfg.vat_for(buy_country);
    let vat_sell = cfg.vat_for(sell_country);
    let discount_buy = cfg.discount_for(buy_country);

    let fees = estimate_fees(
        sell_price,
        FeeInputs {
            referral_fixed: pair.sell.referral_fee_on_bb,
            referral_pct: pair.sell.referral_fee_pct,
            pick_pack: pair.sell.fba_pickpack_fee,
        },
        cfg,
    );

    let net_cost = net_cost_purchase(buy_price, vat_buy, discount_buy, buy_country);
    let net_proceeds = net_proceeds_sale(sell_price, vat_sell, fees);
    let gross_margin = net_proceeds - net_cost;

    Netting {
        buy_price,
        sell_price,
        vat_buy,
        vat_sell,
        discount_buy,
        fees,
        net_cost_purchase: net_cost,
        net_proceeds_sale: net_proceeds,
        gross_margin,
        margin_pct: margin_ratio(gross_margin, net_cost),
    }
}

/// The sell price column is the one signal the engine cannot default. Only
/// its absence is fatal; empty cells net to NaN downstream.
pub fn ensure_sell_price(columns: &Columns) -> Result<()> {
    if columns.contains(Columns::SELL_PRICE) {
        return Ok(());
    }
    Err(AppError::MissingColumn(format!(
        "{} (sell-side price) is absent from the sell dataset",
        Columns::SELL_PRICE
    )))
}
