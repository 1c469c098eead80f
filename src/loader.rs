//! CSV ingestion for Keepa-style marketplace exports.
//!
//! Headers are folded onto the record's field names, every cell is coerced
//! with the tolerant parsers, and files are concatenated with duplicate
//! `(asin, country)` rows dropped.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::parsing::{normalize_locale, parse_count, parse_fraction, parse_price};
use crate::types::{Columns, Flag, MarketRecord};

/// Export header (lowercased, single-spaced) to record field name.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("locale", "locale"),
    ("title", "title"),
    ("asin", "asin"),
    ("sales rank: current", "sales_rank_current"),
    ("sales rank: drops last 30 days", "sales_rank_drops_30d"),
    ("sales rank: drops last 90 days", "sales_rank_drops_90d"),
    ("bought in past month", "bought_past_month"),
    ("reviews: rating", "reviews_rating"),
    ("reviews: rating count", "reviews_count"),
    ("reviews: rating count - 90 days avg.", "reviews_90d_avg"),
    ("buy box 🚚: current", "buybox_current"),
    ("buy box 🚚: 30 days avg.", "buybox_30d_avg"),
    ("buy box 🚚: 90 days avg.", "buybox_90d_avg"),
    ("buy box 🚚: 90 days oos", "buybox_90d_oos"),
    ("buy box: % amazon 90 days", "buybox_pct_amz_90d"),
    ("buy box: winner count 90 days", "buybox_winner_cnt_90d"),
    ("buy box: standard deviation 30 days", "buybox_std_30d"),
    ("buy box: standard deviation 90 days", "buybox_std_90d"),
    ("buy box: flipability 30 days", "flipability_30d"),
    ("buy box: flipability 90 days", "flipability_90d"),
    ("competitive price threshold", "competitive_price_threshold"),
    ("suggested lower price", "suggested_lower_price"),
    ("amazon: current", "amazon_current"),
    ("amazon: 90 days oos", "amazon_90d_oos"),
    ("amazon: oos count 30 days", "amazon_oos_cnt_30d"),
    ("amazon: availability of the amazon offer", "amazon_offer_availability"),
    ("amazon: amazon offer shipping delay", "amazon_offer_shipping_delay"),
    ("new: current", "new_current"),
    ("fba pick&pack fee", "fba_pickpack_fee"),
    ("referral fee %", "referral_fee_pct"),
    ("referral fee based on current buy box price", "referral_fee_on_bb"),
    ("prime eligible (buy box)", "prime_eligible"),
    ("map restriction", "map_restriction"),
    ("total offer count", "total_offer_count"),
    ("new offer count: current", "new_offer_count_current"),
    ("list price: current", "list_price_current"),
    ("package: dimension (cm³)", "package_volume_cm3"),
    ("package: weight (g)", "package_weight_g"),
    ("item: weight (g)", "item_weight_g"),
    ("one time coupon: absolute", "coupon_abs"),
    ("one time coupon: percentage", "coupon_pct"),
    ("business discount: percentage", "business_discount_pct"),
    ("return rate", "return_rate"),
];

/// Trims, lowercases and collapses whitespace, then maps through the alias
/// table. Unknown headers become snake_case.
pub fn normalize_header(header: &str) -> String {
    let folded = header
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(raw, _)| *raw == folded)
        .map(|(_, field)| field.to_string())
        .unwrap_or_else(|| folded.replace(' ', "_"))
}

#[derive(Debug, Clone, Copy)]
enum Coercion {
    Price,
    Fraction,
    Count,
}

impl Coercion {
    fn apply(self, raw: &str) -> Option<f64> {
        match self {
            Coercion::Price => Some(parse_price(raw)).filter(|v| v.is_finite()),
            Coercion::Fraction => Some(parse_fraction(raw)).filter(|v| v.is_finite()),
            Coercion::Count => parse_count(raw),
        }
    }
}

fn numeric_slot<'a>(r: &'a mut MarketRecord, field: &str) -> Option<(&'a mut Option<f64>, Coercion)> {
    use Coercion::*;
    let slot = match field {
        "buybox_current" => (&mut r.buybox_current, Price),
        "new_current" => (&mut r.new_current, Price),
        "buybox_30d_avg" => (&mut r.buybox_30d_avg, Price),
        "buybox_90d_avg" => (&mut r.buybox_90d_avg, Price),
        "amazon_current" => (&mut r.amazon_current, Price),
        "list_price_current" => (&mut r.list_price_current, Price),
        "competitive_price_threshold" => (&mut r.competitive_price_threshold, Price),
        "suggested_lower_price" => (&mut r.suggested_lower_price, Price),
        "buybox_std_30d" => (&mut r.buybox_std_30d, Price),
        "buybox_std_90d" => (&mut r.buybox_std_90d, Price),
        "referral_fee_on_bb" => (&mut r.referral_fee_on_bb, Price),
        "fba_pickpack_fee" => (&mut r.fba_pickpack_fee, Price),
        "coupon_abs" => (&mut r.coupon_abs, Price),
        "reviews_rating" => (&mut r.reviews_rating, Price),
        "reviews_count" => (&mut r.reviews_count, Price),
        "reviews_90d_avg" => (&mut r.reviews_90d_avg, Price),
        "flipability_30d" => (&mut r.flipability_30d, Price),
        "flipability_90d" => (&mut r.flipability_90d, Price),
        "amazon_90d_oos" => (&mut r.amazon_90d_oos, Price),
        "amazon_oos_cnt_30d" => (&mut r.amazon_oos_cnt_30d, Price),
        "buybox_pct_amz_90d" => (&mut r.buybox_pct_amz_90d, Fraction),
        "referral_fee_pct" => (&mut r.referral_fee_pct, Fraction),
        "coupon_pct" => (&mut r.coupon_pct, Fraction),
        "business_discount_pct" => (&mut r.business_discount_pct, Fraction),
        "return_rate" => (&mut r.return_rate, Fraction),
        "sales_rank_current" => (&mut r.sales_rank_current, Count),
        "sales_rank_drops_30d" => (&mut r.sales_rank_drops_30d, Count),
        "sales_rank_drops_90d" => (&mut r.sales_rank_drops_90d, Count),
        "bought_past_month" => (&mut r.bought_past_month, Count),
        "buybox_90d_oos" => (&mut r.buybox_90d_oos, Count),
        "buybox_winner_cnt_90d" => (&mut r.buybox_winner_cnt_90d, Count),
        "total_offer_count" => (&mut r.total_offer_count, Count),
        "new_offer_count_current" => (&mut r.new_offer_count_current, Count),
        "package_volume_cm3" => (&mut r.package_volume_cm3, Count),
        "package_weight_g" => (&mut r.package_weight_g, Count),
        "item_weight_g" => (&mut r.item_weight_g, Count),
        _ => return None,
    };
    Some(slot)
}

fn non_empty(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn record_from_row(fields: &[String], row: &csv::StringRecord) -> MarketRecord {
    let mut record = MarketRecord::default();
    let mut locale = None;

    for (field, raw) in fields.iter().zip(row.iter()) {
        match field.as_str() {
            "asin" => record.asin = raw.trim().to_string(),
            "country" => record.country = non_empty(raw).map(|c| c.to_uppercase()),
            "locale" => locale = normalize_locale(raw),
            "title" => record.title = non_empty(raw),
            "amazon_offer_availability" => record.amazon_offer_availability = non_empty(raw),
            "amazon_offer_shipping_delay" => record.amazon_offer_shipping_delay = non_empty(raw),
            "prime_eligible" => record.prime_eligible = Flag(non_empty(raw)),
            "map_restriction" => record.map_restriction = Flag(non_empty(raw)),
            other => {
                if let Some((slot, coercion)) = numeric_slot(&mut record, other) {
                    *slot = coercion.apply(raw);
                }
            }
        }
    }

    if record.country.is_none() {
        record.country = locale;
    }
    record
}

/// Loaded rows plus every column their headers declared.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub records: Vec<MarketRecord>,
    pub columns: Columns,
}

/// Reads one export. A missing `asin` header is fatal; bad cells are not.
pub fn load_csv<R: io::Read>(reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let fields: Vec<String> = rdr.headers()?.iter().map(normalize_header).collect();
    if !fields.iter().any(|f| f == "asin") {
        return Err(AppError::MissingColumn("asin".to_string()));
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in rdr.records() {
        let record = record_from_row(&fields, &row?);
        if record.asin.is_empty() {
            skipped += 1;
            continue;
        }
        records.push(record);
    }

    if skipped > 0 {
        debug!(skipped, "[LOADER] skipped {skipped} rows without an ASIN");
    }
    Ok(Table {
        columns: fields.into_iter().collect(),
        records,
    })
}

/// Loads and concatenates several exports, keeping the first row seen for
/// each `(asin, country)`. Declared columns are the union over all files.
pub fn load_many<P: AsRef<Path>>(paths: &[P]) -> Result<Table> {
    let mut records = Vec::new();
    let mut columns = Columns::default();
    for path in paths {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let table = load_csv(file)?;
        info!(
            file = %path.display(),
            rows = table.records.len(),
            "[LOADER] loaded {} rows from {}",
            table.records.len(),
            path.display(),
        );
        records.extend(table.records);
        columns.extend(table.columns.iter().map(str::to_string));
    }
    Ok(Table {
        records: dedupe(records),
        columns,
    })
}

pub fn dedupe(records: Vec<MarketRecord>) -> Vec<MarketRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.asin.clone(), r.country.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_fold_onto_fields() {
        assert_eq!(normalize_header("  Sales Rank:   Current "), "sales_rank_current");
        assert_eq!(normalize_header("Buy Box 🚚: Current"), "buybox_current");
        assert_eq!(normalize_header("\u{feff}ASIN"), "asin");
        assert_eq!(normalize_header("Some Other Column"), "some_other_column");
    }

    #[test]
    fn rows_are_coerced_per_column() {
        let data = "\
ASIN,Locale,Buy Box 🚚: Current,Referral Fee %,Sales Rank: Current,MAP restriction,Title
B001,amazon.de,\"1.234,56 €\",15 %,4321,yes,Widget
B002,it,garbage,,foo,no,
";
        let table = load_csv(data.as_bytes()).unwrap();
        let records = &table.records;
        assert_eq!(records.len(), 2);
        assert!(table.columns.contains(Columns::SELL_PRICE));
        assert!(table.columns.contains("referral_fee_pct"));

        let first = &records[0];
        assert_eq!(first.asin, "B001");
        assert_eq!(first.country.as_deref(), Some("DE"));
        assert_eq!(first.buybox_current, Some(1234.56));
        assert!((first.referral_fee_pct.unwrap() - 0.15).abs() < 1e-12);
        assert_eq!(first.sales_rank_current, Some(4321.0));
        assert!(first.map_restriction.is_set());
        assert_eq!(first.title.as_deref(), Some("Widget"));

        let second = &records[1];
        assert_eq!(second.country.as_deref(), Some("IT"));
        assert_eq!(second.buybox_current, None);
        assert_eq!(second.referral_fee_pct, None);
        assert_eq!(second.sales_rank_current, None);
        assert!(!second.map_restriction.is_set());
        assert_eq!(second.title, None);
    }

    #[test]
    fn explicit_country_wins_over_locale() {
        let data = "asin,country,locale\nB001,fr,amazon.de\n";
        let table = load_csv(data.as_bytes()).unwrap();
        assert_eq!(table.records[0].country.as_deref(), Some("FR"));
        assert!(!table.columns.contains(Columns::SELL_PRICE));
    }

    #[test]
    fn empty_price_column_is_still_declared() {
        let data = "asin,country,buybox_current\nA,DE,20\nA,IT,\n";
        let table = load_csv(data.as_bytes()).unwrap();
        assert!(table.columns.contains(Columns::SELL_PRICE));
        assert_eq!(table.records[1].buybox_current, None);
    }

    #[test]
    fn missing_asin_header_is_fatal() {
        let err = load_csv("title,locale\nx,de\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::MissingColumn(c) if c == "asin"));
    }

    #[test]
    fn dedupe_keeps_first_per_market() {
        let mut first = MarketRecord::new("A", "DE");
        first.buybox_current = Some(1.0);
        let mut dup = MarketRecord::new("A", "DE");
        dup.buybox_current = Some(2.0);
        let other = MarketRecord::new("A", "IT");
        let out = dedupe(vec![first, dup, other]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].buybox_current, Some(1.0));
    }
}
