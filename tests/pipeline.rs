use std::io::Write;

use resale_scanner::loader::{load_csv, load_many};
use resale_scanner::pairing::{countries, default_selection};
use resale_scanner::pipeline::{run, RunInput};
use resale_scanner::types::{NettingConfig, ScoreWeights, ShipMode};

const GERMANY: &str = "\
ASIN,Locale,Title,Buy Box 🚚: Current,Sales Rank: Current,Total Offer Count,Buy Box: % Amazon 90 days
B0WIDGET,amazon.de,Widget,\"20,00 €\",1500,4,5 %
B0GADGET,amazon.de,Gadget,\"48,00 €\",90000,25,60 %
B0ORPHAN,amazon.de,Orphan,\"10,00 €\",100,2,0 %
";

const ITALY: &str = "\
ASIN,Locale,Title,Buy Box 🚚: Current,Sales Rank: Current,Total Offer Count,Buy Box: % Amazon 90 days,Amazon: 90 days OOS,Amazon: Availability of the Amazon offer
B0WIDGET,amazon.it,Widget,\"60,00 €\",1200,3,5 %,30,no Amazon offer exists
B0GADGET,amazon.it,Gadget,\"50,00 €\",80000,30,70 %,0,In stock
";

fn write_temp(name: &str, body: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("resale-scanner-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn csv_exports_rank_end_to_end() {
    let de = write_temp("de.csv", GERMANY);
    let it = write_temp("it.csv", ITALY);
    let table = load_many(&[de, it]).unwrap();
    let records = &table.records;
    assert_eq!(records.len(), 5);

    let (buy, sell) = default_selection(&countries(records));
    assert_eq!(buy, vec!["DE".to_string()]);
    assert_eq!(sell, vec!["IT".to_string()]);

    let netting = NettingConfig::default();
    let weights = ScoreWeights::default();
    let out = run(RunInput {
        records,
        columns: &table.columns,
        buy_countries: &buy,
        sell_countries: &sell,
        netting: &netting,
        weights: &weights,
    })
    .unwrap();

    assert_eq!(out.summary.pair_count, 2);
    assert_eq!(out.summary.distinct_items, 2);
    assert!(out.pairs.iter().all(|p| p.item_key != "B0ORPHAN"));

    let top = &out.pairs[0];
    assert_eq!(top.item_key, "B0WIDGET");
    assert_eq!(top.title.as_deref(), Some("Widget"));
    assert!(top.gross_margin > 0.0);
    assert!(top.opportunity_score > out.pairs[1].opportunity_score);
    assert_eq!(top.pair_badges, "No Amazon OOS90 Low%AMZ FewSellers");
    assert!(top.badges.contains("Low Guarded Buybox"));

    let last = &out.pairs[1];
    assert!(last.gross_margin < 0.0);
    assert_eq!(last.pair_badges, "");
}

#[test]
fn duplicate_markets_keep_first_file() {
    let first = write_temp("first.csv", "asin,country,buybox_current\nA,IT,10\n");
    let second = write_temp("second.csv", "asin,country,buybox_current\nA,IT,99\nB,IT,5\n");
    let table = load_many(&[first, second]).unwrap();
    assert_eq!(table.records.len(), 2);
    assert_eq!(table.records[0].buybox_current, Some(10.0));
}

#[test]
fn fbm_mode_swaps_pick_pack_for_flat_shipping() {
    let data = "\
asin,country,buybox_current,fba_pickpack_fee
A,DE,20,3.5
A,IT,61,3.5
";
    let table = load_csv(data.as_bytes()).unwrap();
    let buy = vec!["DE".to_string()];
    let sell = vec!["IT".to_string()];
    let weights = ScoreWeights::default();

    let fee_for = |mode: ShipMode| {
        let netting = NettingConfig::default().with_ship_mode(mode);
        let out = run(RunInput {
            records: &table.records,
            columns: &table.columns,
            buy_countries: &buy,
            sell_countries: &sell,
            netting: &netting,
            weights: &weights,
        })
        .unwrap();
        out.pairs[0].fees
    };

    assert!((fee_for(ShipMode::Fba) - (61.0 * 0.15 + 3.5)).abs() < 1e-9);
    assert!((fee_for(ShipMode::Fbm) - (61.0 * 0.15 + 4.0)).abs() < 1e-9);
}

#[test]
fn sell_export_without_buy_box_still_ranks() {
    let data = "asin,country,buybox_current\nA,DE,20\nA,IT,\n";
    let table = load_csv(data.as_bytes()).unwrap();
    let out = run(RunInput {
        records: &table.records,
        columns: &table.columns,
        buy_countries: &["DE".to_string()],
        sell_countries: &["IT".to_string()],
        netting: &NettingConfig::default(),
        weights: &ScoreWeights::default(),
    })
    .unwrap();

    assert_eq!(out.summary.pair_count, 1);
    assert!(out.pairs[0].margin_pct.is_nan());
    assert!(out.pairs[0].gross_margin.is_nan());
}
