//! End-to-end engine scenarios: structure snapshot in, price events in,
//! opportunities out.

use chrono::{DateTime, TimeZone, Utc};
use ladderarb::{
    ArbEngine, EngineConfig, MarketRecord, Strategy, StructureBuilder, TopOfBookUpdate,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

const GROUP_KEY: &str = "btc-2026-03-07T12:00:00.000Z";

fn record(market_id: &str, slug: &str, question: &str, event_slug: &str) -> MarketRecord {
    MarketRecord {
        market_id: market_id.into(),
        slug: slug.into(),
        question: question.into(),
        clob_token_ids: Some(format!(r#"["{market_id}-yes","{market_id}-no"]"#)),
        active: true,
        end_date: Some(Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap()),
        event_slug: Some(event_slug.into()),
        event_ticker: None,
        event_end_date: None,
        symbol_hint: Some("btc".into()),
        neg_risk: Some(true),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

/// Children [80,82) [82,84) [84,86) plus parents >=80 and >=86.
fn ladder_snapshot() -> Vec<MarketRecord> {
    vec![
        record("c1", "btc-80-82", "Will BTC be between 80k and 82k?", "btc-ranges"),
        record("c2", "btc-82-84", "Will BTC be between 82k and 84k?", "btc-ranges"),
        record("c3", "btc-84-86", "Will BTC be between 84k and 86k?", "btc-ranges"),
        record("p80", "btc-above-80", "Will BTC be above 80k?", "btc-levels"),
        record("p86", "btc-above-86", "Will BTC be above 86k?", "btc-levels"),
    ]
}

fn update(asset: &str, ts: i64, bid: Decimal, ask: Decimal) -> TopOfBookUpdate {
    TopOfBookUpdate {
        asset_id: asset.into(),
        market_id: None,
        market_slug: None,
        best_bid: bid,
        best_ask: ask,
        best_bid_size: None,
        best_ask_size: None,
        timestamp_ms: ts,
    }
}

fn engine_with(records: &[MarketRecord], config: EngineConfig) -> (ArbEngine, mpsc::Receiver<ladderarb::Opportunity>) {
    let (mut engine, rx) = ArbEngine::new(config);
    let (groups, _) = StructureBuilder::default().build(records, now());
    engine.on_structure_changed(groups);
    (engine, rx)
}

fn drain(rx: &mut mpsc::Receiver<ladderarb::Opportunity>) -> Vec<ladderarb::Opportunity> {
    let mut out = Vec::new();
    while let Ok(opportunity) = rx.try_recv() {
        out.push(opportunity);
    }
    out
}

/// Quote the ladder so the >=80 replica costs 1.10 against a 0.95 bid.
fn feed_borderline(engine: &mut ArbEngine, base_ts: i64) {
    for (i, asset) in ["c1-yes", "c2-yes", "c3-yes"].iter().enumerate() {
        engine.on_update(&update(asset, base_ts + i as i64, dec!(0.28), dec!(0.30)));
    }
    engine.on_update(&update("p86-yes", base_ts + 3, dec!(0.15), dec!(0.20)));
    engine.on_update(&update("p80-yes", base_ts + 4, dec!(0.95), dec!(1.00)));
}

#[test]
fn unbundling_emits_only_when_bid_clears_replica() {
    let (mut engine, mut rx) = engine_with(&ladder_snapshot(), EngineConfig::default());

    feed_borderline(&mut engine, 1_000);
    // 0.95 bid against a 0.30*3 + 0.20 replica: 0.15 under water
    assert!(drain(&mut rx).is_empty());

    engine.on_update(&update("p80-yes", 1_010, dec!(1.15), dec!(1.20)));
    let emitted = drain(&mut rx);
    assert_eq!(emitted.len(), 1);
    let opportunity = &emitted[0];
    assert_eq!(opportunity.strategy, Strategy::SellParentBuyChildren);
    assert_eq!(opportunity.group_key, GROUP_KEY);
    assert_eq!(opportunity.profit_abs, dec!(0.05));
    // 10_000 * 0.05 / 1.10
    assert!(opportunity.profit_bps > dec!(454) && opportunity.profit_bps < dec!(455));
    assert_eq!(opportunity.timestamp_ms, 1_010);
    assert_eq!(opportunity.leg_count(), 5);
}

#[test]
fn cooldown_suppresses_repeats_within_the_window() {
    let (mut engine, mut rx) = engine_with(&ladder_snapshot(), EngineConfig::default());
    feed_borderline(&mut engine, 1_000);
    engine.on_update(&update("p80-yes", 1_010, dec!(1.15), dec!(1.20)));

    // Wiggle the profitable bid five times inside the 1s cooldown window
    for (i, bid) in [dec!(1.16), dec!(1.15), dec!(1.16), dec!(1.15), dec!(1.16)]
        .into_iter()
        .enumerate()
    {
        engine.on_update(&update("p80-yes", 1_020 + i as i64 * 10, bid, dec!(1.20)));
    }
    assert_eq!(drain(&mut rx).len(), 1);
    assert_eq!(engine.stats().suppressed_cooldown, 5);

    // Past the window the same key emits again
    engine.on_update(&update("p80-yes", 2_500, dec!(1.15), dec!(1.20)));
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn missing_upper_ask_blocks_emission() {
    let (mut engine, mut rx) = engine_with(&ladder_snapshot(), EngineConfig::default());
    feed_borderline(&mut engine, 1_000);
    engine.on_update(&update("p80-yes", 1_010, dec!(1.15), dec!(1.20)));
    assert_eq!(drain(&mut rx).len(), 1);

    // Upper parent loses its ask: no quote means no executable replica
    engine.on_update(&update("p86-yes", 5_000, dec!(0.15), dec!(0)));
    engine.on_update(&update("p80-yes", 5_010, dec!(1.16), dec!(1.20)));
    assert!(drain(&mut rx).is_empty());

    // The quote coming back restores emission (well past cooldown)
    engine.on_update(&update("p86-yes", 9_000, dec!(0.15), dec!(0.20)));
    engine.on_update(&update("p80-yes", 9_010, dec!(1.15), dec!(1.20)));
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn triangle_buy_on_cheap_leg_set() {
    // Parents at 80 and 86 bridged by [80,83) and [83,86)
    let records = vec![
        record("c1", "btc-80-83", "Will BTC be between 80k and 83k?", "btc-ranges"),
        record("c2", "btc-83-86", "Will BTC be between 83k and 86k?", "btc-ranges"),
        record("p80", "btc-above-80", "Will BTC be above 80k?", "btc-levels"),
        record("p86", "btc-above-86", "Will BTC be above 86k?", "btc-levels"),
    ];
    let (mut engine, mut rx) = engine_with(&records, EngineConfig::default());

    engine.on_update(&update("p80-yes", 1_000, dec!(0.55), dec!(0.60)));
    engine.on_update(&update("c1-no", 1_001, dec!(0.05), dec!(0.10)));
    engine.on_update(&update("c2-no", 1_002, dec!(0.05), dec!(0.10)));
    assert!(drain(&mut rx).is_empty());

    engine.on_update(&update("p86-no", 1_003, dec!(0.10), dec!(0.15)));
    let emitted = drain(&mut rx);
    assert_eq!(emitted.len(), 1);
    let opportunity = &emitted[0];
    assert_eq!(opportunity.strategy, Strategy::TriangleBuy);
    // payout 3 against 0.60 + 0.15 + 0.10 + 0.10 of asks
    assert_eq!(opportunity.profit_abs, dec!(2.05));
    assert_eq!(opportunity.leg_count(), 4);
}

#[test]
fn uncovered_child_update_triggers_no_range_evaluation() {
    let mut records = ladder_snapshot();
    // A stray bracket above the top parent: on the ladder, in no coverage
    records.push(record("c9", "btc-90-92", "Will BTC be between 90k and 92k?", "btc-ranges"));
    let (mut engine, mut rx) = engine_with(&records, EngineConfig::default());

    feed_borderline(&mut engine, 1_000);
    let range_before = engine.stats().range_evals;
    let triangle_before = engine.stats().triangle_evals;

    engine.on_update(&update("c9-yes", 2_000, dec!(0.01), dec!(0.02)));
    assert_eq!(engine.stats().range_evals, range_before);
    assert_eq!(engine.stats().triangle_evals, triangle_before);
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn swapped_out_group_stops_emitting() {
    let mut records = ladder_snapshot();
    let eth = |id: &str, slug: &str, q: &str, ev: &str| {
        let mut r = record(id, slug, q, ev);
        r.symbol_hint = Some("eth".into());
        r
    };
    records.push(eth("e1", "eth-4000-4200", "Will ETH be between 4000 and 4200?", "eth-ranges"));
    records.push(eth("e2", "eth-above-4000", "Will ETH be above 4000?", "eth-levels"));
    records.push(eth("e3", "eth-above-4200", "Will ETH be above 4200?", "eth-levels"));

    let (mut engine, mut rx) = engine_with(&records, EngineConfig::default());
    assert_eq!(engine.group_count(), 2);

    feed_borderline(&mut engine, 1_000);
    engine.on_update(&update("p80-yes", 1_010, dec!(1.15), dec!(1.20)));
    assert_eq!(drain(&mut rx).len(), 1);

    // Rebuild without the btc group
    let eth_only: Vec<MarketRecord> = records
        .iter()
        .filter(|r| r.symbol_hint.as_deref() == Some("eth"))
        .cloned()
        .collect();
    let (groups, _) = StructureBuilder::default().build(&eth_only, now());
    engine.on_structure_changed(groups);
    assert_eq!(engine.group_count(), 1);

    // The dropped group's tokens no longer route anywhere
    feed_borderline(&mut engine, 10_000);
    engine.on_update(&update("p80-yes", 10_010, dec!(1.15), dec!(1.20)));
    let after_swap = drain(&mut rx);
    assert!(after_swap.iter().all(|o| o.group_key != GROUP_KEY));
    assert!(after_swap.is_empty());

    // While the surviving group still works end to end
    engine.on_update(&update("e1-yes", 11_000, dec!(0.28), dec!(0.30)));
    engine.on_update(&update("e3-yes", 11_001, dec!(0.15), dec!(0.20)));
    engine.on_update(&update("e2-yes", 11_002, dec!(0.70), dec!(0.75)));
    let eth_emitted = drain(&mut rx);
    assert_eq!(eth_emitted.len(), 1);
    // Selling >=4000 at 0.70 against the 0.30 + 0.20 replica
    assert_eq!(eth_emitted[0].strategy, Strategy::SellParentBuyChildren);
    assert_eq!(eth_emitted[0].profit_abs, dec!(0.20));
    assert!(eth_emitted[0].group_key.starts_with("eth-"));
}

#[test]
fn stale_and_unchanged_updates_never_reach_the_evaluators() {
    let (mut engine, _rx) = engine_with(&ladder_snapshot(), EngineConfig::default());
    feed_borderline(&mut engine, 1_000);
    let accepted = engine.stats().updates_accepted;

    // Same prices, later timestamp: dropped
    engine.on_update(&update("c1-yes", 2_000, dec!(0.28), dec!(0.30)));
    // Changed prices, stale timestamp: dropped
    engine.on_update(&update("c1-yes", 1_500, dec!(0.29), dec!(0.30)));
    assert_eq!(engine.stats().updates_accepted, accepted);
    assert_eq!(engine.stats().updates_dropped, 2);
}

#[test]
fn opportunity_stream_drops_when_consumer_is_full() {
    let config = EngineConfig {
        opportunity_capacity: 1,
        cooldown_ms: 0,
        ..EngineConfig::default()
    };
    let (mut engine, mut rx) = engine_with(&ladder_snapshot(), config);
    feed_borderline(&mut engine, 1_000);
    engine.on_update(&update("p80-yes", 1_010, dec!(1.15), dec!(1.20)));
    engine.on_update(&update("p80-yes", 1_020, dec!(1.16), dec!(1.20)));
    engine.on_update(&update("p80-yes", 1_030, dec!(1.15), dec!(1.20)));

    assert_eq!(engine.stats().emitted, 1);
    assert_eq!(engine.stats().dropped_full_stream, 2);
    assert_eq!(drain(&mut rx).len(), 1);
}
