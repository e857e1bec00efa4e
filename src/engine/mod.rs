//! The arbitrage detection engine.
//!
//! Single-threaded cooperative core: every entry point takes `&mut self`,
//! nothing blocks, nothing spawns. Upstream ingestion marshals events onto
//! `on_update` in arrival order; structure rebuilds arrive prepared and are
//! swapped in one assignment. Computation per update is proportional to the
//! combinations the updated token participates in, never to the universe of
//! markets.

pub mod dirty;
pub mod locator;
pub mod pair_eval;
pub mod range_eval;
pub mod state;
pub mod triangle_eval;

pub use dirty::DirtyFilter;
pub use locator::{Locators, PairRef, TokenLocator, TriangleRef};
pub use state::{BinaryPair, GroupState, PairKind, PairLeg, PairMarket, Triangle, TriangleLeg};

use crate::config::EngineConfig;
use crate::domain::{MarketRole, Opportunity, TopOfBookUpdate};
use crate::structure::RangeGroup;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Hot-path counters, readable at any time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub updates_seen: u64,
    pub updates_accepted: u64,
    pub updates_dropped: u64,
    /// Range evaluator invocations (one per re-evaluated lower parent)
    pub range_evals: u64,
    pub triangle_evals: u64,
    pub pair_evals: u64,
    pub emitted: u64,
    pub suppressed_cooldown: u64,
    /// Opportunities dropped because the consumer was full
    pub dropped_full_stream: u64,
}

/// Process-scoped engine instance. Owns all group state and locator tables;
/// external collaborators observe through the opportunity stream only.
pub struct ArbEngine {
    config: EngineConfig,
    groups: HashMap<String, GroupState>,
    locators: Locators,
    dirty: DirtyFilter,
    tx: mpsc::Sender<Opportunity>,
    stats: EngineStats,
}

impl ArbEngine {
    /// Build an engine and the receiving end of its opportunity stream.
    pub fn new(config: EngineConfig) -> (Self, mpsc::Receiver<Opportunity>) {
        let (tx, rx) = mpsc::channel(config.opportunity_capacity.max(1));
        (
            Self {
                config,
                groups: HashMap::new(),
                locators: Locators::new(),
                dirty: DirtyFilter::new(),
                tx,
                stats: EngineStats::default(),
            },
            rx,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn group(&self, group_key: &str) -> Option<&GroupState> {
        self.groups.get(group_key)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Swap in a freshly built group set. All locator tables are rebuilt;
    /// book state and cooldowns start empty, to be refilled by the stream.
    pub fn on_structure_changed(&mut self, groups: Vec<RangeGroup>) {
        let mut states = HashMap::with_capacity(groups.len());
        let mut locators = Locators::new();
        for group in groups {
            let state = GroupState::new(group, self.config.binary_pairs_enabled);
            locators.add_group(&state);
            states.insert(state.group.group_key.clone(), state);
        }
        self.groups = states;
        self.locators = locators;
        info!(groups = self.groups.len(), "market structure swapped");
    }

    /// Purge expired groups together with their locator entries, cooldowns
    /// and combinations.
    pub fn on_groups_expired(&mut self, group_keys: &[String]) {
        for key in group_keys {
            if let Some(state) = self.groups.remove(key) {
                self.locators.remove_group(&state);
                debug!(group = %key, "group purged");
            }
        }
    }

    /// Route one price event and re-evaluate exactly the combinations it
    /// touches. All fan-out completes before the call returns.
    pub fn on_update(&mut self, update: &TopOfBookUpdate) {
        self.stats.updates_seen += 1;
        if !self.dirty.admit(update) {
            self.stats.updates_dropped += 1;
            trace!(asset = %update.asset_id, "update dropped by dirty filter");
            return;
        }
        self.stats.updates_accepted += 1;

        // Triangle legs fed by this asset id
        let triangle_refs: Vec<TriangleRef> = self
            .locators
            .triangle_tokens
            .get(&update.asset_id)
            .cloned()
            .unwrap_or_default();
        for r in &triangle_refs {
            if let Some(state) = self.groups.get_mut(&r.group_key) {
                if let Some(triangle) = state.triangles.get_mut(r.triangle) {
                    triangle.apply(r.leg, update);
                }
            }
        }

        // Pair legs fed by this asset id
        let pair_refs: Vec<PairRef> = self
            .locators
            .pair_tokens
            .get(&update.asset_id)
            .cloned()
            .unwrap_or_default();
        for r in &pair_refs {
            if let Some(state) = self.groups.get_mut(&r.group_key) {
                if let Some(pair) = state.pairs.get_mut(r.pair) {
                    pair.apply(r.leg, update);
                }
            }
        }

        // Direct book slot
        let direct = self
            .locators
            .resolve(
                &update.asset_id,
                update.market_slug.as_deref(),
                update.market_id.as_deref(),
            )
            .cloned();
        if let Some(found) = direct {
            self.route_direct(&found, update);
        }

        self.evaluate_triangles(&triangle_refs, update.timestamp_ms);
        self.evaluate_pairs(&pair_refs, update.timestamp_ms);
    }

    /// Write the direct slot and re-evaluate the parents whose windows the
    /// slot participates in.
    fn route_direct(&mut self, found: &TokenLocator, update: &TopOfBookUpdate) {
        let config = &self.config;
        let stats = &mut self.stats;
        let tx = &self.tx;
        let Some(state) = self.groups.get_mut(&found.group_key) else {
            return;
        };

        let lowers: Vec<usize> = match found.role {
            MarketRole::Child => {
                state.set_child_quote(found.index, update);
                state.child_to_parents[found.index].clone()
            }
            MarketRole::Parent => {
                state.set_parent_quote(found.index, update);
                let mut lowers = vec![found.index];
                lowers.extend_from_slice(&state.upper_to_lowers[found.index]);
                lowers
            }
        };

        for lower in lowers {
            stats.range_evals += 1;
            let Some(candidate) = range_eval::evaluate_parent_lower(config, state, lower) else {
                continue;
            };
            let key = range_eval::emit_key(state, &candidate);
            if !state.cooldown_passed(&key, update.timestamp_ms, config.cooldown_ms) {
                stats.suppressed_cooldown += 1;
                continue;
            }
            let opportunity = range_eval::materialize(state, &candidate, update.timestamp_ms);
            send(tx, stats, opportunity);
        }
    }

    /// Re-evaluate the affected triangles; at most the single best passing
    /// combination per group goes out per cycle.
    fn evaluate_triangles(&mut self, refs: &[TriangleRef], ts_ms: i64) {
        if refs.is_empty() {
            return;
        }
        let config = &self.config;
        let stats = &mut self.stats;
        let tx = &self.tx;

        let mut by_group: HashMap<&str, Vec<usize>> = HashMap::new();
        for r in refs {
            let slots = by_group.entry(r.group_key.as_str()).or_default();
            if !slots.contains(&r.triangle) {
                slots.push(r.triangle);
            }
        }

        for (group_key, triangles) in by_group {
            let Some(state) = self.groups.get_mut(group_key) else {
                continue;
            };
            let mut best: Option<triangle_eval::TriangleCandidate> = None;
            for index in triangles {
                stats.triangle_evals += 1;
                if let Some(candidate) = triangle_eval::evaluate_triangle(config, state, index) {
                    if best.map_or(true, |b| candidate.profit_abs > b.profit_abs) {
                        best = Some(candidate);
                    }
                }
            }
            let Some(candidate) = best else {
                continue;
            };
            let key = triangle_eval::emit_key(state, &candidate);
            if !state.cooldown_passed(&key, ts_ms, config.cooldown_ms) {
                stats.suppressed_cooldown += 1;
                continue;
            }
            let opportunity = triangle_eval::materialize(state, &candidate, ts_ms);
            send(tx, stats, opportunity);
        }
    }

    /// Re-evaluate the affected pairs; each passing direction goes out under
    /// its own cooldown key.
    fn evaluate_pairs(&mut self, refs: &[PairRef], ts_ms: i64) {
        if refs.is_empty() || !self.config.binary_pairs_enabled {
            return;
        }
        let config = &self.config;
        let stats = &mut self.stats;
        let tx = &self.tx;

        let mut seen: Vec<(&str, usize)> = Vec::new();
        for r in refs {
            let slot = (r.group_key.as_str(), r.pair);
            if seen.contains(&slot) {
                continue;
            }
            seen.push(slot);
            let Some(state) = self.groups.get_mut(r.group_key.as_str()) else {
                continue;
            };
            stats.pair_evals += 1;
            for candidate in pair_eval::evaluate_pair(config, state, r.pair) {
                let key = pair_eval::emit_key(state, &candidate);
                if !state.cooldown_passed(&key, ts_ms, config.cooldown_ms) {
                    stats.suppressed_cooldown += 1;
                    continue;
                }
                let opportunity = pair_eval::materialize(state, &candidate, ts_ms);
                send(tx, stats, opportunity);
            }
        }
    }
}

/// Best-effort delivery: a full consumer drops the opportunity instead of
/// buffering without bound.
fn send(tx: &mpsc::Sender<Opportunity>, stats: &mut EngineStats, opportunity: Opportunity) {
    debug!(
        strategy = %opportunity.strategy,
        group = %opportunity.group_key,
        profit_abs = %opportunity.profit_abs,
        profit_bps = %opportunity.profit_bps,
        "opportunity"
    );
    match tx.try_send(opportunity) {
        Ok(()) => stats.emitted += 1,
        Err(_) => stats.dropped_full_stream += 1,
    }
}
