//! Market structure assembly.
//!
//! Turns a whole metadata snapshot into ladder groups: one group per
//! `(symbol, settlement-time)`, children sorted and de-overlapped, parents
//! anchored, coverage computed. Runs off the hot path; the result is handed
//! to the engine as an atomic swap.

use crate::domain::{
    parse_interval, MarketDescriptor, MarketKind, MarketRecord, MarketRole,
};
use crate::structure::group::{compute_coverage, derive_step, RangeGroup};
use crate::structure::overrides::OverrideTable;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Settlement key for markets without any end time
const NO_SETTLEMENT: &str = "tba";

/// Build diagnostics, logged once per rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub markets_seen: usize,
    /// Inactive, expired, or missing token ids
    pub markets_skipped: usize,
    pub overrides_applied: usize,
    pub override_errors: usize,
    pub overlaps_dropped: usize,
    pub unmatched: usize,
    pub groups: usize,
}

pub struct StructureBuilder {
    overrides: OverrideTable,
}

impl Default for StructureBuilder {
    fn default() -> Self {
        Self::new(OverrideTable::default())
    }
}

impl StructureBuilder {
    pub fn new(overrides: OverrideTable) -> Self {
        Self { overrides }
    }

    /// Assemble groups from a metadata snapshot. Never fails as a whole:
    /// individual markets that cannot be placed end up in `unmatched`.
    pub fn build(
        &self,
        records: &[MarketRecord],
        now: DateTime<Utc>,
    ) -> (Vec<RangeGroup>, BuildReport) {
        let mut report = BuildReport {
            markets_seen: records.len(),
            ..BuildReport::default()
        };

        // group key -> (members, step override)
        let mut buckets: BTreeMap<String, (Vec<Classified>, Option<Decimal>)> = BTreeMap::new();

        for record in records {
            let Some(classified) = self.classify(record, now, &mut report) else {
                continue;
            };
            let entry = buckets
                .entry(classified.descriptor.settlement_group_key())
                .or_default();
            if entry.1.is_none() {
                entry.1 = classified.step_override;
            }
            entry.0.push(classified);
        }

        let mut groups = Vec::with_capacity(buckets.len());
        for (group_key, (members, step_override)) in buckets {
            let group = assemble_group(group_key, members, step_override, &mut report);
            if group.active_market_count() > 0 || !group.unmatched.is_empty() {
                groups.push(group);
            }
        }
        report.groups = groups.len();

        debug!(
            groups = report.groups,
            seen = report.markets_seen,
            skipped = report.markets_skipped,
            unmatched = report.unmatched,
            overrides = report.overrides_applied,
            "structure build complete"
        );
        (groups, report)
    }

    /// Parse and classify one market record. `None` means skipped entirely.
    fn classify(
        &self,
        record: &MarketRecord,
        now: DateTime<Utc>,
        report: &mut BuildReport,
    ) -> Option<Classified> {
        if !record.active {
            report.markets_skipped += 1;
            return None;
        }
        if record.settlement_time().is_some_and(|end| end <= now) {
            report.markets_skipped += 1;
            return None;
        }
        let (yes_token_id, no_token_id) = match record.token_pair() {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                report.markets_skipped += 1;
                return None;
            }
            Err(e) => {
                debug!(market = %record.market_id, error = %e, "skipping market");
                report.markets_skipped += 1;
                return None;
            }
        };

        let mut parsed = parse_interval(&record.question, &record.slug);
        let mut role_override = None;
        let mut symbol_override = None;
        let mut step_override = None;
        for rule in self.overrides.matching(&record.slug, &record.question) {
            match rule.apply_to(&mut parsed) {
                Ok(()) => report.overrides_applied += 1,
                Err(problem) => {
                    report.override_errors += 1;
                    warn!(market = %record.market_id, %problem, "override rejected");
                }
            }
            role_override = role_override.or(rule.role);
            symbol_override = symbol_override.or_else(|| rule.symbol.clone());
            step_override = step_override.or(rule.step);
        }

        let symbol = symbol_override
            .or_else(|| record.symbol_hint.clone())
            .or_else(|| record.event_ticker.clone())
            .or_else(|| record.event_slug.clone())
            .unwrap_or_else(|| record.slug.clone())
            .to_lowercase();

        let settlement_key = record
            .settlement_time()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| NO_SETTLEMENT.to_string());

        let descriptor = MarketDescriptor {
            market_id: record.market_id.clone(),
            slug: record.slug.clone(),
            question: record.question.clone(),
            yes_token_id,
            no_token_id,
            kind: parsed.kind,
            // provisional; settled per event bucket during assembly
            role: MarketRole::Child,
            label: parsed.label,
            symbol,
            settlement_key,
            event_slug: record.event_slug.clone(),
            neg_risk: record.neg_risk.unwrap_or(false),
        };
        Some(Classified {
            descriptor,
            role_override,
            step_override,
        })
    }
}

struct Classified {
    descriptor: MarketDescriptor,
    role_override: Option<MarketRole>,
    step_override: Option<Decimal>,
}

impl MarketDescriptor {
    fn settlement_group_key(&self) -> String {
        format!("{}-{}", self.symbol, self.settlement_key)
    }
}

/// Resolve roles, apply the common-anchor filter, sort, and compute coverage
/// for one group's members.
fn assemble_group(
    group_key: String,
    members: Vec<Classified>,
    step_override: Option<Decimal>,
    report: &mut BuildReport,
) -> RangeGroup {
    let (symbol, settlement_key) = members
        .first()
        .map(|m| {
            (
                m.descriptor.symbol.clone(),
                m.descriptor.settlement_key.clone(),
            )
        })
        .unwrap_or_default();

    // One event contributes either the open-ended parents or the bracketed
    // ranges; decide a uniform role per event bucket.
    let mut event_buckets: BTreeMap<String, Vec<Classified>> = BTreeMap::new();
    for member in members {
        let bucket = member
            .descriptor
            .event_slug
            .clone()
            .unwrap_or_else(|| member.descriptor.slug.clone());
        event_buckets.entry(bucket).or_default().push(member);
    }

    let mut parents: Vec<MarketDescriptor> = Vec::new();
    let mut children: Vec<MarketDescriptor> = Vec::new();
    let mut belows: Vec<MarketDescriptor> = Vec::new();
    let mut unmatched: Vec<MarketDescriptor> = Vec::new();

    for bucket in event_buckets.into_values() {
        let uniform_role = if bucket
            .iter()
            .all(|m| matches!(m.descriptor.kind, MarketKind::Above { .. }))
        {
            MarketRole::Parent
        } else {
            MarketRole::Child
        };
        for member in bucket {
            let mut descriptor = member.descriptor;
            descriptor.role = member.role_override.unwrap_or(uniform_role);
            match (descriptor.role, descriptor.kind) {
                (MarketRole::Parent, MarketKind::Above { .. }) => parents.push(descriptor),
                (MarketRole::Child, MarketKind::Range { .. }) => children.push(descriptor),
                (MarketRole::Child, MarketKind::Below { .. }) => belows.push(descriptor),
                _ => unmatched.push(descriptor),
            }
        }
    }

    // Common-anchor filter: an open-ended market whose boundary no bracket
    // shares cannot form a combination and must not enter the hot path. The
    // brackets themselves always stay; rungs between parent anchors are what
    // decompositions are made of.
    let parent_anchors: BTreeSet<Decimal> =
        parents.iter().flat_map(|p| p.kind.anchors()).collect();
    let child_anchors: BTreeSet<Decimal> = children
        .iter()
        .chain(belows.iter())
        .flat_map(|c| c.kind.anchors())
        .collect();

    retain_or_unmatch(&mut parents, &mut unmatched, |d| {
        d.kind
            .anchors()
            .iter()
            .any(|a| child_anchors.contains(a))
    });
    retain_or_unmatch(&mut belows, &mut unmatched, |d| {
        d.kind
            .anchors()
            .iter()
            .any(|a| parent_anchors.contains(a))
    });

    // Sort the ladder and drop overlapping brackets.
    children.sort_by(|a, b| {
        a.lower()
            .cmp(&b.lower())
            .then(a.upper().cmp(&b.upper()))
            .then(a.market_id.cmp(&b.market_id))
    });
    let mut ladder: Vec<MarketDescriptor> = Vec::with_capacity(children.len());
    for child in children {
        let overlaps = ladder
            .last()
            .and_then(|prev| prev.upper())
            .zip(child.lower())
            .is_some_and(|(prev_upper, lower)| lower < prev_upper);
        if overlaps {
            report.overlaps_dropped += 1;
            debug!(market = %child.market_id, group = %group_key, "dropping overlapping bracket");
            unmatched.push(child);
        } else {
            ladder.push(child);
        }
    }

    parents.sort_by(|a, b| a.lower().cmp(&b.lower()).then(a.market_id.cmp(&b.market_id)));
    belows.sort_by(|a, b| a.upper().cmp(&b.upper()).then(a.market_id.cmp(&b.market_id)));

    let step = step_override.or_else(|| derive_step(&ladder));
    let coverages = parents
        .iter()
        .map(|p| p.lower().and_then(|l| compute_coverage(&ladder, l)))
        .collect();

    report.unmatched += unmatched.len();

    RangeGroup {
        group_key,
        symbol,
        settlement_key,
        children: ladder,
        parents,
        coverages,
        belows,
        step,
        unmatched,
    }
}

fn retain_or_unmatch<F: Fn(&MarketDescriptor) -> bool>(
    kept: &mut Vec<MarketDescriptor>,
    unmatched: &mut Vec<MarketDescriptor>,
    keep: F,
) {
    let mut i = 0;
    while i < kept.len() {
        if keep(&kept[i]) {
            i += 1;
        } else {
            unmatched.push(kept.remove(i));
        }
    }
}
