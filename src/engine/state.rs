//! Hot-path state for one ladder group.
//!
//! Everything the evaluators touch lives in dense arrays: child and parent
//! quotes, prefix sums over the ladder, triangle and pair leg quotes.
//! Cross-references are integer indices; the global locator tables point in
//! with `(group, role, index)` triples and never hold references.

use crate::domain::{LegSnapshot, MarketRole, TokenQuote, TopOfBookUpdate};
use crate::structure::RangeGroup;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A three-leg constant-payout combination: the lower parent's YES, the
/// upper parent's NO, and the NO of every bracket between their anchors.
/// Exactly `chain + 1` of the legs pay out, whatever the settlement value.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Parent indices into the group's `parents`
    pub lower: usize,
    pub upper: usize,
    /// Child indices, in ladder order
    pub chain: Vec<usize>,
    pub lower_yes: TokenQuote,
    pub upper_no: TokenQuote,
    /// Parallel to `chain`
    pub chain_no: Vec<TokenQuote>,
}

/// Which leg of a triangle an asset id feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleLeg {
    LowerYes,
    UpperNo,
    ChainNo(usize),
}

impl Triangle {
    pub fn payout(&self) -> Decimal {
        Decimal::from(self.chain.len() as u64 + 1)
    }

    pub fn apply(&mut self, leg: TriangleLeg, update: &TopOfBookUpdate) {
        match leg {
            TriangleLeg::LowerYes => self.lower_yes.apply(update),
            TriangleLeg::UpperNo => self.upper_no.apply(update),
            TriangleLeg::ChainNo(k) => {
                if let Some(quote) = self.chain_no.get_mut(k) {
                    quote.apply(update);
                }
            }
        }
    }

    fn legs(&self) -> impl Iterator<Item = &TokenQuote> {
        std::iter::once(&self.lower_yes)
            .chain(std::iter::once(&self.upper_no))
            .chain(self.chain_no.iter())
    }

    pub fn all_executable(&self) -> bool {
        self.legs().all(|q| q.is_executable())
    }

    pub fn total_ask(&self) -> Option<Decimal> {
        self.legs().map(|q| q.ask).sum()
    }

    pub fn total_bid(&self) -> Option<Decimal> {
        self.legs().map(|q| q.bid).sum()
    }
}

/// How a two-market pair is linked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// A below and an above sharing the anchor: YES of one is NO of the other
    Complement,
    /// Two aboves sharing the anchor: the YES sides are the same outcome
    SameDirection,
}

/// Which of a pair's four tracked tokens an asset id feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairLeg {
    FirstYes,
    FirstNo,
    SecondYes,
    SecondNo,
}

impl PairLeg {
    pub fn index(self) -> usize {
        match self {
            PairLeg::FirstYes => 0,
            PairLeg::FirstNo => 1,
            PairLeg::SecondYes => 2,
            PairLeg::SecondNo => 3,
        }
    }
}

/// Identity of one market inside a pair
#[derive(Debug, Clone)]
pub struct PairMarket {
    pub market_id: String,
    pub label: String,
    pub yes_token_id: String,
    pub no_token_id: String,
}

/// Two markets anchored on the same value, tracked on all four tokens
#[derive(Debug, Clone)]
pub struct BinaryPair {
    pub kind: PairKind,
    pub first: PairMarket,
    pub second: PairMarket,
    /// FirstYes, FirstNo, SecondYes, SecondNo
    pub quotes: [TokenQuote; 4],
}

impl BinaryPair {
    /// The two 2-leg bundles that settle to exactly one unit of collateral.
    pub fn bundles(&self) -> [(PairLeg, PairLeg); 2] {
        match self.kind {
            // Exactly one of YES/YES (resp. NO/NO) pays
            PairKind::Complement => [
                (PairLeg::FirstYes, PairLeg::SecondYes),
                (PairLeg::FirstNo, PairLeg::SecondNo),
            ],
            // YES sides are identical, so YES + the other NO is a full set
            PairKind::SameDirection => [
                (PairLeg::FirstYes, PairLeg::SecondNo),
                (PairLeg::SecondYes, PairLeg::FirstNo),
            ],
        }
    }

    pub fn quote(&self, leg: PairLeg) -> &TokenQuote {
        &self.quotes[leg.index()]
    }

    pub fn apply(&mut self, leg: PairLeg, update: &TopOfBookUpdate) {
        self.quotes[leg.index()].apply(update);
    }

    pub fn leg_market(&self, leg: PairLeg) -> (&PairMarket, bool) {
        match leg {
            PairLeg::FirstYes => (&self.first, true),
            PairLeg::FirstNo => (&self.first, false),
            PairLeg::SecondYes => (&self.second, true),
            PairLeg::SecondNo => (&self.second, false),
        }
    }
}

/// Mutable per-group state: quotes, prefixes, combinations, cooldowns
#[derive(Debug, Clone)]
pub struct GroupState {
    pub group: RangeGroup,
    pub child_quotes: Vec<TokenQuote>,
    pub parent_quotes: Vec<TokenQuote>,
    /// `prefix[i+1] = prefix[i] + value_i`; missing counters accumulate 1
    /// whenever the operand side is absent
    pub ask_prefix: Vec<Decimal>,
    pub bid_prefix: Vec<Decimal>,
    pub missing_ask_prefix: Vec<u32>,
    pub missing_bid_prefix: Vec<u32>,
    pub triangles: Vec<Triangle>,
    pub pairs: Vec<BinaryPair>,
    /// Child index -> parents whose coverage contains it
    pub child_to_parents: Vec<Vec<usize>>,
    /// Parent index -> lower parents it can pair with as the upper leg
    pub upper_to_lowers: Vec<Vec<usize>>,
    /// Emit key -> last emission timestamp (ms)
    pub cooldowns: HashMap<String, i64>,
}

impl GroupState {
    pub fn new(group: RangeGroup, build_pairs: bool) -> Self {
        debug_assert!(crate::structure::ladder_is_consistent(&group.children));
        let n = group.children.len();
        let m = group.parents.len();

        let mut child_to_parents = vec![Vec::new(); n];
        for (p, coverage) in group.coverages.iter().enumerate() {
            if let Some(cov) = coverage {
                for child in cov.start..cov.end {
                    child_to_parents[child].push(p);
                }
            }
        }

        let mut upper_to_lowers = vec![Vec::new(); m];
        for l in 0..m {
            let Some(cov_l) = group.coverages[l] else {
                continue;
            };
            for u in (l + 1)..m {
                let Some(cov_u) = group.coverages[u] else {
                    continue;
                };
                if cov_u.start > cov_l.start && cov_u.start <= cov_l.end {
                    upper_to_lowers[u].push(l);
                }
            }
        }

        let triangles = build_triangles(&group);
        let pairs = if build_pairs {
            build_pairs_for(&group)
        } else {
            Vec::new()
        };

        let mut state = Self {
            child_quotes: vec![TokenQuote::default(); n],
            parent_quotes: vec![TokenQuote::default(); m],
            ask_prefix: vec![Decimal::ZERO; n + 1],
            bid_prefix: vec![Decimal::ZERO; n + 1],
            missing_ask_prefix: vec![0; n + 1],
            missing_bid_prefix: vec![0; n + 1],
            triangles,
            pairs,
            child_to_parents,
            upper_to_lowers,
            cooldowns: HashMap::new(),
            group,
        };
        state.recompute_prefixes_from(0);
        state
    }

    pub fn child_count(&self) -> usize {
        self.child_quotes.len()
    }

    /// Write an accepted update into a child slot and rebuild the prefixes
    /// from that slot onward.
    pub fn set_child_quote(&mut self, index: usize, update: &TopOfBookUpdate) {
        self.child_quotes[index].apply(update);
        self.recompute_prefixes_from(index);
    }

    pub fn set_parent_quote(&mut self, index: usize, update: &TopOfBookUpdate) {
        self.parent_quotes[index].apply(update);
    }

    fn recompute_prefixes_from(&mut self, index: usize) {
        for i in index..self.child_quotes.len() {
            let quote = &self.child_quotes[i];
            self.ask_prefix[i + 1] = self.ask_prefix[i] + quote.ask.unwrap_or(Decimal::ZERO);
            self.bid_prefix[i + 1] = self.bid_prefix[i] + quote.bid.unwrap_or(Decimal::ZERO);
            self.missing_ask_prefix[i + 1] =
                self.missing_ask_prefix[i] + u32::from(quote.ask.is_none());
            self.missing_bid_prefix[i + 1] =
                self.missing_bid_prefix[i] + u32::from(quote.bid.is_none());
        }
    }

    /// Sum of child asks over `start..end`, `None` unless every child in the
    /// window has an ask. O(1).
    pub fn window_ask_sum(&self, start: usize, end: usize) -> Option<Decimal> {
        if self.missing_ask_prefix[end] - self.missing_ask_prefix[start] > 0 {
            return None;
        }
        Some(self.ask_prefix[end] - self.ask_prefix[start])
    }

    /// Sum of child bids over `start..end`, `None` unless every child in the
    /// window has a bid. O(1).
    pub fn window_bid_sum(&self, start: usize, end: usize) -> Option<Decimal> {
        if self.missing_bid_prefix[end] - self.missing_bid_prefix[start] > 0 {
            return None;
        }
        Some(self.bid_prefix[end] - self.bid_prefix[start])
    }

    /// Every child in the window is quoted on both sides. O(1).
    pub fn window_fully_quoted(&self, start: usize, end: usize) -> bool {
        self.missing_ask_prefix[end] == self.missing_ask_prefix[start]
            && self.missing_bid_prefix[end] == self.missing_bid_prefix[start]
    }

    pub fn child_leg(&self, index: usize) -> LegSnapshot {
        let d = &self.group.children[index];
        LegSnapshot {
            market_id: d.market_id.clone(),
            token_id: d.yes_token_id.clone(),
            label: d.label.clone(),
            quote: self.child_quotes[index],
        }
    }

    pub fn parent_leg(&self, index: usize) -> LegSnapshot {
        let d = &self.group.parents[index];
        LegSnapshot {
            market_id: d.market_id.clone(),
            token_id: d.yes_token_id.clone(),
            label: d.label.clone(),
            quote: self.parent_quotes[index],
        }
    }

    /// Check and arm the cooldown for an emit key. Returns false while the
    /// key is still cooling down.
    pub fn cooldown_passed(&mut self, key: &str, now_ms: i64, cooldown_ms: i64) -> bool {
        match self.cooldowns.get(key) {
            Some(last) if now_ms - last < cooldown_ms => false,
            _ => {
                self.cooldowns.insert(key.to_string(), now_ms);
                true
            }
        }
    }

    /// Role of an asset id in this group's direct arrays, if any
    pub fn role_of_token(&self, asset_id: &str) -> Option<(MarketRole, usize)> {
        if let Some(i) = self
            .group
            .children
            .iter()
            .position(|c| c.yes_token_id == asset_id)
        {
            return Some((MarketRole::Child, i));
        }
        self.group
            .parents
            .iter()
            .position(|p| p.yes_token_id == asset_id)
            .map(|i| (MarketRole::Parent, i))
    }
}

/// Enumerate every contiguous parent-to-parent chain in the group.
fn build_triangles(group: &RangeGroup) -> Vec<Triangle> {
    let mut triangles = Vec::new();
    let m = group.parents.len();
    for l in 0..m {
        let Some(cov_l) = group.coverages[l] else {
            continue;
        };
        // The chain must start exactly at the lower parent's anchor
        let anchored_on_child = cov_l.start < group.children.len()
            && group.children[cov_l.start].lower() == group.parents[l].lower();
        if !anchored_on_child {
            continue;
        }
        for u in (l + 1)..m {
            if group.parents[u].lower() <= group.parents[l].lower() {
                continue;
            }
            let Some(cov_u) = group.coverages[u] else {
                continue;
            };
            let chain_end = cov_u.start;
            if chain_end <= cov_l.start || chain_end > cov_l.end {
                continue;
            }
            // ..and end exactly at the upper parent's anchor
            if group.children[chain_end - 1].upper() != group.parents[u].lower() {
                continue;
            }
            let chain: Vec<usize> = (cov_l.start..chain_end).collect();
            triangles.push(Triangle {
                lower: l,
                upper: u,
                chain_no: vec![TokenQuote::default(); chain.len()],
                chain,
                lower_yes: TokenQuote::default(),
                upper_no: TokenQuote::default(),
            });
        }
    }
    triangles
}

/// Enumerate complement (below/above) and same-direction (above/above)
/// pairs anchored on the same value.
fn build_pairs_for(group: &RangeGroup) -> Vec<BinaryPair> {
    let mut pairs = Vec::new();
    let market = |d: &crate::domain::MarketDescriptor| PairMarket {
        market_id: d.market_id.clone(),
        label: d.label.clone(),
        yes_token_id: d.yes_token_id.clone(),
        no_token_id: d.no_token_id.clone(),
    };

    for below in &group.belows {
        for parent in &group.parents {
            if below.upper().is_some() && below.upper() == parent.lower() {
                pairs.push(BinaryPair {
                    kind: PairKind::Complement,
                    first: market(below),
                    second: market(parent),
                    quotes: [TokenQuote::default(); 4],
                });
            }
        }
    }
    for (i, first) in group.parents.iter().enumerate() {
        for second in group.parents.iter().skip(i + 1) {
            if first.lower().is_some() && first.lower() == second.lower() {
                pairs.push(BinaryPair {
                    kind: PairKind::SameDirection,
                    first: market(first),
                    second: market(second),
                    quotes: [TokenQuote::default(); 4],
                });
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketDescriptor, MarketKind};
    use crate::structure::compute_coverage;
    use rust_decimal_macros::dec;

    fn descriptor(
        id: &str,
        kind: MarketKind,
        role: MarketRole,
    ) -> MarketDescriptor {
        MarketDescriptor {
            market_id: id.into(),
            slug: format!("slug-{id}"),
            question: String::new(),
            yes_token_id: format!("{id}-yes"),
            no_token_id: format!("{id}-no"),
            kind,
            role,
            label: kind.label(),
            symbol: "btc".into(),
            settlement_key: "t".into(),
            event_slug: None,
            neg_risk: false,
        }
    }

    fn ladder_group() -> RangeGroup {
        let children = vec![
            descriptor("c1", MarketKind::Range { lower: dec!(80), upper: dec!(82) }, MarketRole::Child),
            descriptor("c2", MarketKind::Range { lower: dec!(82), upper: dec!(84) }, MarketRole::Child),
            descriptor("c3", MarketKind::Range { lower: dec!(84), upper: dec!(86) }, MarketRole::Child),
        ];
        let parents = vec![
            descriptor("p80", MarketKind::Above { lower: dec!(80) }, MarketRole::Parent),
            descriptor("p84", MarketKind::Above { lower: dec!(84) }, MarketRole::Parent),
            descriptor("p86", MarketKind::Above { lower: dec!(86) }, MarketRole::Parent),
        ];
        let coverages = parents
            .iter()
            .map(|p| compute_coverage(&children, p.lower().unwrap()))
            .collect();
        RangeGroup {
            group_key: "btc-t".into(),
            symbol: "btc".into(),
            settlement_key: "t".into(),
            children,
            parents,
            coverages,
            belows: Vec::new(),
            step: Some(dec!(2)),
            unmatched: Vec::new(),
        }
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

    #[test]
    fn prefixes_track_quotes_and_missing_sides() {
        let mut state = GroupState::new(ladder_group(), true);
        assert_eq!(state.missing_ask_prefix, vec![0, 1, 2, 3]);

        state.set_child_quote(1, &update("c2-yes", 1, dec!(0.28), dec!(0.30)));
        assert_eq!(state.ask_prefix, vec![dec!(0), dec!(0), dec!(0.30), dec!(0.30)]);
        assert_eq!(state.missing_ask_prefix, vec![0, 1, 1, 2]);
        assert_eq!(state.window_ask_sum(1, 2), Some(dec!(0.30)));
        assert_eq!(state.window_ask_sum(0, 2), None);

        state.set_child_quote(0, &update("c1-yes", 2, dec!(0.28), dec!(0.30)));
        state.set_child_quote(2, &update("c3-yes", 3, dec!(0.28), dec!(0.30)));
        assert_eq!(state.window_ask_sum(0, 3), Some(dec!(0.90)));
        assert_eq!(state.window_bid_sum(0, 3), Some(dec!(0.84)));
        assert!(state.window_fully_quoted(0, 3));

        // Invariant: prefix[i+1] - prefix[i] equals the child's side or the
        // missing counter steps by one.
        for i in 0..state.child_count() {
            match state.child_quotes[i].ask {
                Some(ask) => {
                    assert_eq!(state.ask_prefix[i + 1] - state.ask_prefix[i], ask);
                    assert_eq!(state.missing_ask_prefix[i + 1], state.missing_ask_prefix[i]);
                }
                None => {
                    assert_eq!(state.missing_ask_prefix[i + 1], state.missing_ask_prefix[i] + 1);
                }
            }
        }
    }

    #[test]
    fn zero_price_counts_as_missing() {
        let mut state = GroupState::new(ladder_group(), false);
        state.set_child_quote(0, &update("c1-yes", 1, dec!(0.28), dec!(0)));
        assert_eq!(state.window_ask_sum(0, 1), None);
        assert_eq!(state.window_bid_sum(0, 1), Some(dec!(0.28)));
    }

    #[test]
    fn dependency_maps_follow_coverage() {
        let state = GroupState::new(ladder_group(), false);
        // p80 covers all three children, p84 covers the last
        assert_eq!(state.child_to_parents[0], vec![0]);
        assert_eq!(state.child_to_parents[1], vec![0]);
        assert_eq!(state.child_to_parents[2], vec![0, 1]);
        // p84 and p86 can both be the upper leg of p80's windows; p86 also
        // pairs above p84
        assert!(state.upper_to_lowers[0].is_empty());
        assert_eq!(state.upper_to_lowers[1], vec![0]);
        assert_eq!(state.upper_to_lowers[2], vec![0, 1]);
    }

    #[test]
    fn triangles_cover_every_contiguous_parent_pair() {
        let state = GroupState::new(ladder_group(), false);
        // p80->p84 (chain c1,c2), p80->p86 (chain c1,c2,c3), p84->p86 (c3)
        assert_eq!(state.triangles.len(), 3);
        for t in &state.triangles {
            let group = &state.group;
            // Adjacency: each chain leg's upper is the next leg's lower, and
            // the last leg's upper is the upper parent's anchor.
            for pair in t.chain.windows(2) {
                assert_eq!(
                    group.children[pair[0]].upper(),
                    group.children[pair[1]].lower()
                );
            }
            assert_eq!(
                group.children[*t.chain.last().unwrap()].upper(),
                group.parents[t.upper].lower()
            );
            assert_eq!(
                group.children[t.chain[0]].lower(),
                group.parents[t.lower].lower()
            );
        }
    }

    #[test]
    fn triangle_totals_require_all_legs() {
        let mut state = GroupState::new(ladder_group(), false);
        let t = &mut state.triangles[0];
        t.apply(TriangleLeg::LowerYes, &update("p80-yes", 1, dec!(0.55), dec!(0.60)));
        t.apply(TriangleLeg::UpperNo, &update("p84-no", 1, dec!(0.10), dec!(0.15)));
        t.apply(TriangleLeg::ChainNo(0), &update("c1-no", 1, dec!(0.05), dec!(0.10)));
        assert_eq!(t.total_ask(), None);
        t.apply(TriangleLeg::ChainNo(1), &update("c2-no", 1, dec!(0.05), dec!(0.10)));
        assert_eq!(t.total_ask(), Some(dec!(0.95)));
        assert_eq!(t.total_bid(), Some(dec!(0.75)));
        assert_eq!(t.payout(), dec!(3));
        assert!(t.all_executable());
    }

    #[test]
    fn same_direction_pair_is_built_for_duplicate_anchors() {
        let mut group = ladder_group();
        group
            .parents
            .push(descriptor("p84b", MarketKind::Above { lower: dec!(84) }, MarketRole::Parent));
        group.parents.sort_by(|a, b| a.lower().cmp(&b.lower()).then(a.market_id.cmp(&b.market_id)));
        group.coverages = group
            .parents
            .iter()
            .map(|p| compute_coverage(&group.children, p.lower().unwrap()))
            .collect();
        let state = GroupState::new(group, true);
        assert_eq!(state.pairs.len(), 1);
        assert_eq!(state.pairs[0].kind, PairKind::SameDirection);
    }

    #[test]
    fn complement_pair_links_below_and_above() {
        let mut group = ladder_group();
        group.belows.push(descriptor(
            "b84",
            MarketKind::Below { upper: dec!(84) },
            MarketRole::Child,
        ));
        let state = GroupState::new(group, true);
        assert_eq!(state.pairs.len(), 1);
        let pair = &state.pairs[0];
        assert_eq!(pair.kind, PairKind::Complement);
        assert_eq!(pair.first.market_id, "b84");
        assert_eq!(pair.second.market_id, "p84");
    }

    #[test]
    fn cooldown_gates_within_window() {
        let mut state = GroupState::new(ladder_group(), false);
        assert!(state.cooldown_passed("key", 1_000, 500));
        assert!(!state.cooldown_passed("key", 1_400, 500));
        assert!(state.cooldown_passed("key", 1_600, 500));
        assert!(state.cooldown_passed("other", 1_400, 500));
    }

    #[test]
    fn empty_ladder_has_trivial_coverage() {
        let group = RangeGroup {
            group_key: "x".into(),
            symbol: "x".into(),
            settlement_key: "t".into(),
            children: Vec::new(),
            parents: Vec::new(),
            coverages: Vec::new(),
            belows: Vec::new(),
            step: None,
            unmatched: Vec::new(),
        };
        let state = GroupState::new(group, true);
        assert_eq!(state.ask_prefix, vec![Decimal::ZERO]);
        assert!(state.triangles.is_empty());
        assert!(state.pairs.is_empty());
    }
}
