//! Global lookup tables routing a price event to its group state.
//!
//! Locators hold `(group_key, role, index)` triples, never references, so a
//! group can be dropped by deleting its entries with nothing left dangling.

use crate::domain::MarketRole;
use crate::engine::state::{GroupState, PairLeg, TriangleLeg};
use std::collections::HashMap;

/// Where a directly-tracked token lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLocator {
    pub group_key: String,
    pub role: MarketRole,
    pub index: usize,
}

/// A triangle leg an asset id feeds
#[derive(Debug, Clone)]
pub struct TriangleRef {
    pub group_key: String,
    pub triangle: usize,
    pub leg: TriangleLeg,
}

/// A pair leg an asset id feeds
#[derive(Debug, Clone)]
pub struct PairRef {
    pub group_key: String,
    pub pair: usize,
    pub leg: PairLeg,
}

/// All global lookup tables, rebuilt atomically with the group set
#[derive(Debug, Default)]
pub struct Locators {
    pub tokens: HashMap<String, TokenLocator>,
    pub slugs: HashMap<String, TokenLocator>,
    pub market_ids: HashMap<String, TokenLocator>,
    pub triangle_tokens: HashMap<String, Vec<TriangleRef>>,
    pub pair_tokens: HashMap<String, Vec<PairRef>>,
}

impl Locators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every token, slug and market id of one group state.
    pub fn add_group(&mut self, state: &GroupState) {
        let key = &state.group.group_key;
        let mut register = |role: MarketRole,
                            index: usize,
                            token: &str,
                            slug: &str,
                            market_id: &str,
                            tokens: &mut HashMap<String, TokenLocator>,
                            slugs: &mut HashMap<String, TokenLocator>,
                            market_ids: &mut HashMap<String, TokenLocator>| {
            let locator = TokenLocator {
                group_key: key.clone(),
                role,
                index,
            };
            tokens.insert(token.to_string(), locator.clone());
            slugs.insert(slug.to_string(), locator.clone());
            market_ids.insert(market_id.to_string(), locator);
        };

        for (i, child) in state.group.children.iter().enumerate() {
            register(
                MarketRole::Child,
                i,
                &child.yes_token_id,
                &child.slug,
                &child.market_id,
                &mut self.tokens,
                &mut self.slugs,
                &mut self.market_ids,
            );
        }
        for (i, parent) in state.group.parents.iter().enumerate() {
            register(
                MarketRole::Parent,
                i,
                &parent.yes_token_id,
                &parent.slug,
                &parent.market_id,
                &mut self.tokens,
                &mut self.slugs,
                &mut self.market_ids,
            );
        }

        for (t, triangle) in state.triangles.iter().enumerate() {
            let lower_yes = &state.group.parents[triangle.lower].yes_token_id;
            let upper_no = &state.group.parents[triangle.upper].no_token_id;
            self.triangle_tokens
                .entry(lower_yes.clone())
                .or_default()
                .push(TriangleRef {
                    group_key: key.clone(),
                    triangle: t,
                    leg: TriangleLeg::LowerYes,
                });
            self.triangle_tokens
                .entry(upper_no.clone())
                .or_default()
                .push(TriangleRef {
                    group_key: key.clone(),
                    triangle: t,
                    leg: TriangleLeg::UpperNo,
                });
            for (k, &child) in triangle.chain.iter().enumerate() {
                self.triangle_tokens
                    .entry(state.group.children[child].no_token_id.clone())
                    .or_default()
                    .push(TriangleRef {
                        group_key: key.clone(),
                        triangle: t,
                        leg: TriangleLeg::ChainNo(k),
                    });
            }
        }

        for (p, pair) in state.pairs.iter().enumerate() {
            for (leg, token) in [
                (PairLeg::FirstYes, &pair.first.yes_token_id),
                (PairLeg::FirstNo, &pair.first.no_token_id),
                (PairLeg::SecondYes, &pair.second.yes_token_id),
                (PairLeg::SecondNo, &pair.second.no_token_id),
            ] {
                self.pair_tokens
                    .entry(token.clone())
                    .or_default()
                    .push(PairRef {
                        group_key: key.clone(),
                        pair: p,
                        leg,
                    });
            }
        }
    }

    /// Remove every entry belonging to a group. O(entries-in-group).
    pub fn remove_group(&mut self, state: &GroupState) {
        let key = &state.group.group_key;
        let mut drop_direct = |token: &str, slug: &str, market_id: &str| {
            remove_if_owned(&mut self.tokens, token, key);
            remove_if_owned(&mut self.slugs, slug, key);
            remove_if_owned(&mut self.market_ids, market_id, key);
        };
        for child in &state.group.children {
            drop_direct(&child.yes_token_id, &child.slug, &child.market_id);
        }
        for parent in &state.group.parents {
            drop_direct(&parent.yes_token_id, &parent.slug, &parent.market_id);
        }

        for triangle in &state.triangles {
            let mut tokens = vec![
                state.group.parents[triangle.lower].yes_token_id.clone(),
                state.group.parents[triangle.upper].no_token_id.clone(),
            ];
            for &child in &triangle.chain {
                tokens.push(state.group.children[child].no_token_id.clone());
            }
            for token in tokens {
                prune_refs(&mut self.triangle_tokens, &token, key);
            }
        }
        for pair in &state.pairs {
            for token in [
                &pair.first.yes_token_id,
                &pair.first.no_token_id,
                &pair.second.yes_token_id,
                &pair.second.no_token_id,
            ] {
                prune_pair_refs(&mut self.pair_tokens, token, key);
            }
        }
    }

    /// Resolve an update's direct locator: token id first, then slug, then
    /// market id.
    pub fn resolve(
        &self,
        asset_id: &str,
        market_slug: Option<&str>,
        market_id: Option<&str>,
    ) -> Option<&TokenLocator> {
        if let Some(found) = self.tokens.get(asset_id) {
            return Some(found);
        }
        if let Some(found) = market_slug.and_then(|s| self.slugs.get(s)) {
            return Some(found);
        }
        market_id.and_then(|m| self.market_ids.get(m))
    }
}

fn remove_if_owned(map: &mut HashMap<String, TokenLocator>, key: &str, group_key: &str) {
    if map.get(key).is_some_and(|l| l.group_key == group_key) {
        map.remove(key);
    }
}

fn prune_refs(map: &mut HashMap<String, Vec<TriangleRef>>, token: &str, group_key: &str) {
    if let Some(refs) = map.get_mut(token) {
        refs.retain(|r| r.group_key != group_key);
        if refs.is_empty() {
            map.remove(token);
        }
    }
}

fn prune_pair_refs(map: &mut HashMap<String, Vec<PairRef>>, token: &str, group_key: &str) {
    if let Some(refs) = map.get_mut(token) {
        refs.retain(|r| r.group_key != group_key);
        if refs.is_empty() {
            map.remove(token);
        }
    }
}
