// src/pipeline/diff.rs

//! Diff calculation between discovered items and stored keys.
//!
//! Items found in several feeds during one cycle are combined into one
//! candidate with the structural merge; the first feed's provenance and
//! outlet are kept.

use std::collections::{HashMap, HashSet};

use crate::models::Candidate;
use crate::services::merge;

/// A candidate together with the outlet of the feed it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredItem {
    pub candidate: Candidate,
    pub outlet: String,
}

/// Result of diffing one cycle's discoveries against the store.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Items whose key the store does not know yet, in discovery order
    pub new_items: Vec<DiscoveredItem>,
    /// Distinct keys discovered this cycle
    pub discovered: usize,
    /// Discovered keys the store already had
    pub already_known: usize,
}

impl DiffResult {
    /// Check if there is anything new.
    pub fn has_changes(&self) -> bool {
        !self.new_items.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.new_items.len()
    }
}

/// Collects candidates across feeds, then diffs them against known keys.
#[derive(Debug, Clone, Default)]
pub struct DiffCalculator {
    items: Vec<DiscoveredItem>,
    positions: HashMap<String, usize>,
}

impl DiffCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the candidates of one feed.
    pub fn add(&mut self, outlet: &str, candidates: Vec<Candidate>) {
        for candidate in candidates {
            match self.positions.get(&candidate.key) {
                Some(&idx) => {
                    let existing = &mut self.items[idx].candidate;
                    let tree = std::mem::take(&mut existing.tree);
                    existing.tree = merge(tree, &candidate.tree);
                }
                None => {
                    self.positions
                        .insert(candidate.key.clone(), self.items.len());
                    self.items.push(DiscoveredItem {
                        candidate,
                        outlet: outlet.to_string(),
                    });
                }
            }
        }
    }

    /// Split collected items into new and already known.
    pub fn calculate(self, known: &HashSet<String>) -> DiffResult {
        let discovered = self.items.len();
        let new_items: Vec<DiscoveredItem> = self
            .items
            .into_iter()
            .filter(|item| {
                let is_known = known.contains(&item.candidate.key);
                if is_known {
                    log::debug!("Skipping known key {}", item.candidate.key);
                }
                !is_known
            })
            .collect();

        DiffResult {
            already_known: discovered - new_items.len(),
            discovered,
            new_items,
        }
    }
}
