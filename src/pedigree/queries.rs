//! Read-only traversal queries over [`PedigreeGraph`]: ancestry walks,
//! generation layering and consanguinity detection.

use crate::pedigree::graph::PedigreeGraph;
use crate::schema::record::IndividualId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Which way an ancestral walk climbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedigreeSummary {
    pub individuals: usize,
    pub relationships: usize,
    pub founders: usize,
    pub generations: usize,
    pub consanguineous_pairs: usize,
}

impl PedigreeGraph {
    /// Every individual above `id` through parent edges, sorted.
    pub fn ancestors_of(&self, id: IndividualId) -> Vec<IndividualId> {
        self.walk(id, |graph, current| graph.parents_of(current))
    }

    /// Every individual below `id` through parent edges, sorted.
    pub fn descendants_of(&self, id: IndividualId) -> Vec<IndividualId> {
        self.walk(id, |graph, current| graph.children_of(current))
    }

    fn walk(
        &self,
        start: IndividualId,
        next: impl Fn(&Self, IndividualId) -> Vec<IndividualId>,
    ) -> Vec<IndividualId> {
        let mut visited = HashSet::new();
        let mut found = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(current) = queue.pop_front() {
            for neighbor in next(self, current) {
                if visited.insert(neighbor) {
                    found.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        found.sort();
        found
    }

    /// Layer individuals by generation: founders (no recorded parents) sit
    /// in layer 0, every child one past its deepest parent. Ids within a
    /// layer are sorted, so the output is deterministic.
    pub fn generation_layers(&self) -> Vec<Vec<IndividualId>> {
        let ids = self.ids();
        let mut remaining: HashMap<IndividualId, usize> = HashMap::new();
        let mut depth: HashMap<IndividualId, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for &id in &ids {
            let parents = self.parents_of(id).len();
            remaining.insert(id, parents);
            if parents == 0 {
                depth.insert(id, 0);
                queue.push_back(id);
            }
        }

        while let Some(current) = queue.pop_front() {
            let current_depth = depth[&current];
            for child in self.children_of(current) {
                let child_depth = depth.entry(child).or_insert(0);
                *child_depth = (*child_depth).max(current_depth + 1);
                if let Some(pending) = remaining.get_mut(&child) {
                    *pending = pending.saturating_sub(1);
                    if *pending == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        let max_depth = depth.values().copied().max().unwrap_or(0);
        let mut layers = vec![Vec::new(); if depth.is_empty() { 0 } else { max_depth + 1 }];
        for &id in &ids {
            if let Some(&d) = depth.get(&id) {
                layers[d].push(id);
            }
        }
        for layer in &mut layers {
            layer.sort();
        }
        layers
    }

    /// Pairs of individuals connected by at least two independent ancestral
    /// paths (interior-vertex-disjoint walks that climb to an ancestor and
    /// descend again). Ancestor/descendant pairs and pairs sharing a
    /// recorded parent are excluded; the family diamond around an ordinary
    /// sibling pair is not a loop.
    pub fn consanguinity_loops(&self) -> Vec<(IndividualId, IndividualId)> {
        let ids = self.ids();
        let mut loops = Vec::new();

        for (position, &a) in ids.iter().enumerate() {
            for &b in &ids[position + 1..] {
                if self.is_ancestor_of(a, b) || self.is_ancestor_of(b, a) {
                    continue;
                }
                let parents_a: HashSet<IndividualId> =
                    self.parents_of(a).into_iter().collect();
                if self.parents_of(b).iter().any(|p| parents_a.contains(p)) {
                    continue;
                }
                if self.disjoint_ancestral_paths(a, b, 2) >= 2 {
                    loops.push((a, b));
                }
            }
        }

        debug!(pairs = loops.len(), "consanguinity scan complete");
        loops
    }

    /// Count interior-disjoint ancestral paths between `a` and `b`, greedy
    /// shortest-path-first, stopping at `cap`. Family graphs are small
    /// enough that the greedy bound is the practical one.
    fn disjoint_ancestral_paths(&self, a: IndividualId, b: IndividualId, cap: usize) -> usize {
        let mut used: HashSet<IndividualId> = HashSet::new();
        let mut count = 0;
        while count < cap {
            match self.shortest_ancestral_path(a, b, &used) {
                Some(interior) => {
                    used.extend(interior);
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// BFS over (individual, phase) states: climb parent edges, switch at
    /// the apex, then descend child edges to the target. Returns the
    /// interior of the path (everything but the endpoints), or None when no
    /// path avoids `used`.
    fn shortest_ancestral_path(
        &self,
        from: IndividualId,
        to: IndividualId,
        used: &HashSet<IndividualId>,
    ) -> Option<Vec<IndividualId>> {
        let mut visited: HashSet<(IndividualId, Phase)> = HashSet::new();
        let mut back: HashMap<(IndividualId, Phase), (IndividualId, Phase)> = HashMap::new();
        let mut queue = VecDeque::new();

        let start = (from, Phase::Up);
        visited.insert(start);
        queue.push_back(start);

        while let Some((current, phase)) = queue.pop_front() {
            let mut successors: Vec<(IndividualId, Phase)> = Vec::new();
            if phase == Phase::Up {
                for parent in self.parents_of(current) {
                    successors.push((parent, Phase::Up));
                }
            }
            // switching to descent makes `current` the apex; the start
            // itself cannot be an apex or the path would not climb at all
            if current != from {
                for child in self.children_of(current) {
                    successors.push((child, Phase::Down));
                }
            }

            for state in successors {
                let (next, next_phase) = state;
                if next == to && next_phase == Phase::Down {
                    let mut interior = Vec::new();
                    let mut cursor = (current, phase);
                    while cursor.0 != from {
                        interior.push(cursor.0);
                        cursor = back[&cursor];
                    }
                    interior.reverse();
                    return Some(interior);
                }
                if next == from || next == to || used.contains(&next) {
                    continue;
                }
                if visited.insert(state) {
                    back.insert(state, (current, phase));
                    queue.push_back(state);
                }
            }
        }
        None
    }

    pub fn summary(&self) -> PedigreeSummary {
        let founders = self
            .ids()
            .iter()
            .filter(|&&id| self.parents_of(id).is_empty())
            .count();
        PedigreeSummary {
            individuals: self.individual_count(),
            relationships: self.relationship_count(),
            founders,
            generations: self.generation_layers().len(),
            consanguineous_pairs: self.consanguinity_loops().len(),
        }
    }
}
