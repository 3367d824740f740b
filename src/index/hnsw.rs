//! HNSW (Hierarchical Navigable Small World) graph.
//!
//! Nodes live in a `Vec` addressed by their insertion id, so ids are dense, start at zero and
//! are never reused. Each node is assigned a top layer drawn from an exponential distribution;
//! insertion greedily descends from the global entry point, then links the node to its nearest
//! neighbours on every layer it belongs to. Distances are squared Euclidean, lower is closer.
//!
//! - Insert: O(log N) average
//! - Search: O(log N) average
//! - Memory: O(N * M)

use super::IndexError;
use super::distance::l2_squared;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

const MAX_LEVEL: usize = 16;
const LEVEL_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Construction and query parameters for the HNSW graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HnswParams {
    /// Links kept per node on upper layers; layer 0 keeps `2 * m`.
    pub m: usize,
    /// Candidate list size while inserting (construction search depth).
    pub ef_construction: usize,
    /// Candidate list size while querying (search depth).
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 32,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// A search result: node id plus squared distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    /// Insertion id of the node.
    pub id: u32,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug)]
struct Node {
    vector: Vec<f32>,
    links: Vec<Vec<u32>>,
}

impl Node {
    fn links_at(&self, level: usize) -> &[u32] {
        self.links.get(level).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Append-only HNSW graph over fixed-dimension vectors.
#[derive(Debug)]
pub struct HnswGraph {
    params: HnswParams,
    level_mult: f64,
    nodes: Vec<Node>,
    entry_point: Option<u32>,
    top_level: usize,
    dimension: Option<usize>,
    rng_state: u64,
}

impl HnswGraph {
    /// Create an empty graph.
    pub fn new(params: HnswParams) -> Self {
        let m = params.m.max(2);
        Self {
            params: HnswParams { m, ..params },
            level_mult: 1.0 / (m as f64).ln(),
            nodes: Vec::new(),
            entry_point: None,
            top_level: 0,
            dimension: None,
            rng_state: LEVEL_SEED,
        }
    }

    /// Parameters the graph was built with.
    pub fn params(&self) -> HnswParams {
        self.params
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dimension fixed by the first inserted vector.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Check that `vector` could be inserted, given the dimension fixed so far (or `expected`).
    pub fn check_vector(&self, vector: &[f32], expected: Option<usize>) -> Result<(), IndexError> {
        if vector.is_empty() {
            return Err(IndexError::EmptyVector);
        }
        if let Some(expected) = self.dimension.or(expected) {
            if vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(IndexError::NonFiniteComponent);
        }
        Ok(())
    }

    /// Insert a vector and return its id (the previous node count).
    pub fn insert(&mut self, vector: Vec<f32>) -> Result<u32, IndexError> {
        self.check_vector(&vector, None)?;
        let id = u32::try_from(self.nodes.len()).map_err(|_| IndexError::CapacityExceeded)?;
        self.dimension.get_or_insert(vector.len());

        let level = self.select_level();
        self.nodes.push(Node {
            vector,
            links: vec![Vec::new(); level + 1],
        });

        let Some(mut entry) = self.entry_point else {
            self.entry_point = Some(id);
            self.top_level = level;
            return Ok(id);
        };

        let query = self.nodes[id as usize].vector.clone();

        for layer in (level + 1..=self.top_level).rev() {
            entry = self.greedy_closest(&query, entry, layer);
        }

        for layer in (0..=level.min(self.top_level)).rev() {
            let found = self.search_layer(&query, entry, self.params.ef_construction, layer);
            let selected: Vec<u32> = found
                .iter()
                .filter(|candidate| candidate.id != id)
                .take(self.params.m)
                .map(|candidate| candidate.id)
                .collect();

            let cap = self.max_links(layer);
            for &neighbor in &selected {
                self.link(neighbor, id, layer, cap);
            }
            self.nodes[id as usize].links[layer] = selected;

            if let Some(closest) = found.first() {
                entry = closest.id;
            }
        }

        if level > self.top_level {
            self.top_level = level;
            self.entry_point = Some(id);
        }

        Ok(id)
    }

    /// Return up to `k` nearest nodes ordered by ascending distance.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let Some(mut entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        for layer in (1..=self.top_level).rev() {
            entry = self.greedy_closest(query, entry, layer);
        }

        let ef = self.params.ef_search.max(k);
        let mut found = self.search_layer(query, entry, ef, 0);
        found.truncate(k);
        found
    }

    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m * 2
        } else {
            self.params.m
        }
    }

    fn distance_to(&self, id: u32, query: &[f32]) -> f32 {
        l2_squared(&self.nodes[id as usize].vector, query)
    }

    fn greedy_closest(&self, query: &[f32], entry: u32, layer: usize) -> u32 {
        let mut current = entry;
        let mut current_distance = self.distance_to(current, query);

        loop {
            let mut changed = false;
            for &neighbor in self.nodes[current as usize].links_at(layer) {
                let distance = self.distance_to(neighbor, query);
                if distance < current_distance {
                    current = neighbor;
                    current_distance = distance;
                    changed = true;
                }
            }
            if !changed {
                return current;
            }
        }
    }

    /// Beam search on one layer; returns at most `ef` nodes sorted by ascending distance.
    fn search_layer(&self, query: &[f32], entry: u32, ef: usize, layer: usize) -> Vec<Neighbor> {
        let mut visited = HashSet::new();
        visited.insert(entry);

        let start = Neighbor {
            id: entry,
            distance: self.distance_to(entry, query),
        };
        // Closest-first frontier, furthest-first result set.
        let mut candidates = BinaryHeap::from([Reverse(start)]);
        let mut results = BinaryHeap::from([start]);

        while let Some(Reverse(current)) = candidates.pop() {
            let furthest = results.peek().map_or(f32::INFINITY, |n| n.distance);
            if current.distance > furthest && results.len() >= ef {
                break;
            }

            for &neighbor in self.nodes[current.id as usize].links_at(layer) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let distance = self.distance_to(neighbor, query);
                let furthest = results.peek().map_or(f32::INFINITY, |n| n.distance);
                if results.len() < ef || distance < furthest {
                    let candidate = Neighbor {
                        id: neighbor,
                        distance,
                    };
                    candidates.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Add `to` to the link list of `from`, pruning to the `cap` closest links.
    fn link(&mut self, from: u32, to: u32, layer: usize, cap: usize) {
        let Some(links) = self.nodes[from as usize].links.get_mut(layer) else {
            return;
        };
        if links.contains(&to) {
            return;
        }
        links.push(to);
        if links.len() <= cap {
            return;
        }

        let links = std::mem::take(&mut self.nodes[from as usize].links[layer]);
        let base = &self.nodes[from as usize].vector;
        let mut scored: Vec<Neighbor> = links
            .into_iter()
            .map(|id| Neighbor {
                id,
                distance: l2_squared(base, &self.nodes[id as usize].vector),
            })
            .collect();
        scored.sort();
        scored.truncate(cap);
        self.nodes[from as usize].links[layer] = scored.into_iter().map(|n| n.id).collect();
    }

    /// Draw a layer from `floor(-ln(U) * 1/ln(M))` using a seeded LCG.
    fn select_level(&mut self) -> usize {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let uniform = ((self.rng_state >> 11) as f64 / (1u64 << 53) as f64).max(1e-12);
        let level = (-uniform.ln() * self.level_mult).floor() as usize;
        level.min(MAX_LEVEL)
    }
}
