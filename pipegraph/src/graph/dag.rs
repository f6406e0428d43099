//! The immutable, validated activity graph.

use super::builder::validate;
use super::ActivitySpec;
use crate::errors::ValidationError;
use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A directed acyclic graph of activities.
///
/// Built once through [`ActivityGraph::build`] or
/// [`GraphBuilder`](super::GraphBuilder); never mutated afterwards. A run
/// records states in its own report and leaves the graph untouched.
#[derive(Debug, Clone)]
pub struct ActivityGraph {
    /// The pipeline name.
    name: String,
    /// Activity specifications in input order.
    activities: Vec<ActivitySpec>,
    /// Name to input position.
    index: HashMap<String, usize>,
    /// Distinct upstream positions per activity.
    upstream: Vec<Vec<usize>>,
    /// Downstream positions per activity.
    downstream: Vec<Vec<usize>>,
    /// Topological order as input positions.
    order: Vec<usize>,
    /// Topological order as names.
    order_names: Vec<String>,
}

impl ActivityGraph {
    /// Validates the specs and builds the graph.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure: `EmptyGraph`, `InvalidName`,
    /// `InvalidPolicy`, `DuplicateActivityName`, `UnknownDependency`, then
    /// `CyclicDependency`. No partial graph is ever returned.
    pub fn build(
        name: impl Into<String>,
        specs: impl IntoIterator<Item = ActivitySpec>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let activities: Vec<ActivitySpec> = specs.into_iter().collect();
        validate(&name, &activities)?;

        let index: HashMap<String, usize> = activities
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name.clone(), i))
            .collect();

        let mut upstream = vec![Vec::new(); activities.len()];
        let mut downstream = vec![Vec::new(); activities.len()];
        for (i, spec) in activities.iter().enumerate() {
            for dep in spec.dependency_names() {
                let Some(&j) = index.get(dep) else { continue };
                if !upstream[i].contains(&j) {
                    upstream[i].push(j);
                    downstream[j].push(i);
                }
            }
        }

        let order = topological_sort(&upstream, &downstream);
        let order_names = order.iter().map(|&i| activities[i].name.clone()).collect();

        Ok(Self {
            name,
            activities,
            index,
            upstream,
            downstream,
            order,
            order_names,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of activities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    /// Returns true if the graph has no activities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Returns the activity specs in input order.
    #[must_use]
    pub fn activities(&self) -> &[ActivitySpec] {
        &self.activities
    }

    /// Looks up an activity by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActivitySpec> {
        self.index.get(name).map(|&i| &self.activities[i])
    }

    /// Returns true if the graph contains the named activity.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the topological order; ties are broken by input order.
    #[must_use]
    pub fn topological_order(&self) -> &[String] {
        &self.order_names
    }

    /// Returns the activities with no dependencies, in input order.
    #[must_use]
    pub fn roots(&self) -> Vec<&str> {
        self.activities
            .iter()
            .enumerate()
            .filter(|(i, _)| self.upstream[*i].is_empty())
            .map(|(_, spec)| spec.name.as_str())
            .collect()
    }

    /// Returns the activities that directly depend on `name`.
    #[must_use]
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|&i| {
                self.downstream[i]
                    .iter()
                    .map(|&j| self.activities[j].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a SHA-256 fingerprint of the graph definition.
    ///
    /// Two graphs built from the same specs share a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for &i in &self.order {
            hasher.update([0u8]);
            // ActivitySpec serialization cannot fail: all keys are strings.
            if let Ok(bytes) = serde_json::to_vec(&self.activities[i]) {
                hasher.update(&bytes);
            }
        }
        hex::encode(hasher.finalize())
    }

    pub(crate) fn spec_at(&self, position: usize) -> &ActivitySpec {
        &self.activities[position]
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn order_positions(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn downstream_of(&self, position: usize) -> &[usize] {
        &self.downstream[position]
    }
}

/// Kahn's algorithm with a min-heap on input position.
fn topological_sort(upstream: &[Vec<usize>], downstream: &[Vec<usize>]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = upstream.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(upstream.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &child in &downstream[node] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }
    order
}
