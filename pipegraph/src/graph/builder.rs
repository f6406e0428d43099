//! Graph builder with validation.

use super::{ActivityGraph, ActivityPolicy, ActivitySpec};
use crate::config::PipegraphConfig;
use crate::errors::ValidationError;
use std::collections::{HashMap, HashSet};

/// Fluent builder for activity graphs.
///
/// Validation is deferred to [`GraphBuilder::build`], so activities may
/// reference upstreams that are added later.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    /// The pipeline name.
    name: String,
    /// Activity specs in insertion order.
    activities: Vec<ActivitySpec>,
    /// Policy applied by [`GraphBuilder::activity`].
    default_policy: ActivityPolicy,
}

impl GraphBuilder {
    /// Creates a new graph builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activities: Vec::new(),
            default_policy: ActivityPolicy::default(),
        }
    }

    /// Creates a builder whose default policy comes from `config`.
    #[must_use]
    pub fn from_config(name: impl Into<String>, config: &PipegraphConfig) -> Self {
        Self::new(name).with_default_policy(config.default_policy.clone())
    }

    /// Sets the policy given to activities added through [`GraphBuilder::activity`].
    #[must_use]
    pub fn with_default_policy(mut self, policy: ActivityPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Adds an activity depending on `dependencies` (all requiring success),
    /// using the builder's default policy.
    #[must_use]
    pub fn activity(
        self,
        name: impl Into<String>,
        task: crate::core::TaskRef,
        dependencies: &[&str],
    ) -> Self {
        let mut spec = ActivitySpec::new(name, task).with_policy(self.default_policy.clone());
        for dep in dependencies {
            spec = spec.depends_on(*dep);
        }
        self.spec(spec)
    }

    /// Adds a fully specified activity.
    #[must_use]
    pub fn spec(mut self, spec: ActivitySpec) -> Self {
        self.activities.push(spec);
        self
    }

    /// Adds several fully specified activities.
    #[must_use]
    pub fn specs(mut self, specs: impl IntoIterator<Item = ActivitySpec>) -> Self {
        self.activities.extend(specs);
        self
    }

    /// Appends the activities of another builder.
    ///
    /// Name clashes surface as `DuplicateActivityName` at build time.
    #[must_use]
    pub fn compose(mut self, other: Self) -> Self {
        self.name = format!("{}+{}", self.name, other.name);
        self.activities.extend(other.activities);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of activities added so far.
    #[must_use]
    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    /// Validates and builds the graph.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the activities do not form a valid graph.
    pub fn build(self) -> Result<ActivityGraph, ValidationError> {
        ActivityGraph::build(self.name, self.activities)
    }
}

/// Runs every construction check over `activities`.
pub(crate) fn validate(graph: &str, activities: &[ActivitySpec]) -> Result<(), ValidationError> {
    if activities.is_empty() {
        return Err(ValidationError::EmptyGraph {
            graph: graph.to_string(),
        });
    }

    for spec in activities {
        if !is_valid_name(&spec.name) {
            return Err(ValidationError::InvalidName {
                name: spec.name.clone(),
            });
        }
        spec.policy.validate(&spec.name)?;
    }

    let mut by_name: HashMap<&str, &ActivitySpec> = HashMap::with_capacity(activities.len());
    for spec in activities {
        if by_name.insert(spec.name.as_str(), spec).is_some() {
            return Err(ValidationError::DuplicateActivityName {
                name: spec.name.clone(),
            });
        }
    }

    for spec in activities {
        for dep in spec.dependency_names() {
            if !by_name.contains_key(dep) {
                return Err(ValidationError::UnknownDependency {
                    activity: spec.name.clone(),
                    dependency: dep.to_string(),
                });
            }
        }
    }

    detect_cycles(activities, &by_name)
}

fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
}

/// Depth-first search in input order, tracking the currently visiting path.
fn detect_cycles(
    activities: &[ActivitySpec],
    by_name: &HashMap<&str, &ActivitySpec>,
) -> Result<(), ValidationError> {
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    let mut path = Vec::new();

    for spec in activities {
        if !visited.contains(spec.name.as_str()) {
            if let Some(cycle) =
                dfs_cycle(&spec.name, by_name, &mut visited, &mut visiting, &mut path)
            {
                return Err(ValidationError::CyclicDependency { cycle });
            }
        }
    }

    Ok(())
}

fn dfs_cycle<'a>(
    node: &'a str,
    by_name: &HashMap<&'a str, &'a ActivitySpec>,
    visited: &mut HashSet<&'a str>,
    visiting: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    visiting.insert(node);
    path.push(node);

    if let Some(&spec) = by_name.get(node) {
        for dep in spec.dependency_names() {
            if visiting.contains(dep) {
                let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| (*n).to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = dfs_cycle(dep, by_name, visited, visiting, path) {
                    return Some(cycle);
                }
            }
        }
    }

    path.pop();
    visiting.remove(node);
    None
}
