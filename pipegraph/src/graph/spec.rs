//! Activity specifications.

use super::ActivityPolicy;
use crate::core::{ActivityState, ComputeSpec, DependencyCondition, TaskRef};
use serde::{Deserialize, Serialize};

/// An upstream dependency of an activity.
///
/// The dependency is satisfied when the upstream's terminal state matches
/// any of its conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// Name of the upstream activity.
    pub activity: String,
    /// Accepted upstream outcomes.
    pub conditions: Vec<DependencyCondition>,
}

impl Dependency {
    /// Creates a dependency with a single required outcome.
    #[must_use]
    pub fn new(activity: impl Into<String>, condition: DependencyCondition) -> Self {
        Self {
            activity: activity.into(),
            conditions: vec![condition],
        }
    }

    /// Creates a dependency requiring the upstream to succeed.
    #[must_use]
    pub fn succeeded(activity: impl Into<String>) -> Self {
        Self::new(activity, DependencyCondition::Succeeded)
    }

    /// Adds another accepted outcome.
    #[must_use]
    pub fn or(mut self, condition: DependencyCondition) -> Self {
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
        self
    }

    /// Returns true if the upstream's terminal state satisfies the dependency.
    ///
    /// An empty condition list behaves like `Succeeded`.
    #[must_use]
    pub fn is_satisfied_by(&self, state: ActivityState) -> bool {
        if self.conditions.is_empty() {
            return DependencyCondition::Succeeded.is_satisfied_by(state);
        }
        self.conditions.iter().any(|c| c.is_satisfied_by(state))
    }
}

/// Specification for a single activity in a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySpec {
    /// The unique name of the activity.
    pub name: String,
    /// The unit of work the executor runs.
    pub task: TaskRef,
    /// Upstream dependencies, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Timeout and retry policy.
    #[serde(default)]
    pub policy: ActivityPolicy,
    /// Optional compute sizing hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeSpec>,
    /// Whether ending `Skipped` still counts as success for the run.
    #[serde(default)]
    pub allow_skip: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ActivitySpec {
    /// Creates a new activity specification with the default policy.
    #[must_use]
    pub fn new(name: impl Into<String>, task: TaskRef) -> Self {
        Self {
            name: name.into(),
            task,
            dependencies: Vec::new(),
            policy: ActivityPolicy::default(),
            compute: None,
            allow_skip: false,
            description: None,
        }
    }

    /// Adds a dependency that requires the upstream to succeed.
    #[must_use]
    pub fn depends_on(self, activity: impl Into<String>) -> Self {
        self.with_dependency(Dependency::succeeded(activity))
    }

    /// Adds a dependency with an explicit required outcome.
    #[must_use]
    pub fn depends_on_with(self, activity: impl Into<String>, condition: DependencyCondition) -> Self {
        self.with_dependency(Dependency::new(activity, condition))
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Sets the policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ActivityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the compute hint.
    #[must_use]
    pub fn with_compute(mut self, compute: ComputeSpec) -> Self {
        self.compute = Some(compute);
        self
    }

    /// Lets the activity end `Skipped` without failing the run.
    #[must_use]
    pub fn allow_skip(mut self) -> Self {
        self.allow_skip = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Iterates over upstream activity names.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.activity.as_str())
    }
}
