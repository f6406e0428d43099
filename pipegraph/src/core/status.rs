//! Activity state and dependency condition enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The run-time state of an activity.
///
/// ```text
/// Pending -> Ready -> Running -> {Succeeded, Failed}
/// Pending -> Skipped
/// Ready   -> Skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// Waiting on dependencies.
    #[default]
    Pending,
    /// All dependencies satisfied, waiting for a slot.
    Ready,
    /// Executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Never executed because a dependency could not be satisfied or the run was aborted.
    Skipped,
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl ActivityState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Returns true if the transition `self -> next` is allowed.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Ready | Self::Skipped)
                | (Self::Ready, Self::Running | Self::Skipped)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

/// Upstream outcome a dependency requires before its downstream may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCondition {
    /// Upstream ended `Succeeded`.
    #[default]
    Succeeded,
    /// Upstream ended `Failed`.
    Failed,
    /// Upstream ended `Succeeded` or `Failed`.
    Completed,
    /// Upstream ended `Skipped`.
    Skipped,
}

impl DependencyCondition {
    /// Returns true if a terminal upstream state satisfies this condition.
    #[must_use]
    pub fn is_satisfied_by(&self, state: ActivityState) -> bool {
        match self {
            Self::Succeeded => state == ActivityState::Succeeded,
            Self::Failed => state == ActivityState::Failed,
            Self::Completed => {
                matches!(state, ActivityState::Succeeded | ActivityState::Failed)
            }
            Self::Skipped => state == ActivityState::Skipped,
        }
    }

    /// Returns the spelling used in pipeline definition documents.
    #[must_use]
    pub fn as_definition_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Completed => "Completed",
            Self::Skipped => "Skipped",
        }
    }
}

impl fmt::Display for DependencyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_definition_str())
    }
}

impl FromStr for DependencyCondition {
    type Err = crate::errors::DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(crate::errors::DefinitionError::UnknownCondition(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ActivityState::Pending.to_string(), "pending");
        assert_eq!(ActivityState::Succeeded.to_string(), "succeeded");
        assert_eq!(ActivityState::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_state_is_terminal() {
        assert!(ActivityState::Succeeded.is_terminal());
        assert!(ActivityState::Failed.is_terminal());
        assert!(ActivityState::Skipped.is_terminal());
        assert!(!ActivityState::Pending.is_terminal());
        assert!(!ActivityState::Ready.is_terminal());
        assert!(!ActivityState::Running.is_terminal());
    }

    #[test]
    fn test_allowed_transitions() {
        use ActivityState::*;
        assert!(Pending.can_transition_to(Ready));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Ready.can_transition_to(Running));
        assert!(Ready.can_transition_to(Skipped));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Running));
        assert!(!Running.can_transition_to(Skipped));
        for terminal in [Succeeded, Failed, Skipped] {
            for next in [Pending, Ready, Running, Succeeded, Failed, Skipped] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_condition_satisfaction() {
        use ActivityState as S;
        assert!(DependencyCondition::Succeeded.is_satisfied_by(S::Succeeded));
        assert!(!DependencyCondition::Succeeded.is_satisfied_by(S::Failed));
        assert!(!DependencyCondition::Succeeded.is_satisfied_by(S::Skipped));
        assert!(DependencyCondition::Failed.is_satisfied_by(S::Failed));
        assert!(DependencyCondition::Completed.is_satisfied_by(S::Succeeded));
        assert!(DependencyCondition::Completed.is_satisfied_by(S::Failed));
        assert!(!DependencyCondition::Completed.is_satisfied_by(S::Skipped));
        assert!(DependencyCondition::Skipped.is_satisfied_by(S::Skipped));
    }

    #[test]
    fn test_condition_parse() {
        assert_eq!(
            "Succeeded".parse::<DependencyCondition>().unwrap(),
            DependencyCondition::Succeeded
        );
        assert_eq!(
            "completed".parse::<DependencyCondition>().unwrap(),
            DependencyCondition::Completed
        );
        assert!("Finished".parse::<DependencyCondition>().is_err());
    }

    #[test]
    fn test_state_serialize() {
        let json = serde_json::to_string(&ActivityState::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);

        let state: ActivityState = serde_json::from_str(r#""skipped""#).unwrap();
        assert_eq!(state, ActivityState::Skipped);
    }
}
