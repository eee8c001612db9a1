//! Finite State Machine for a single container redeploy

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Executor settings
#[derive(Debug, Clone)]
pub struct FsmSettings {
    /// Timeout for login, stop, remove, run and prune calls
    pub stage_timeout: Duration,

    /// Timeout for the image pull, which can be much slower
    pub pull_timeout: Duration,

    /// Prune dangling images after a successful run
    pub prune_images: bool,
}

impl Default for FsmSettings {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(120),
            pull_timeout: Duration::from_secs(600),
            prune_images: true,
        }
    }
}

/// Non-terminal deploy stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Pending,
    Pulling,
    Stopping,
    Removing,
    Starting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "Pending",
            Stage::Pulling => "Pulling",
            Stage::Stopping => "Stopping",
            Stage::Removing => "Removing",
            Stage::Starting => "Starting",
        };
        f.write_str(name)
    }
}

/// Deploy state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployState {
    /// In flight
    Active(Stage),

    /// New container is running
    Succeeded,

    /// Absorbing failure state
    Failed { stage: Stage, reason: String },
}

/// Deploy event
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Job admitted, start pulling (login included)
    Begin,

    /// Image pulled
    Pulled,

    /// Old container stopped or absent
    Stopped,

    /// Old container removed or absent
    Removed,

    /// New container launched
    Started,

    /// The current stage failed
    Fail(String),
}

/// Deploy FSM
#[derive(Debug, Clone)]
pub struct DeployFsm {
    state: DeployState,
}

impl DeployFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeployState::Active(Stage::Pending),
        }
    }

    /// Get current state
    pub fn state(&self) -> &DeployState {
        &self.state
    }

    /// Current stage, or the stage the job failed in
    pub fn stage(&self) -> Option<Stage> {
        match &self.state {
            DeployState::Active(stage) => Some(*stage),
            DeployState::Failed { stage, .. } => Some(*stage),
            DeployState::Succeeded => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, DeployState::Active(_))
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeployEvent) -> Result<(), String> {
        let new_state = match (&self.state, event) {
            (DeployState::Active(Stage::Pending), DeployEvent::Begin) => {
                DeployState::Active(Stage::Pulling)
            }
            (DeployState::Active(Stage::Pulling), DeployEvent::Pulled) => {
                DeployState::Active(Stage::Stopping)
            }
            (DeployState::Active(Stage::Stopping), DeployEvent::Stopped) => {
                DeployState::Active(Stage::Removing)
            }
            (DeployState::Active(Stage::Removing), DeployEvent::Removed) => {
                DeployState::Active(Stage::Starting)
            }
            (DeployState::Active(Stage::Starting), DeployEvent::Started) => DeployState::Succeeded,

            (DeployState::Active(stage), DeployEvent::Fail(reason)) => DeployState::Failed {
                stage: *stage,
                reason,
            },

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for DeployFsm {
    fn default() -> Self {
        Self::new()
    }
}
