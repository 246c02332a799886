//! Control service lifecycle state machine
//!
//! Transitions are owned by this object alone; external callers request
//! one and either succeed or get `IllegalState` back. The state is
//! published through a watch channel so the supervisor can detect
//! startup failure without polling.

use std::fmt;

use tokio::sync::watch;

use crate::error::{Error, Result};

/// Observable state of the control service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Booting,
    Running,
    Reloading,
    Stopping,
    Stopped,
    Error(String),
}

impl ServiceState {
    fn can_transition_to(&self, next: &ServiceState) -> bool {
        matches!(
            (self, next),
            (Self::Booting, Self::Running)
                | (Self::Booting, Self::Error(_))
                | (Self::Running, Self::Reloading)
                | (Self::Running, Self::Stopping)
                | (Self::Running, Self::Error(_))
                | (Self::Reloading, Self::Running)
                | (Self::Reloading, Self::Stopping)
                | (Self::Reloading, Self::Error(_))
                | (Self::Stopping, Self::Stopped)
                | (Self::Stopping, Self::Error(_))
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booting => write!(f, "booting"),
            Self::Running => write!(f, "running"),
            Self::Reloading => write!(f, "reloading"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error(detail) => write!(f, "error: {}", detail),
        }
    }
}

/// Single owner of the control service's state transitions.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<ServiceState>,
}

impl Lifecycle {
    /// A new lifecycle in `Booting`.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ServiceState::Booting);
        Self { state }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ServiceState {
        self.state.borrow().clone()
    }

    /// Observe state changes without polling.
    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }

    /// Whether the service currently accepts configuration updates.
    pub fn accepts_updates(&self) -> bool {
        matches!(*self.state.borrow(), ServiceState::Running)
    }

    /// Request a transition. Illegal requests fail and leave the state
    /// untouched.
    pub fn transition(&self, next: ServiceState) -> Result<()> {
        let mut result = Ok(());
        self.state.send_modify(|current| {
            if current.can_transition_to(&next) {
                tracing::debug!(from = %current, to = %next, "control service state change");
                *current = next.clone();
            } else {
                result = Err(Error::illegal_state(current.to_string(), next.to_string()));
            }
        });
        result
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
