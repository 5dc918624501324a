//! Node lifecycle state machine.
//!
//! A pure transition table. The agent consults it while holding its
//! per-node lock, so checking and committing a transition is a single
//! compare-and-transition step.
//!
//! ```text
//! Uninitialized ──create──▶ Founder ─┐
//!      │                             ├─shutdown─▶ ShuttingDown
//!      └────────join──────▶ Member  ─┘                 │
//!                             │                        │
//!                             └──────destroy──────▶ Destroyed ◀─┘
//! ```
//!
//! `Destroyed` accepts a fresh `create`/`join`, which starts a new
//! lifecycle instance on the same host.

use clusterd_state::LifecycleState;

use crate::error::{ClusterError, ClusterResult};

/// A command that drives the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create,
    Join,
    Shutdown,
    Destroy,
}

/// Outcome of a legal command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(LifecycleState),
    /// Legal, but nothing changes (idempotent destroy).
    NoOp,
}

impl Transition {
    /// State after applying this transition to a node in `from`.
    pub fn target(self, from: LifecycleState) -> LifecycleState {
        match self {
            Self::To(state) => state,
            Self::NoOp => from,
        }
    }
}

/// Decide what `command` does to a node in `state`.
pub fn next(state: LifecycleState, command: Command) -> ClusterResult<Transition> {
    use LifecycleState::*;

    match (command, state) {
        (Command::Create, Uninitialized | Destroyed) => Ok(Transition::To(Founder)),
        (Command::Create, _) => Err(ClusterError::AlreadyInitialized(format!(
            "create refused in state {state}"
        ))),

        (Command::Join, Uninitialized | Destroyed) => Ok(Transition::To(Member)),
        (Command::Join, _) => Err(ClusterError::AlreadyMember(format!(
            "join refused in state {state}"
        ))),

        (Command::Shutdown, Founder | Member) => Ok(Transition::To(ShuttingDown)),
        (Command::Shutdown, _) => Err(ClusterError::NotActive(format!(
            "shutdown refused in state {state}"
        ))),

        (Command::Destroy, Founder | Member | ShuttingDown) => Ok(Transition::To(Destroyed)),
        (Command::Destroy, Uninitialized | Destroyed) => Ok(Transition::NoOp),
    }
}
