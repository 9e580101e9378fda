//! # idv-flow — Client-Side Verification Workflow Engine
//!
//! Sequences one identity-verification session against the remote service:
//! start, front document, optional back document, cross-validation, live
//! selfie, final result. The remote service does the actual identity
//! decisions; this crate owns ordering, polling and result derivation.
//!
//! ## Components
//!
//! - **Steps** (`step.rs`): the fixed `StepId` ordering, session `StatusId`
//!   and the terminal `Outcome`.
//!
//! - **State** (`state.rs`, `manager.rs`): the `VerificationState` snapshot
//!   and the `StateManager` that owns it. Mutations are typed and keep the
//!   session invariants (monotonic step, write-once cross-validation and
//!   final result). Every change is published on a `watch` channel.
//!
//! - **Polling** (`polling.rs`): `PollingCoordinator` runs at most one
//!   status poll loop at a time, with per-phase interval, timeout and
//!   transport retry budget.
//!
//! - **Outcome** (`outcome.rs`): pure functions turning status snapshots
//!   into cross-validation verdicts and final results.
//!
//! - **Workflow** (`workflow.rs`): `WorkflowController`, the async state
//!   machine the UI calls into.
//!
//! ## Design
//!
//! The controller never recurses into itself. A poll phase that leads to
//! another (document processed, then cross-validation) is driven by a loop
//! inside the operation that started it, so every operation returns once
//! the session is waiting on the user again, has finished, or has failed.
//! A server-declared terminal status always wins over anything the client
//! could compute from scores.

pub mod config;
pub mod error;
pub mod manager;
pub mod outcome;
pub mod polling;
pub mod state;
pub mod step;
pub mod workflow;

// ─── Configuration ──────────────────────────────────────────────────

pub use config::{PollPhase, PollPolicies, PollPolicy, WorkflowConfig};

// ─── Errors ─────────────────────────────────────────────────────────

pub use error::{ErrorKind, StateError, SurfacedError, WorkflowError};

// ─── State ──────────────────────────────────────────────────────────

pub use manager::StateManager;
pub use state::{
    CrossValidationState, DocumentSlot, Documents, FinalResult, LiveCaptureState, Stall,
    StallCause, TransitionRecord, VerificationState,
};
pub use step::{Outcome, StatusId, StepId};

// ─── Polling and results ────────────────────────────────────────────

pub use outcome::{
    cross_validation_verdict, derive_final, server_decision, CrossValidationVerdict,
    NO_FINAL_DECISION,
};
pub use polling::{DonePredicate, PollCanceller, PollHandle, PollOutcome, PollingCoordinator};
pub use workflow::WorkflowController;
