//! # idv-cli — Verification Workflow Command-Line Interface
//!
//! Hosts the `idv-flow` engine outside a UI: runs a complete verification
//! session from image files on disk, and exposes the read-only API calls
//! for inspecting sessions and the service.
//!
//! ## Subcommands
//!
//! - `verify` — start a session, upload documents and a selfie, print the
//!   final state as JSON
//! - `status` — print the status snapshot (or comprehensive results) of a
//!   session
//! - `health` — check that the API is reachable
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | verified, or command succeeded |
//! | 1 | error (configuration, input, transport, timeout) |
//! | 2 | verification failed |
//! | 3 | sent to manual review |
//!
//! ## Crate Policy
//!
//! - Argument parsing lives with each subcommand; `main.rs` only assembles
//!   and dispatches.
//! - Handlers delegate to `idv-flow` and `idv-client`; no workflow logic
//!   here.
//! - Results go to stdout as JSON. Logs go to stderr.

pub mod settings;
pub mod status;
pub mod verify;
