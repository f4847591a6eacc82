//! Crewline pipeline runner.
//!
//! This crate drives a validated [`pipeline::Pipeline`] through one [`pipeline::Run`]:
//! it resolves which task runs next, assembles its context, performs the
//! worker turn against a [`pipeline::Backend`] (mediating every tool call), persists
//! declared output artifacts, and records results.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The runner sequences calls between business logic
//! in the [`pipeline`] crate and the infrastructure ports (backend, tools,
//! artifact store). It contains no transport or filesystem code of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `RunnerConfig`, `RetryConfig` |
//! | [`retry`] | Back-off retry of a single backend round-trip |
//! | [`invocation`] | The worker turn loop and tool-call mediation |
//! | [`persistence`] | Output artifact writes |
//! | [`cancellation`] | Cooperative cancellation token |
//! | [`runner`] | `PipelineRunner` and the run state machine |

pub mod cancellation;
pub mod config;
pub mod invocation;
pub mod persistence;
pub mod retry;
pub mod runner;

pub use cancellation::CancellationToken;
pub use config::{RetryConfig, RunnerConfig};
pub use invocation::{invoke_worker, TurnInput, TurnOutcome};
pub use runner::PipelineRunner;
