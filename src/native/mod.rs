//! Native automation boundary.
//!
//! Everything that touches the host's scripting subsystem goes through this
//! module:
//!
//! - [`runner`]: the [`ScriptRunner`] trait (text in, text out) and the
//!   production [`OsascriptRunner`]
//! - [`invoker`]: the [`Invoker`], which bounds every dispatch with a time
//!   budget, serializes dispatches per application, and classifies the
//!   result into a [`CommandOutcome`]
//! - [`sentinel`]: parser for `SUCCESS:` / `ERROR:` replies
//! - [`script`]: literal quoting, defensive [`Limits`], [`NativeCommand`]
//! - [`mock`]: an in-process runner for tests
//!
//! # Known risk: no atomicity, no cancellation
//!
//! A dispatch that the invoker reports as failed (including a timeout) may
//! already have changed state inside the target application.  A timed-out
//! script is abandoned, not killed: the native side may still finish and
//! apply its effect later.  Write operations therefore have
//! at-most-effectively-once semantics from the caller's point of view.

pub mod invoker;
pub mod mock;
pub mod outcome;
pub mod runner;
pub mod script;
pub mod sentinel;

pub use invoker::Invoker;
pub use outcome::{CommandOutcome, FailureKind, NativeValue};
pub use runner::{OsascriptRunner, RunnerError, ScriptRunner};
pub use script::{Limits, NativeCommand, quote};
pub use sentinel::SentinelReply;
