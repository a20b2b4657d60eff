//! Fae PIM: permission-gated, timeout-bounded access to native macOS
//! personal-information-management applications.
//!
//! The crate sits between an agent's tool layer and the host's scriptable
//! applications (Contacts, Calendar, Notes, Reminders, Mail, Messages,
//! Maps):
//!
//! - **Native dispatch** ([`native`]): every script runs under a time budget,
//!   serialized per application, with failures tagged where they happen.
//! - **Access gating** ([`access`]): a cheap identity probe before every real
//!   operation, producing actionable remediation text when automation
//!   permission is missing.
//! - **Safe-mode loading** ([`loader`]): eager bulk initialization raced
//!   against a timeout, falling back to single-flight per-module loading so
//!   one hung application never blocks the rest.
//! - **Contact resolution** ([`contacts`]): a six-stage fuzzy name-matching
//!   chain and phone-number normalization.
//! - **Messages** ([`messages`]): immediate and in-process scheduled sends.
//!
//! [`runtime::PimRuntime`] wires these together; [`host`] exposes them over a
//! newline-delimited JSON bridge.

pub mod access;
pub mod apps;
pub mod config;
pub mod contacts;
pub mod error;
pub mod host;
pub mod loader;
pub mod messages;
pub mod modules;
pub mod native;
pub mod pim_dirs;
pub mod runtime;

pub use access::{AccessCheckResult, AccessGate};
pub use apps::PimApp;
pub use config::PimConfig;
pub use contacts::{ContactRecord, ContactResolver, NormalizedPhone};
pub use error::{ErrorKind, PimError, Result};
pub use loader::{LoaderPhase, ModuleState, SafeModeLoader};
pub use messages::ScheduledAction;
pub use runtime::PimRuntime;
