//! The native PIM applications Fae can drive.
//!
//! Each [`PimApp`] variant names one scriptable macOS application. The
//! variant is the unit of access gating (one automation permission per app),
//! of per-app dispatch serialization in the invoker, and of module readiness
//! in the safe-mode loader.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A native personal-information-management application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PimApp {
    /// Address book.
    Contacts,
    /// Calendar events.
    Calendar,
    /// Notes.
    Notes,
    /// Reminders and reminder lists.
    Reminders,
    /// Mail.
    Mail,
    /// Messages (iMessage / SMS).
    Messages,
    /// Maps.
    Maps,
}

impl PimApp {
    /// Return all application variants.
    pub fn all() -> &'static [PimApp] {
        &[
            PimApp::Contacts,
            PimApp::Calendar,
            PimApp::Notes,
            PimApp::Reminders,
            PimApp::Mail,
            PimApp::Messages,
            PimApp::Maps,
        ]
    }

    /// The name used in `tell application "..."` and in user-facing text.
    pub fn application_name(self) -> &'static str {
        match self {
            PimApp::Contacts => "Contacts",
            PimApp::Calendar => "Calendar",
            PimApp::Notes => "Notes",
            PimApp::Reminders => "Reminders",
            PimApp::Mail => "Mail",
            PimApp::Messages => "Messages",
            PimApp::Maps => "Maps",
        }
    }

    /// The integration module key used by the loader.
    pub fn module_name(self) -> &'static str {
        match self {
            PimApp::Contacts => "contacts",
            PimApp::Calendar => "calendar",
            PimApp::Notes => "notes",
            PimApp::Reminders => "reminders",
            PimApp::Mail => "mail",
            PimApp::Messages => "messages",
            PimApp::Maps => "maps",
        }
    }
}

impl fmt::Display for PimApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.application_name())
    }
}

impl FromStr for PimApp {
    type Err = AppParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contacts" | "address book" => Ok(PimApp::Contacts),
            "calendar" | "ical" => Ok(PimApp::Calendar),
            "notes" => Ok(PimApp::Notes),
            "reminders" => Ok(PimApp::Reminders),
            "mail" => Ok(PimApp::Mail),
            "messages" | "imessage" => Ok(PimApp::Messages),
            "maps" => Ok(PimApp::Maps),
            _ => Err(AppParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an unknown application name.
#[derive(Debug, Clone)]
pub struct AppParseError(pub String);

impl fmt::Display for AppParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown application: {:?}", self.0)
    }
}

impl std::error::Error for AppParseError {}

impl From<AppParseError> for crate::error::PimError {
    fn from(e: AppParseError) -> Self {
        crate::error::PimError::InvalidInput(e.to_string())
    }
}
