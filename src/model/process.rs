//! Process definitions, roles, SLA records, exclusion windows, requests.
//!
//! Read-only to the engine: process/SLA configuration is an administrative
//! concern, consulted during assignment creation and never mutated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The closed set of reviewer roles. External storage carries free-text
/// role names; they are validated into this enum at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Clerk,
    SectionOfficer,
    HeadOfDepartment,
    Administrator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Clerk => "clerk",
            Role::SectionOfficer => "section_officer",
            Role::HeadOfDepartment => "head_of_department",
            Role::Administrator => "administrator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clerk" => Ok(Role::Clerk),
            "section_officer" => Ok(Role::SectionOfficer),
            "head_of_department" => Ok(Role::HeadOfDepartment),
            "administrator" => Ok(Role::Administrator),
            _ => Err(Error::Other(format!("unknown role: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One step in a process's ordered review chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: Uuid,
    pub process_id: Uuid,

    /// Strictly increasing within a process; gaps allowed.
    pub sequence_order: i32,

    /// None means the step is unassigned and skipped for auto-progression.
    pub responsible_role: Option<Role>,

    /// Step-level SLA default. None falls through to SLA records.
    pub default_allowed_seconds: Option<i64>,
}

/// A per-step SLA configuration record, optionally scoped to a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaRecord {
    pub id: Uuid,
    pub step_id: Uuid,
    pub role: Option<Role>,
    pub allowed_seconds: i64,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Exclusion windows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionKind {
    Holiday,
    Weekend,
    Emergency,
}

impl std::fmt::Display for ExclusionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExclusionKind::Holiday => "holiday",
            ExclusionKind::Weekend => "weekend",
            ExclusionKind::Emergency => "emergency",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExclusionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "holiday" => Ok(ExclusionKind::Holiday),
            "weekend" => Ok(ExclusionKind::Weekend),
            "emergency" => Ok(ExclusionKind::Emergency),
            _ => Err(Error::Other(format!("unknown exclusion kind: {s}"))),
        }
    }
}

/// A configured time range that extends the effective SLA allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionWindow {
    pub id: Uuid,
    pub kind: ExclusionKind,

    /// None applies the window to every step.
    pub step_id: Option<Uuid>,

    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
}

impl ExclusionWindow {
    pub fn overlaps(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }

    pub fn applies_to(&self, step_id: Uuid) -> bool {
        self.step_id.is_none() || self.step_id == Some(step_id)
    }

    /// Window length in whole seconds, clamped at zero for inverted ranges.
    pub fn duration_seconds(&self) -> i64 {
        (self.ends_at - self.starts_at).num_seconds().max(0)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    InProgress,
    Completed,
    Rejected,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(RequestStatus::InProgress),
            "completed" => Ok(RequestStatus::Completed),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(Error::Other(format!("unknown request status: {s}"))),
        }
    }
}

/// A citizen-submitted request routed through a process's step chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub process_id: Uuid,
    pub title: String,
    pub submitted_by: Uuid,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}
