/// Referral status workflow
///
/// PREALERT -> ACCEPTED -> ENROUTE -> ARRIVE_DEST -> HANDOVER, with REJECTED
/// reachable from any active status. Every accepted action leaves an audit entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{DeskError, Result};
use crate::core::referral::{AuditEntry, Referral, Status};

/// Why the receiving desk turned a referral down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RejectReason {
    #[serde(rename = "No ICU bed")]
    NoIcuBed,
    #[serde(rename = "No specialist")]
    NoSpecialist,
    #[serde(rename = "Equipment down")]
    EquipmentDown,
    #[serde(rename = "Over capacity")]
    OverCapacity,
    #[serde(rename = "Outside scope")]
    OutsideScope,
    #[serde(rename = "Patient diverted")]
    PatientDiverted,
}

impl RejectReason {
    pub fn all() -> &'static [RejectReason] {
        &[
            RejectReason::NoIcuBed,
            RejectReason::NoSpecialist,
            RejectReason::EquipmentDown,
            RejectReason::OverCapacity,
            RejectReason::OutsideScope,
            RejectReason::PatientDiverted,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NoIcuBed => "No ICU bed",
            RejectReason::NoSpecialist => "No specialist",
            RejectReason::EquipmentDown => "Equipment down",
            RejectReason::OverCapacity => "Over capacity",
            RejectReason::OutsideScope => "Outside scope",
            RejectReason::PatientDiverted => "Patient diverted",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectReason {
    type Err = DeskError;

    /// Accepts the display text ("No ICU bed") or a dashed slug ("no-icu-bed")
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', " ");
        RejectReason::all()
            .iter()
            .copied()
            .find(|r| r.as_str().to_lowercase() == wanted)
            .ok_or_else(|| {
                let options: Vec<&str> = RejectReason::all().iter().map(|r| r.as_str()).collect();
                DeskError::invalid(format!(
                    "unknown reject reason '{}' (expected one of: {})",
                    s,
                    options.join(", ")
                ))
            })
    }
}

/// Same spellings as `FromStr`
impl<'de> Deserialize<'de> for RejectReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Status changes the receiving desk can make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    EnRoute,
    Arrive,
    Handover,
    Reject(RejectReason),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::EnRoute => "mark en route",
            Action::Arrive => "mark arrived",
            Action::Handover => "hand over",
            Action::Reject(_) => "reject",
        }
    }

    /// Status the referral ends up in
    pub fn target(&self) -> Status {
        match self {
            Action::Accept => Status::Accepted,
            Action::EnRoute => Status::Enroute,
            Action::Arrive => Status::ArriveDest,
            Action::Handover => Status::Handover,
            Action::Reject(_) => Status::Rejected,
        }
    }

    /// Whether the action is offered for a referral in `status`
    pub fn allowed_from(&self, status: Status) -> bool {
        match self {
            Action::Accept => matches!(status, Status::Prealert | Status::Accepted),
            Action::EnRoute => matches!(
                status,
                Status::Prealert | Status::Accepted | Status::Enroute
            ),
            Action::Arrive => matches!(status, Status::Enroute | Status::ArriveDest),
            Action::Handover => status == Status::ArriveDest,
            Action::Reject(_) => status.is_active(),
        }
    }
}

/// Apply an action to a referral at time `now`
///
/// Leaves the referral untouched when the action is not allowed.
pub fn apply(referral: &mut Referral, action: Action, now: DateTime<Utc>) -> Result<()> {
    if !action.allowed_from(referral.status) {
        return Err(DeskError::InvalidTransition {
            id: referral.id.clone(),
            action: action.name(),
            status: referral.status,
        });
    }

    let mut reason = None;
    match action {
        Action::Accept => {
            // Re-accepting only re-stamps the audit log
            referral.status = Status::Accepted;
        }
        Action::EnRoute => {
            referral.status = Status::Enroute;
            referral.times.dispatch_ts.get_or_insert(now);
            referral.times.enroute_ts = Some(now);
        }
        Action::Arrive => {
            referral.status = Status::ArriveDest;
            referral.times.arrive_dest_ts = Some(now);
        }
        Action::Handover => {
            referral.status = Status::Handover;
            referral.times.handover_ts = Some(now);
        }
        Action::Reject(r) => {
            referral.status = Status::Rejected;
            reason = Some(r.as_str().to_string());
        }
    }

    referral.audit_log.push(AuditEntry {
        ts: now,
        action: action.target().as_str().to_string(),
        reason,
    });

    Ok(())
}
