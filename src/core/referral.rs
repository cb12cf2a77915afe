/// Referral data model
///
/// One referral is one patient transfer request sent to a receiving facility.
/// The JSON shape matches the day snapshot and the JSON export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workflow status of a referral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Prealert,
    Accepted,
    Enroute,
    ArriveDest,
    Handover,
    Rejected,
}

impl Status {
    pub fn all() -> &'static [Status] {
        &[
            Status::Prealert,
            Status::Accepted,
            Status::Enroute,
            Status::ArriveDest,
            Status::Handover,
            Status::Rejected,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Prealert => "PREALERT",
            Status::Accepted => "ACCEPTED",
            Status::Enroute => "ENROUTE",
            Status::ArriveDest => "ARRIVE_DEST",
            Status::Handover => "HANDOVER",
            Status::Rejected => "REJECTED",
        }
    }

    /// Sort rank used by the incoming queue
    pub fn rank(&self) -> u8 {
        match self {
            Status::Prealert => 0,
            Status::Accepted => 1,
            Status::Enroute => 2,
            Status::ArriveDest => 3,
            Status::Handover => 4,
            Status::Rejected => 5,
        }
    }

    /// Statuses shown in the incoming queue
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Status::Prealert | Status::Accepted | Status::Enroute | Status::ArriveDest
        )
    }

    /// Not yet at the door
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Status::Prealert | Status::Accepted | Status::Enroute)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Handover | Status::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::all()
            .iter()
            .copied()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriageColor {
    Red,
    Yellow,
    Green,
}

impl TriageColor {
    pub fn all() -> &'static [TriageColor] {
        &[TriageColor::Red, TriageColor::Yellow, TriageColor::Green]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriageColor::Red => "RED",
            TriageColor::Yellow => "YELLOW",
            TriageColor::Green => "GREEN",
        }
    }
}

impl fmt::Display for TriageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport priority, ordered STAT first in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    #[serde(rename = "STAT")]
    Stat,
    #[default]
    Urgent,
    Routine,
}

impl Priority {
    pub fn all() -> &'static [Priority] {
        &[Priority::Routine, Priority::Urgent, Priority::Stat]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Stat => "STAT",
            Priority::Urgent => "Urgent",
            Priority::Routine => "Routine",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Priority::Stat => 0,
            Priority::Urgent => 1,
            Priority::Routine => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum AmbulanceType {
    #[serde(rename = "BLS")]
    Bls,
    #[serde(rename = "ALS")]
    Als,
    #[serde(rename = "ALS + Vent")]
    AlsVent,
    Neonatal,
    Other,
}

impl AmbulanceType {
    pub fn all() -> &'static [AmbulanceType] {
        &[
            AmbulanceType::Bls,
            AmbulanceType::Als,
            AmbulanceType::AlsVent,
            AmbulanceType::Neonatal,
            AmbulanceType::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AmbulanceType::Bls => "BLS",
            AmbulanceType::Als => "ALS",
            AmbulanceType::AlsVent => "ALS + Vent",
            AmbulanceType::Neonatal => "Neonatal",
            AmbulanceType::Other => "Other",
        }
    }
}

impl fmt::Display for AmbulanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presenting complaint, doubles as the case type in analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseType {
    Maternal,
    Trauma,
    Stroke,
    Cardiac,
    Sepsis,
    Other,
}

impl CaseType {
    pub fn all() -> &'static [CaseType] {
        &[
            CaseType::Maternal,
            CaseType::Trauma,
            CaseType::Stroke,
            CaseType::Cardiac,
            CaseType::Sepsis,
            CaseType::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseType::Maternal => "Maternal",
            CaseType::Trauma => "Trauma",
            CaseType::Stroke => "Stroke",
            CaseType::Cardiac => "Cardiac",
            CaseType::Sepsis => "Sepsis",
            CaseType::Other => "Other",
        }
    }

    /// Working diagnosis attached to seeded referrals
    pub fn default_diagnosis(&self) -> &'static str {
        match self {
            CaseType::Maternal => "Postpartum haemorrhage",
            CaseType::Trauma => "Head injury, possible SDH",
            CaseType::Stroke => "Acute ischemic stroke",
            CaseType::Cardiac => "Suspected STEMI",
            CaseType::Sepsis => "Sepsis, hypotension",
            CaseType::Other => "Acute respiratory failure",
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert / Voice / Pain / Unresponsive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Avpu {
    #[default]
    A,
    V,
    P,
    U,
}

impl Avpu {
    pub fn all() -> &'static [Avpu] {
        &[Avpu::A, Avpu::V, Avpu::P, Avpu::U]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Avpu::A => "A",
            Avpu::V => "V",
            Avpu::P => "P",
            Avpu::U => "U",
        }
    }
}

impl fmt::Display for Avpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Avpu {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Avpu::A),
            "V" => Ok(Avpu::V),
            "P" => Ok(Avpu::P),
            "U" => Ok(Avpu::U),
            other => Err(format!("AVPU must be one of A, V, P, U (got '{}')", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => f.write_str("Male"),
            Sex::Female => f.write_str("Female"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    pub age: u8,
    pub sex: Sex,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referrer {
    pub name: String,
    pub facility: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionalDx {
    pub code: String,
    pub label: Option<String>,
    pub case_type: CaseType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageDecision {
    pub color: TriageColor,
}

/// Triage assessment made by the referrer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triage {
    pub complaint: CaseType,
    pub decision: TriageDecision,
    pub hr: u16,
    pub sbp: u16,
    pub rr: u16,
    pub temp: f64,
    pub spo2: u16,
    pub avpu: Avpu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    #[serde(default)]
    pub priority: Priority,
    pub ambulance: Option<AmbulanceType>,
    pub eta_min: Option<u32>,
}

/// Workflow timestamps; absent until the referral reaches that step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Times {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_contact_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enroute_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrive_dest_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handover_ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    pub timestamp: DateTime<Utc>,
    pub hr: u16,
    pub sbp: u16,
    pub rr: u16,
    pub spo2: u16,
    pub temp: f64,
    pub avpu: Avpu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: String,
    pub patient: Patient,
    pub referrer: Referrer,
    #[serde(rename = "provisionalDx")]
    pub provisional_dx: ProvisionalDx,
    pub triage: Triage,
    pub dest: String,
    pub transport: Transport,
    #[serde(default)]
    pub resuscitation: Vec<Intervention>,
    #[serde(default)]
    pub interventions: Vec<Intervention>,
    #[serde(default)]
    pub vitals_history: Vec<VitalsRecord>,
    pub times: Times,
    pub status: Status,
    #[serde(default)]
    pub audit_log: Vec<AuditEntry>,
}

impl Referral {
    pub fn triage_color(&self) -> TriageColor {
        self.triage.decision.color
    }

    /// Most recent recorded vitals, falling back to the referrer's triage set
    pub fn latest_vitals(&self) -> VitalsRecord {
        if let Some(last) = self.vitals_history.last() {
            return last.clone();
        }

        VitalsRecord {
            timestamp: self
                .times
                .first_contact_ts
                .unwrap_or_else(Utc::now),
            hr: self.triage.hr,
            sbp: self.triage.sbp,
            rr: self.triage.rr,
            spo2: self.triage.spo2,
            temp: self.triage.temp,
            avpu: self.triage.avpu,
        }
    }

    /// Case-insensitive match over the fields staff search by
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.patient.name.to_lowercase().contains(&query)
            || self.id.to_lowercase().contains(&query)
            || self.referrer.facility.to_lowercase().contains(&query)
            || self.triage.complaint.as_str().to_lowercase().contains(&query)
    }
}
