/// CSV and JSON exports of a facility's day

use chrono::{DateTime, Local, Utc};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{DeskError, Result};
use crate::core::referral::Referral;

pub const CSV_FILE_NAME: &str = "receiving_today.csv";
pub const JSON_FILE_NAME: &str = "receiving_today.json";

const CSV_HEADER: [&str; 12] = [
    "id",
    "status",
    "triage",
    "case_type",
    "priority",
    "ambulance",
    "eta_min",
    "first_contact",
    "decision",
    "dispatch",
    "arrival",
    "handover",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_FILE_NAME,
            ExportFormat::Json => JSON_FILE_NAME,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(DeskError::invalid(format!("unknown export format '{}'", other))),
        }
    }
}

fn local_minute(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "—".to_string())
}

/// One row per referral; an empty view gives an empty buffer (no header)
pub fn to_csv(view: &[&Referral]) -> Result<Vec<u8>> {
    if view.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for r in view {
        let t = &r.times;
        writer.write_record([
            r.id.clone(),
            r.status.to_string(),
            r.triage_color().to_string(),
            r.triage.complaint.to_string(),
            r.transport.priority.to_string(),
            r.transport.ambulance.map(|a| a.to_string()).unwrap_or_default(),
            r.transport.eta_min.map(|m| m.to_string()).unwrap_or_default(),
            local_minute(t.first_contact_ts),
            local_minute(t.decision_ts),
            local_minute(t.dispatch_ts),
            local_minute(t.arrive_dest_ts),
            local_minute(t.handover_ts),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| DeskError::Io(e.into_error()))
}

/// Full referral documents as a pretty JSON array; empty view gives an empty buffer
pub fn to_json(view: &[&Referral]) -> Result<Vec<u8>> {
    if view.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::to_vec_pretty(view)?)
}

pub fn export(view: &[&Referral], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => to_csv(view),
        ExportFormat::Json => to_json(view),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::referral::tests::sample_referral;
    use crate::core::referral::Status;

    #[test]
    fn test_empty_view_is_empty() {
        assert!(to_csv(&[]).unwrap().is_empty());
        assert!(to_json(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_csv_layout() {
        let mut a = sample_referral("AAAA1111", Status::Prealert);
        a.transport.eta_min = None;
        let b = sample_referral("BBBB2222", Status::Enroute);

        let bytes = to_csv(&[&a, &b]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "id,status,triage,case_type,priority,ambulance,eta_min,first_contact,decision,dispatch,arrival,handover"
        );

        let first: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(first[0], "AAAA1111");
        assert_eq!(first[1], "PREALERT");
        assert_eq!(first[2], "RED");
        assert_eq!(first[3], "Maternal");
        assert_eq!(first[4], "STAT");
        assert_eq!(first[5], "ALS");
        assert_eq!(first[6], "");
        assert_eq!(first[9], "—");
        assert_eq!(first[11], "—");

        let expected = local_minute(a.times.first_contact_ts);
        assert_eq!(first[7], expected);
        assert_eq!(expected.len(), "2025-03-14 08:00".len());

        assert!(lines[2].starts_with("BBBB2222,ENROUTE,"));
        assert!(lines[2].contains(",25,"));
    }

    #[test]
    fn test_json_is_array_of_documents() {
        let a = sample_referral("AAAA1111", Status::Accepted);
        let bytes = to_json(&[&a]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "AAAA1111");
        assert!(items[0].get("provisionalDx").is_some());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Json.default_file_name(), "receiving_today.json");
    }
}
