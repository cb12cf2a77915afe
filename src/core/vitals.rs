/// Vitals and intervention entry at the receiving desk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{DeskError, Result};
use crate::core::referral::{Avpu, Intervention, Referral, VitalsRecord};

/// Quick-pick interventions offered by the dashboard
pub const QUICK_INTERVENTIONS: &[&str] = &[
    "Oxygen",
    "IV Access",
    "IV Fluids",
    "Uterotonics",
    "TXA",
    "Aspirin",
];

/// Rows of vitals history shown in detail views
pub const VITALS_HISTORY_ROWS: usize = 6;

/// Vitals as entered by staff, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsInput {
    pub hr: u16,
    pub sbp: u16,
    pub rr: u16,
    pub spo2: u16,
    pub temp: f64,
    #[serde(default)]
    pub avpu: Avpu,
}

impl VitalsInput {
    /// Pre-fill from the referral's latest known set
    pub fn from_referral(referral: &Referral) -> Self {
        let latest = referral.latest_vitals();
        Self {
            hr: latest.hr,
            sbp: latest.sbp,
            rr: latest.rr,
            spo2: latest.spo2,
            temp: latest.temp,
            avpu: latest.avpu,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("HR", self.hr as f64, 0.0, 250.0)?;
        check_range("SBP", self.sbp as f64, 0.0, 300.0)?;
        check_range("RR", self.rr as f64, 0.0, 80.0)?;
        check_range("SpO2", self.spo2 as f64, 50.0, 100.0)?;
        check_range("Temp", self.temp, 30.0, 43.0)?;
        Ok(())
    }

    pub fn into_record(self, timestamp: DateTime<Utc>) -> Result<VitalsRecord> {
        self.validate()?;
        Ok(VitalsRecord {
            timestamp,
            hr: self.hr,
            sbp: self.sbp,
            rr: self.rr,
            spo2: self.spo2,
            temp: (self.temp * 10.0).round() / 10.0,
            avpu: self.avpu,
        })
    }
}

fn check_range(label: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(DeskError::invalid(format!(
            "{} must be between {} and {} (got {})",
            label, min, max, value
        )));
    }
    Ok(())
}

/// Append a validated vitals record
pub fn record_vitals(referral: &mut Referral, input: VitalsInput, now: DateTime<Utc>) -> Result<()> {
    let record = input.into_record(now)?;
    referral.vitals_history.push(record);
    Ok(())
}

/// Append one completed EMT intervention per name, returns how many were saved
pub fn record_interventions(
    referral: &mut Referral,
    names: &[String],
    now: DateTime<Utc>,
) -> Result<usize> {
    if names.is_empty() {
        return Err(DeskError::invalid("no interventions selected"));
    }
    if let Some(blank) = names.iter().position(|n| n.trim().is_empty()) {
        return Err(DeskError::invalid(format!("intervention #{} has no name", blank + 1)));
    }

    for name in names {
        referral.interventions.push(Intervention {
            name: name.trim().to_string(),
            kind: "emt".to_string(),
            timestamp: now,
            status: "completed".to_string(),
        });
    }

    Ok(names.len())
}

/// Last few vitals records, oldest first
pub fn recent_vitals(referral: &Referral) -> &[VitalsRecord] {
    let len = referral.vitals_history.len();
    &referral.vitals_history[len.saturating_sub(VITALS_HISTORY_ROWS)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::referral::tests::sample_referral;
    use crate::core::referral::Status;

    fn input() -> VitalsInput {
        VitalsInput {
            hr: 96,
            sbp: 120,
            rr: 18,
            spo2: 97,
            temp: 37.24,
            avpu: Avpu::A,
        }
    }

    #[test]
    fn test_record_vitals_appends_and_rounds() {
        let mut r = sample_referral("A1", Status::Enroute);
        record_vitals(&mut r, input(), Utc::now()).unwrap();

        assert_eq!(r.vitals_history.len(), 1);
        assert_eq!(r.vitals_history[0].temp, 37.2);
        assert_eq!(r.latest_vitals().hr, 96);
    }

    #[test]
    fn test_out_of_range_vitals_rejected() {
        let mut r = sample_referral("A1", Status::Enroute);

        let mut bad = input();
        bad.spo2 = 40;
        assert!(record_vitals(&mut r, bad, Utc::now()).is_err());

        let mut bad = input();
        bad.temp = 44.0;
        assert!(record_vitals(&mut r, bad, Utc::now()).is_err());

        let mut bad = input();
        bad.hr = 251;
        assert!(record_vitals(&mut r, bad, Utc::now()).is_err());

        assert!(r.vitals_history.is_empty());
    }

    #[test]
    fn test_prefill_uses_triage_values() {
        let r = sample_referral("A1", Status::Prealert);
        let prefill = VitalsInput::from_referral(&r);
        assert_eq!(prefill.hr, 118);
        assert_eq!(prefill.sbp, 92);
    }

    #[test]
    fn test_record_interventions() {
        let mut r = sample_referral("A1", Status::ArriveDest);
        let names = vec!["Oxygen".to_string(), "TXA".to_string()];
        let saved = record_interventions(&mut r, &names, Utc::now()).unwrap();

        assert_eq!(saved, 2);
        assert_eq!(r.interventions[1].name, "TXA");
        assert_eq!(r.interventions[0].kind, "emt");
        assert_eq!(r.interventions[0].status, "completed");
    }

    #[test]
    fn test_blank_intervention_rejected() {
        let mut r = sample_referral("A1", Status::ArriveDest);
        assert!(record_interventions(&mut r, &[], Utc::now()).is_err());
        assert!(record_interventions(&mut r, &["  ".to_string()], Utc::now()).is_err());
        assert!(r.interventions.is_empty());
    }

    #[test]
    fn test_recent_vitals_window() {
        let mut r = sample_referral("A1", Status::ArriveDest);
        for hr in 80..90 {
            let mut v = input();
            v.hr = hr;
            record_vitals(&mut r, v, Utc::now()).unwrap();
        }
        let recent = recent_vitals(&r);
        assert_eq!(recent.len(), VITALS_HISTORY_ROWS);
        assert_eq!(recent[0].hr, 84);
        assert_eq!(recent[5].hr, 89);
    }
}
