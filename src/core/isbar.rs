/// ISBAR handover text (Identify, Situation, Background, Assessment, Recommendation)

use crate::core::referral::{Referral, Status};

const MISSING: &str = "—";

pub fn generate(referral: &Referral) -> String {
    let p = &referral.patient;
    let t = &referral.triage;
    let v = referral.latest_vitals();
    let dx = referral.provisional_dx.label.as_deref().unwrap_or(MISSING);
    let ambulance = referral
        .transport
        .ambulance
        .map(|a| a.as_str())
        .unwrap_or(MISSING);
    let eta = referral
        .transport
        .eta_min
        .map(|m| m.to_string())
        .unwrap_or_else(|| MISSING.to_string());
    let progress = if matches!(referral.status, Status::ArriveDest | Status::Handover) {
        "Arrived"
    } else {
        "En route"
    };

    let mut report = String::new();
    report.push_str(&format!("I: {}, {}{} • {}\n", p.name, p.age, p.sex, referral.id));
    report.push_str(&format!(
        "S: {} • Triage {} • Priority {}\n",
        t.complaint, t.decision.color, referral.transport.priority
    ));
    report.push_str(&format!(
        "B: Referred from {} by {} ({}) • Dx: {}\n",
        referral.referrer.facility, referral.referrer.name, referral.referrer.role, dx
    ));
    report.push_str(&format!(
        "A: Latest Vitals – HR {}, SBP {}, RR {}, SpO2 {}, Temp {:.1}°C, AVPU {}\n",
        v.hr, v.sbp, v.rr, v.spo2, v.temp, v.avpu
    ));
    report.push_str(&format!(
        "R: {} • Ambulance {} • ETA {} min\n",
        progress, ambulance, eta
    ));
    report
}
