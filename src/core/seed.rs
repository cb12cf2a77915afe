/// Synthetic day load
///
/// Generates a reproducible set of referrals spread across one day, with
/// timestamps filled in only up to the status each referral has reached.

use chrono::{DateTime, Duration, Local, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::core::facility::{FacilityMeta, FacilityRegistry};
use crate::core::referral::{
    AmbulanceType, Avpu, CaseType, Patient, Priority, ProvisionalDx, Referral, Referrer, Sex,
    Status, Times, Transport, Triage, TriageColor, TriageDecision,
};
use crate::utils::{FACILITY_POOL, REFERRER_NAMES, REFERRER_ROLES, REFERRING_FACILITIES};

const COMPLAINT_WEIGHTS: [f64; 6] = [0.2, 0.22, 0.18, 0.18, 0.15, 0.07];
const TRIAGE_WEIGHTS: [f64; 3] = [0.34, 0.44, 0.22];
const PRIORITY_WEIGHTS: [f64; 3] = [0.25, 0.5, 0.25];
const AMBULANCE_WEIGHTS: [f64; 5] = [0.45, 0.32, 0.15, 0.03, 0.05];
const STATUS_WEIGHTS: [f64; 6] = [0.25, 0.15, 0.2, 0.2, 0.15, 0.05];

/// Weighted pick from `items`; weights are compile-time constants and never empty
fn pick<T: Copy, R: Rng>(rng: &mut R, items: &[T], weights: &[f64]) -> T {
    match WeightedIndex::new(weights) {
        Ok(dist) => items[dist.sample(rng)],
        Err(_) => items[0],
    }
}

fn pick_str<R: Rng>(rng: &mut R, items: &[&str]) -> String {
    items.choose(rng).copied().unwrap_or_default().to_string()
}

/// Start of the current local day, as UTC
pub fn start_of_today() -> DateTime<Utc> {
    let now = Local::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

/// `n` referrals for the current local day
pub fn seed_referrals_for_today(n: usize, seed: u64) -> Vec<Referral> {
    seed_referrals(n, seed, start_of_today())
}

/// `n` referrals whose first contact falls in the 23 hours after `day_start`
pub fn seed_referrals(n: usize, seed: u64, day_start: DateTime<Utc>) -> Vec<Referral> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|i| seed_one(&mut rng, i, day_start)).collect()
}

fn seed_one<R: Rng>(rng: &mut R, index: usize, day_start: DateTime<Utc>) -> Referral {
    let complaint = pick(rng, CaseType::all(), &COMPLAINT_WEIGHTS);
    let color = pick(rng, TriageColor::all(), &TRIAGE_WEIGHTS);
    let priority = pick(rng, Priority::all(), &PRIORITY_WEIGHTS);
    let ambulance = pick(rng, AmbulanceType::all(), &AMBULANCE_WEIGHTS);

    let first_contact = day_start + Duration::seconds(rng.gen_range(0..=23 * 3600));
    let decision = first_contact + Duration::seconds(rng.gen_range(60..=25 * 60));
    let dispatch = decision + Duration::seconds(rng.gen_range(2 * 60..=12 * 60));
    let travel_min: u32 = rng.gen_range(8..=85);
    let arrive = dispatch + Duration::minutes(travel_min as i64);
    let handover = arrive + Duration::seconds(rng.gen_range(5 * 60..=35 * 60));

    let status = pick(rng, Status::all(), &STATUS_WEIGHTS);

    let mut times = Times {
        first_contact_ts: Some(first_contact),
        decision_ts: Some(decision),
        ..Times::default()
    };
    if matches!(
        status,
        Status::Accepted | Status::Enroute | Status::ArriveDest | Status::Handover
    ) {
        times.dispatch_ts = Some(dispatch);
    }
    if matches!(status, Status::Enroute | Status::ArriveDest | Status::Handover) {
        times.enroute_ts = Some(dispatch + Duration::seconds(rng.gen_range(0..=3 * 60)));
    }
    if matches!(status, Status::ArriveDest | Status::Handover) {
        times.arrive_dest_ts = Some(arrive);
    }
    if status == Status::Handover {
        times.handover_ts = Some(handover);
    }

    let dest = pick_str(rng, FACILITY_POOL);

    let age: u8 = rng.gen_range(1..=85);
    let sex = if rng.gen_bool(0.5) { Sex::Male } else { Sex::Female };
    let pid = format!("PID-{}", rng.gen_range(100_000..=999_999));
    let referrer_name = pick_str(rng, REFERRER_NAMES);
    let referrer_facility = pick_str(rng, REFERRING_FACILITIES);

    let eta_min = if matches!(status, Status::Enroute | Status::ArriveDest) {
        travel_min
    } else {
        rng.gen_range(10..=90)
    };

    let triage = Triage {
        complaint,
        decision: TriageDecision { color },
        hr: rng.gen_range(60..=150),
        sbp: rng.gen_range(80..=180),
        rr: rng.gen_range(12..=35),
        temp: (rng.gen_range(36.0..39.8_f64) * 10.0).round() / 10.0,
        spo2: rng.gen_range(86..=99),
        avpu: Avpu::A,
    };

    let role = pick_str(rng, REFERRER_ROLES);
    let id = uuid::Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .simple()
        .to_string()[..8]
        .to_uppercase();

    Referral {
        id,
        patient: Patient {
            name: format!("Pt-{:04}", index),
            age,
            sex,
            id: pid,
        },
        referrer: Referrer {
            name: referrer_name,
            facility: referrer_facility,
            role,
        },
        provisional_dx: ProvisionalDx {
            code: "-".to_string(),
            label: Some(complaint.default_diagnosis().to_string()),
            case_type: complaint,
        },
        triage,
        dest,
        transport: Transport {
            priority,
            ambulance: Some(ambulance),
            eta_min: Some(eta_min),
        },
        resuscitation: Vec::new(),
        interventions: Vec::new(),
        vitals_history: Vec::new(),
        times,
        status,
        audit_log: Vec::new(),
    }
}

/// Capacity data for every facility in the pool
pub fn seed_facilities(seed: u64) -> FacilityRegistry {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5EED_FAC1);
    let mut registry = FacilityRegistry::new();
    for name in FACILITY_POOL {
        let rate: f64 = rng.gen_range(0.65..=0.92);
        registry.insert(
            *name,
            FacilityMeta {
                icu_open: rng.gen_range(0..=8),
                acceptance_rate: (rate * 100.0).round() / 100.0,
            },
        );
    }
    registry
}

/// Seed derived from the wall clock, for "new day load"
pub fn clock_seed() -> u64 {
    (Utc::now().timestamp() as u64) % 10_000_000
}
