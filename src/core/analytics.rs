/// Same-day analytics for one receiving facility

use chrono::{DateTime, Local, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::referral::{AmbulanceType, CaseType, Priority, Referral, Status, TriageColor};

/// Headline counters shown above the queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total: usize,
    pub awaiting: usize,
    pub enroute: usize,
    pub arrived: usize,
    pub handover: usize,
    pub rejected: usize,
    pub acceptance_rate: f64,
    pub avg_eta_min: f64,
    pub icu_open: u32,
}

/// Interval medians in minutes plus the share of RED cases
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowTimes {
    pub decision_to_dispatch_min: f64,
    pub dispatch_to_arrival_min: f64,
    pub arrival_to_handover_min: f64,
    pub critical_load_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<K> {
    pub key: K,
    pub count: usize,
}

/// Box-plot summary of a sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiveNumber {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportTimes {
    pub ambulance: AmbulanceType,
    pub minutes: FiveNumber,
}

/// One row of the day's case table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseRow {
    pub id: String,
    pub status: Status,
    pub triage: TriageColor,
    pub case_type: CaseType,
    pub priority: Priority,
    pub ambulance: Option<AmbulanceType>,
    pub eta_min: Option<u32>,
    pub first_contact: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub kpis: Kpis,
    pub flow: FlowTimes,
    pub triage_mix: Vec<Bucket<TriageColor>>,
    pub case_types: Vec<Bucket<CaseType>>,
    pub hourly_flow: Vec<Bucket<u32>>,
    pub transport_by_ambulance: Vec<TransportTimes>,
    pub status_snapshot: Vec<Bucket<Status>>,
    pub accepted_or_progressed: usize,
    pub rejected: usize,
    pub cases: Vec<CaseRow>,
}

/// Minutes from `from` to `to`, when both are known
pub fn minutes_between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    match (from, to) {
        (Some(a), Some(b)) => Some((b - a).num_milliseconds() as f64 / 60_000.0),
        _ => None,
    }
}

/// Linear-interpolated quantile of an ascending sample
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Median of a sample, 0 when empty
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile(&sorted, 0.5)
}

pub fn five_number(values: &[f64]) -> Option<FiveNumber> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(FiveNumber {
        count: sorted.len(),
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn kpis(view: &[&Referral], icu_open: u32) -> Kpis {
    let count = |pred: &dyn Fn(&Referral) -> bool| view.iter().filter(|r| pred(**r)).count();

    let total = view.len();
    let rejected = count(&|r| r.status == Status::Rejected);
    // Every status is a known status, so the base is the whole view
    let base = total;
    let acceptance_rate = if base > 0 {
        100.0 * (base - rejected) as f64 / base as f64
    } else {
        0.0
    };

    let etas: Vec<f64> = view
        .iter()
        .filter(|r| matches!(r.status, Status::Enroute | Status::ArriveDest))
        .filter_map(|r| r.transport.eta_min)
        .map(f64::from)
        .collect();
    let avg_eta_min = if etas.is_empty() {
        0.0
    } else {
        round1(etas.iter().sum::<f64>() / etas.len() as f64)
    };

    Kpis {
        total,
        awaiting: count(&|r| r.status.is_awaiting()),
        enroute: count(&|r| r.status == Status::Enroute),
        arrived: count(&|r| r.status == Status::ArriveDest),
        handover: count(&|r| r.status == Status::Handover),
        rejected,
        acceptance_rate,
        avg_eta_min,
        icu_open,
    }
}

pub fn flow_times(view: &[&Referral]) -> FlowTimes {
    let sample = |f: &dyn Fn(&Referral) -> Option<f64>| -> Vec<f64> {
        view.iter().filter_map(|r| f(*r)).collect()
    };

    let d2d = sample(&|r| minutes_between(r.times.decision_ts, r.times.dispatch_ts));
    let d2a = sample(&|r| minutes_between(r.times.dispatch_ts, r.times.arrive_dest_ts));
    let a2h = sample(&|r| minutes_between(r.times.arrive_dest_ts, r.times.handover_ts));

    let red = view
        .iter()
        .filter(|r| r.triage_color() == TriageColor::Red)
        .count();
    let critical_load_pct = if view.is_empty() {
        0.0
    } else {
        100.0 * red as f64 / view.len() as f64
    };

    FlowTimes {
        decision_to_dispatch_min: median(&d2d),
        dispatch_to_arrival_min: median(&d2a),
        arrival_to_handover_min: median(&a2h),
        critical_load_pct,
    }
}

/// Full analytics bundle; `now` stands in for a missing first contact
pub fn compute(view: &[&Referral], icu_open: u32, now: DateTime<Utc>) -> Analytics {
    let kpis = kpis(view, icu_open);
    let flow = flow_times(view);

    let triage_mix = TriageColor::all()
        .iter()
        .map(|&color| Bucket {
            key: color,
            count: view.iter().filter(|r| r.triage_color() == color).count(),
        })
        .collect();

    let mut case_types: Vec<Bucket<CaseType>> = CaseType::all()
        .iter()
        .map(|&ct| Bucket {
            key: ct,
            count: view.iter().filter(|r| r.triage.complaint == ct).count(),
        })
        .filter(|b| b.count > 0)
        .collect();
    case_types.sort_by(|a, b| b.count.cmp(&a.count));

    let mut hours: BTreeMap<u32, usize> = BTreeMap::new();
    for r in view {
        let first = r.times.first_contact_ts.unwrap_or(now);
        *hours.entry(first.with_timezone(&Local).hour()).or_default() += 1;
    }
    let hourly_flow = hours
        .into_iter()
        .map(|(key, count)| Bucket { key, count })
        .collect();

    let mut by_ambulance: BTreeMap<AmbulanceType, Vec<f64>> = BTreeMap::new();
    for r in view {
        if let (Some(amb), Some(minutes)) = (
            r.transport.ambulance,
            minutes_between(r.times.dispatch_ts, r.times.arrive_dest_ts),
        ) {
            by_ambulance.entry(amb).or_default().push(minutes);
        }
    }
    let transport_by_ambulance = by_ambulance
        .into_iter()
        .filter_map(|(ambulance, sample)| {
            five_number(&sample).map(|minutes| TransportTimes { ambulance, minutes })
        })
        .collect();

    let status_snapshot = Status::all()
        .iter()
        .map(|&st| Bucket {
            key: st,
            count: view.iter().filter(|r| r.status == st).count(),
        })
        .collect();

    let mut cases: Vec<CaseRow> = view
        .iter()
        .map(|r| CaseRow {
            id: r.id.clone(),
            status: r.status,
            triage: r.triage_color(),
            case_type: r.triage.complaint,
            priority: r.transport.priority,
            ambulance: r.transport.ambulance,
            eta_min: r.transport.eta_min,
            first_contact: r.times.first_contact_ts.unwrap_or(now),
        })
        .collect();
    cases.sort_by(|a, b| b.first_contact.cmp(&a.first_contact));

    Analytics {
        accepted_or_progressed: kpis.total - kpis.rejected,
        rejected: kpis.rejected,
        kpis,
        flow,
        triage_mix,
        case_types,
        hourly_flow,
        transport_by_ambulance,
        status_snapshot,
        cases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::referral::tests::sample_referral;
    use crate::core::referral::Referral;
    use chrono::Duration;

    fn with_times(id: &str, status: Status, d2d: i64, d2a: i64, a2h: Option<i64>) -> Referral {
        let mut r = sample_referral(id, status);
        let decision = r.times.decision_ts.unwrap();
        let dispatch = decision + Duration::minutes(d2d);
        let arrival = dispatch + Duration::minutes(d2a);
        r.times.dispatch_ts = Some(dispatch);
        r.times.arrive_dest_ts = Some(arrival);
        r.times.handover_ts = a2h.map(|m| arrival + Duration::minutes(m));
        r
    }

    #[test]
    fn test_empty_view() {
        let a = compute(&[], 3, Utc::now());
        assert_eq!(a.kpis.total, 0);
        assert_eq!(a.kpis.acceptance_rate, 0.0);
        assert_eq!(a.kpis.avg_eta_min, 0.0);
        assert_eq!(a.kpis.icu_open, 3);
        assert_eq!(a.flow.decision_to_dispatch_min, 0.0);
        assert_eq!(a.flow.critical_load_pct, 0.0);
        assert!(a.cases.is_empty());
        assert!(a.transport_by_ambulance.is_empty());
    }

    #[test]
    fn test_kpi_counters() {
        let mut enroute = sample_referral("E", Status::Enroute);
        enroute.transport.eta_min = Some(20);
        let mut arrived = sample_referral("A", Status::ArriveDest);
        arrived.transport.eta_min = Some(35);
        let mut prealert = sample_referral("P", Status::Prealert);
        prealert.transport.eta_min = Some(90);
        let rejected = sample_referral("R", Status::Rejected);

        let all = vec![enroute, arrived, prealert, rejected];
        let view: Vec<&Referral> = all.iter().collect();
        let k = kpis(&view, 4);

        assert_eq!(k.total, 4);
        assert_eq!(k.awaiting, 2);
        assert_eq!(k.enroute, 1);
        assert_eq!(k.arrived, 1);
        assert_eq!(k.rejected, 1);
        assert_eq!(k.acceptance_rate, 75.0);
        // PREALERT ETA is not counted
        assert_eq!(k.avg_eta_min, 27.5);
    }

    #[test]
    fn test_flow_medians() {
        let all = vec![
            with_times("1", Status::Handover, 4, 30, Some(10)),
            with_times("2", Status::Handover, 6, 50, Some(20)),
            with_times("3", Status::ArriveDest, 10, 40, None),
        ];
        let view: Vec<&Referral> = all.iter().collect();
        let f = flow_times(&view);

        assert_eq!(f.decision_to_dispatch_min, 6.0);
        assert_eq!(f.dispatch_to_arrival_min, 40.0);
        assert_eq!(f.arrival_to_handover_min, 15.0);
        assert_eq!(f.critical_load_pct, 100.0);
    }

    #[test]
    fn test_five_number_summary() {
        let s = five_number(&[10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();
        assert_eq!(s.min, 10.0);
        assert_eq!(s.q1, 20.0);
        assert_eq!(s.median, 30.0);
        assert_eq!(s.q3, 40.0);
        assert_eq!(s.max, 50.0);
        assert!(five_number(&[]).is_none());
        assert_eq!(median(&[3.0, 1.0]), 2.0);
    }

    #[test]
    fn test_breakdowns() {
        let mut stroke = with_times("S", Status::ArriveDest, 5, 20, None);
        stroke.triage.complaint = CaseType::Stroke;
        stroke.triage.decision.color = TriageColor::Yellow;
        stroke.transport.ambulance = Some(AmbulanceType::Bls);
        let maternal_a = with_times("M1", Status::Handover, 5, 40, Some(5));
        let maternal_b = sample_referral("M2", Status::Rejected);

        let all = vec![stroke, maternal_a, maternal_b];
        let view: Vec<&Referral> = all.iter().collect();
        let a = compute(&view, 0, Utc::now());

        assert_eq!(a.case_types[0].key, CaseType::Maternal);
        assert_eq!(a.case_types[0].count, 2);
        assert_eq!(a.case_types.len(), 2);

        let red = a.triage_mix.iter().find(|b| b.key == TriageColor::Red).unwrap();
        assert_eq!(red.count, 2);

        assert_eq!(a.transport_by_ambulance.len(), 2);
        let bls = a
            .transport_by_ambulance
            .iter()
            .find(|t| t.ambulance == AmbulanceType::Bls)
            .unwrap();
        assert_eq!(bls.minutes.median, 20.0);

        let statuses: Vec<Status> = a.status_snapshot.iter().map(|b| b.key).collect();
        assert_eq!(statuses, Status::all().to_vec());
        assert_eq!(a.accepted_or_progressed, 2);
        assert_eq!(a.rejected, 1);
        assert_eq!(a.hourly_flow.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_case_table_newest_first() {
        let mut early = sample_referral("EARLY", Status::Prealert);
        let mut late = sample_referral("LATE", Status::Prealert);
        let base = Utc::now();
        early.times.first_contact_ts = Some(base - Duration::hours(3));
        late.times.first_contact_ts = Some(base);

        let all = vec![early, late];
        let view: Vec<&Referral> = all.iter().collect();
        let a = compute(&view, 0, base);
        assert_eq!(a.cases[0].id, "LATE");
    }
}
