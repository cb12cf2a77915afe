/// Facility views over the day's referrals

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::cmp::Reverse;

use crate::core::referral::Referral;

/// Local calendar date of an instant
pub fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

/// Referrals bound for `facility` whose first contact falls on `today`
///
/// A referral without a first-contact time counts as contacted `now`.
pub fn referrals_for<'a>(
    referrals: &'a [Referral],
    facility: &str,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<&'a Referral> {
    referrals
        .iter()
        .filter(|r| r.dest == facility)
        .filter(|r| local_date(r.times.first_contact_ts.unwrap_or(now)) == today)
        .collect()
}

/// Active referrals in working order: status, then priority, newest decision first
pub fn incoming_queue<'a>(view: &[&'a Referral]) -> Vec<&'a Referral> {
    let mut queue: Vec<&Referral> = view
        .iter()
        .copied()
        .filter(|r| r.status.is_active())
        .collect();

    queue.sort_by_key(|r| {
        (
            r.status.rank(),
            r.transport.priority.rank(),
            Reverse(r.times.decision_ts.map(|t| t.timestamp_millis()).unwrap_or(0)),
        )
    });

    queue
}

/// Narrow a list with a free-text query; empty query keeps everything
pub fn search<'a>(items: &[&'a Referral], query: &str) -> Vec<&'a Referral> {
    let query = query.trim();
    if query.is_empty() {
        return items.to_vec();
    }
    items.iter().copied().filter(|r| r.matches_query(query)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::referral::tests::sample_referral;
    use crate::core::referral::{Priority, Status};
    use chrono::Duration;

    #[test]
    fn test_referrals_for_filters_facility_and_day() {
        let now = Utc::now();
        let mut today_here = sample_referral("A1", Status::Prealert);
        today_here.times.first_contact_ts = Some(now);

        let mut elsewhere = sample_referral("A2", Status::Prealert);
        elsewhere.times.first_contact_ts = Some(now);
        elsewhere.dest = "NEIGRIHMS".to_string();

        let mut yesterday = sample_referral("A3", Status::Prealert);
        yesterday.times.first_contact_ts = Some(now - Duration::days(2));

        let mut undated = sample_referral("A4", Status::Prealert);
        undated.times.first_contact_ts = None;

        let all = vec![today_here, elsewhere, yesterday, undated];
        let view = referrals_for(&all, "Civil Hospital Shillong", local_date(now), now);
        let ids: Vec<&str> = view.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A4"]);
    }

    #[test]
    fn test_queue_order() {
        let base = Utc::now();
        let mut arrived = sample_referral("ARR", Status::ArriveDest);
        arrived.transport.priority = Priority::Stat;

        let mut pre_routine = sample_referral("PRE-R", Status::Prealert);
        pre_routine.transport.priority = Priority::Routine;

        let mut pre_stat_old = sample_referral("PRE-S-OLD", Status::Prealert);
        pre_stat_old.transport.priority = Priority::Stat;
        pre_stat_old.times.decision_ts = Some(base - Duration::minutes(30));

        let mut pre_stat_new = sample_referral("PRE-S-NEW", Status::Prealert);
        pre_stat_new.transport.priority = Priority::Stat;
        pre_stat_new.times.decision_ts = Some(base);

        let done = sample_referral("DONE", Status::Handover);
        let rejected = sample_referral("REJ", Status::Rejected);

        let all = vec![arrived, pre_routine, pre_stat_old, pre_stat_new, done, rejected];
        let view: Vec<&Referral> = all.iter().collect();
        let queue = incoming_queue(&view);
        let ids: Vec<&str> = queue.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, vec!["PRE-S-NEW", "PRE-S-OLD", "PRE-R", "ARR"]);
    }

    #[test]
    fn test_search() {
        let a = sample_referral("AAA11111", Status::Prealert);
        let mut b = sample_referral("BBB22222", Status::Prealert);
        b.patient.name = "Pt-0042".to_string();
        let view = vec![&a, &b];

        assert_eq!(search(&view, "").len(), 2);
        let hits = search(&view, "0042");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "BBB22222");
    }
}
