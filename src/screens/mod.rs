pub mod dashboard;

// All screens are rendered by dashboard.rs:
// - Screen 1: Queue (incoming referrals, actions, detail view)
// - Screen 2: Analytics (same-day KPIs and breakdowns)
// - Screen 3: Events (shared event log)
// - Screen 4: Facility (ICU beds, new day load)

pub use dashboard::Dashboard;
