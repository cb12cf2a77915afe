/// The receiving desk: day state, snapshot persistence and event publishing
///
/// All three surfaces (dashboard, CLI, API) go through this type. Every
/// mutation is applied in memory, written to the snapshot, then published
/// to the event log. A publish failure is logged and does not roll back.

use chrono::{Local, NaiveDate, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::analytics::{self, Analytics};
use crate::core::error::{DeskError, Result};
use crate::core::events::{Event, EventKind, EventStore};
use crate::core::export::{self, ExportFormat};
use crate::core::facility::{FacilityMeta, FacilityRegistry};
use crate::core::isbar;
use crate::core::persistence::{Snapshot, SnapshotStore};
use crate::core::queue;
use crate::core::referral::{Intervention, Referral};
use crate::core::seed;
use crate::core::vitals::{self, VitalsInput};
use crate::core::workflow::{self, Action};
use crate::utils::{AppConfig, DEFAULT_EVENT_LIMIT, FACILITY_POOL};

pub struct ReceivingDesk {
    referrals: Vec<Referral>,
    facilities: FacilityRegistry,
    loose_interventions: BTreeMap<String, Vec<Intervention>>,
    store: SnapshotStore,
    events: EventStore,
    actor: String,
    last_event_id: i64,
}

impl ReceivingDesk {
    /// Open the desk described by `config`, creating the data directory as needed
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let data_dir = config.data_dir();
        fs::create_dir_all(&data_dir)?;

        let events = EventStore::open(&config.events_path()).await?;
        let store = SnapshotStore::new(config.snapshot_path());
        Self::with_stores(store, events, &config.actor, config.seed, config.seed_count).await
    }

    /// Build from explicit stores; seeds a day when the snapshot has nothing for today
    pub async fn with_stores(
        store: SnapshotStore,
        events: EventStore,
        actor: &str,
        seed: u64,
        count: usize,
    ) -> Result<Self> {
        let last_event_id = events.last_id().await?;
        let mut desk = Self {
            referrals: Vec::new(),
            facilities: FacilityRegistry::new(),
            loose_interventions: BTreeMap::new(),
            store,
            events,
            actor: actor.to_string(),
            last_event_id,
        };

        let loaded = desk.store.load();
        let has_today = loaded.as_ref().is_some_and(|s| {
            let today = Local::now().date_naive();
            s.referrals.iter().any(|r| {
                r.times
                    .first_contact_ts
                    .is_some_and(|t| queue::local_date(t) == today)
            })
        });

        match loaded {
            Some(snapshot) if has_today => {
                desk.install(snapshot);
                if desk.facilities.is_empty() {
                    desk.facilities = seed::seed_facilities(seed);
                    desk.save()?;
                }
            }
            _ => {
                tracing::info!(seed, count, "no referrals for today, seeding a new day");
                desk.new_day(seed, count).await?;
            }
        }

        Ok(desk)
    }

    fn install(&mut self, snapshot: Snapshot) {
        self.referrals = snapshot.referrals;
        self.loose_interventions = snapshot.interventions;
        self.facilities = FacilityRegistry::from_map(FACILITY_POOL, snapshot.resources);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            referrals: self.referrals.clone(),
            interventions: self.loose_interventions.clone(),
            resources: self.facilities.to_map(),
        }
    }

    fn save(&self) -> Result<()> {
        self.store.save(&self.snapshot())
    }

    async fn publish(&mut self, kind: EventKind, case_id: &str, payload: serde_json::Value) {
        match self
            .events
            .publish_event(kind, case_id, &self.actor, Some(payload))
            .await
        {
            // Skip past our own event unless another actor wrote in between
            Ok(id) if id == self.last_event_id + 1 => self.last_event_id = id,
            Ok(_) => {}
            Err(e) => tracing::warn!(kind = %kind, case_id, error = %e, "failed to publish event"),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn facilities(&self) -> &FacilityRegistry {
        &self.facilities
    }

    pub fn referrals(&self) -> &[Referral] {
        &self.referrals
    }

    pub fn referral(&self, id: &str) -> Result<&Referral> {
        self.referrals
            .iter()
            .find(|r| r.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| DeskError::UnknownReferral(id.to_string()))
    }

    pub fn facility_meta(&self, facility: &str) -> Result<FacilityMeta> {
        if !self.facilities.contains(facility) {
            return Err(DeskError::UnknownFacility(facility.to_string()));
        }
        Ok(self.facilities.meta(facility))
    }

    /// Pick up snapshot writes from other processes before changing anything
    async fn catch_up(&mut self) -> Result<()> {
        let last = self.events.last_id().await?;
        if last > self.last_event_id {
            tracing::debug!(from = self.last_event_id, to = last, "log moved on, reloading before write");
            self.reload();
            self.last_event_id = last;
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.referrals
            .iter()
            .position(|r| r.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| DeskError::UnknownReferral(id.to_string()))
    }

    /// Persist `referral` at `idx`; memory only changes once the write succeeded
    fn commit_referral(&mut self, idx: usize, referral: Referral) -> Result<()> {
        let mut snapshot = self.snapshot();
        snapshot.referrals[idx] = referral.clone();
        self.store.save(&snapshot)?;
        self.referrals[idx] = referral;
        Ok(())
    }

    /// Move a referral through the workflow
    pub async fn apply(&mut self, id: &str, action: Action) -> Result<Referral> {
        self.catch_up().await?;
        let idx = self.position(id)?;
        let mut updated = self.referrals[idx].clone();
        workflow::apply(&mut updated, action, Utc::now())?;
        self.commit_referral(idx, updated.clone())?;

        let target = action.target();
        if let Some(kind) = EventKind::for_status(target) {
            let payload = match action {
                Action::Reject(reason) => json!({ "status": target, "reason": reason.as_str() }),
                _ => json!({ "status": target }),
            };
            self.publish(kind, &updated.id, payload).await;
        }

        tracing::info!(id = %updated.id, action = action.name(), status = %updated.status, "referral updated");
        Ok(updated)
    }

    pub async fn record_vitals(&mut self, id: &str, input: VitalsInput) -> Result<Referral> {
        self.catch_up().await?;
        let idx = self.position(id)?;
        let mut updated = self.referrals[idx].clone();
        vitals::record_vitals(&mut updated, input, Utc::now())?;
        self.commit_referral(idx, updated.clone())?;

        let payload = match updated.vitals_history.last() {
            Some(record) => serde_json::to_value(record)?,
            None => json!({}),
        };
        self.publish(EventKind::Vitals, &updated.id, payload).await;
        Ok(updated)
    }

    pub async fn record_interventions(&mut self, id: &str, names: &[String]) -> Result<Referral> {
        self.catch_up().await?;
        let idx = self.position(id)?;
        let mut updated = self.referrals[idx].clone();
        let saved = vitals::record_interventions(&mut updated, names, Utc::now())?;
        self.commit_referral(idx, updated.clone())?;

        let items: Vec<&str> = names.iter().map(|n| n.trim()).collect();
        self.publish(EventKind::Interventions, &updated.id, json!({ "items": items }))
            .await;
        tracing::info!(id = %updated.id, saved, "interventions recorded");
        Ok(updated)
    }

    pub async fn set_icu_open(&mut self, facility: &str, beds: u32) -> Result<FacilityMeta> {
        self.catch_up().await?;
        let mut facilities = self.facilities.clone();
        facilities.set_icu_open(facility, beds)?;

        let mut snapshot = self.snapshot();
        snapshot.resources = facilities.to_map();
        self.store.save(&snapshot)?;
        self.facilities = facilities;

        self.publish(
            EventKind::IcuUpdated,
            "",
            json!({ "facility": facility, "icu_open": beds }),
        )
        .await;
        Ok(self.facilities.meta(facility))
    }

    /// Replace the day's load with `count` freshly seeded referrals
    pub async fn new_day(&mut self, seed: u64, count: usize) -> Result<usize> {
        self.catch_up().await?;
        let snapshot = Snapshot {
            referrals: seed::seed_referrals_for_today(count, seed),
            interventions: BTreeMap::new(),
            resources: seed::seed_facilities(seed).to_map(),
        };
        self.store.save(&snapshot)?;
        self.install(snapshot);

        self.publish(EventKind::DaySeeded, "", json!({ "seed": seed, "count": count }))
            .await;
        tracing::info!(seed, count, "new day loaded");
        Ok(self.referrals.len())
    }

    /// Re-read the snapshot; a missing file leaves the current state alone
    pub fn reload(&mut self) -> bool {
        match self.store.load() {
            Some(snapshot) => {
                self.install(snapshot);
                true
            }
            None => false,
        }
    }

    /// Pull new events; reloads the snapshot when another actor changed something
    pub async fn sync(&mut self) -> Result<Vec<Event>> {
        let events = self
            .events
            .poll_events_since(self.last_event_id, None, DEFAULT_EVENT_LIMIT)
            .await?;
        self.observe(&events);
        Ok(events)
    }

    /// Fold in events polled elsewhere; true when the snapshot was reloaded
    pub fn observe(&mut self, events: &[Event]) -> bool {
        let fresh: Vec<&Event> = events.iter().filter(|e| e.id > self.last_event_id).collect();
        if let Some(max) = fresh.iter().map(|e| e.id).max() {
            self.last_event_id = max;
        }

        if fresh.iter().any(|e| e.actor != self.actor) {
            tracing::debug!(count = fresh.len(), "external changes seen, reloading snapshot");
            return self.reload();
        }
        false
    }

    /// Same-day referrals bound for `facility`
    pub fn today(&self, facility: &str) -> Vec<&Referral> {
        self.view_on(facility, Local::now().date_naive())
    }

    pub fn view_on(&self, facility: &str, day: NaiveDate) -> Vec<&Referral> {
        queue::referrals_for(&self.referrals, facility, day, Utc::now())
    }

    pub fn incoming_queue(&self, facility: &str) -> Vec<&Referral> {
        queue::incoming_queue(&self.today(facility))
    }

    pub fn analytics(&self, facility: &str) -> Analytics {
        let icu_open = self.facilities.meta(facility).icu_open;
        analytics::compute(&self.today(facility), icu_open, Utc::now())
    }

    pub fn isbar(&self, id: &str) -> Result<String> {
        Ok(isbar::generate(self.referral(id)?))
    }

    pub fn export(&self, facility: &str, format: ExportFormat) -> Result<Vec<u8>> {
        export::export(&self.today(facility), format)
    }

    /// Write today's export to `path`, returning how many referrals it holds
    ///
    /// An empty day is an error and leaves `path` untouched.
    pub fn export_to(&self, facility: &str, format: ExportFormat, path: &Path) -> Result<usize> {
        let bytes = self.export(facility, format)?;
        if bytes.is_empty() {
            return Err(DeskError::invalid(format!(
                "nothing to export: {} has no referrals today",
                facility
            )));
        }
        fs::write(path, &bytes)?;
        Ok(self.today(facility).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::referral::Status;
    use crate::core::workflow::RejectReason;
    use crate::utils::DEFAULT_FACILITY;

    async fn desk_in(dir: &std::path::Path, actor: &str) -> ReceivingDesk {
        let events = EventStore::open(&dir.join("events.db")).await.unwrap();
        ReceivingDesk::with_stores(SnapshotStore::new(dir.join("data.json")), events, actor, 2025, 140)
            .await
            .unwrap()
    }

    fn first_with(desk: &ReceivingDesk, status: Status) -> String {
        desk.referrals()
            .iter()
            .find(|r| r.status == status)
            .map(|r| r.id.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_seeds_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let desk = desk_in(dir.path(), "a").await;

        assert_eq!(desk.referrals().len(), 140);
        assert_eq!(desk.facilities().names().len(), FACILITY_POOL.len());
        assert!(dir.path().join("data.json").exists());

        let events = desk.events().poll_events_since(0, None, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "DAY_SEEDED");

        // Reopening picks up the snapshot instead of reseeding
        let again = desk_in(dir.path(), "b").await;
        assert_eq!(again.referrals(), desk.referrals());
        assert_eq!(again.events().last_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_apply_saves_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut desk = desk_in(dir.path(), "a").await;
        let id = first_with(&desk, Status::Prealert);

        let updated = desk.apply(&id, Action::Accept).await.unwrap();
        assert_eq!(updated.status, Status::Accepted);

        let on_disk = SnapshotStore::new(dir.path().join("data.json")).load().unwrap();
        let saved = on_disk.referrals.iter().find(|r| r.id == id).unwrap();
        assert_eq!(saved.status, Status::Accepted);

        let events = desk.events().poll_events_since(1, Some(&id), 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "ACCEPTED");
        assert_eq!(events[0].actor, "a");
    }

    #[tokio::test]
    async fn test_invalid_transition_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut desk = desk_in(dir.path(), "a").await;
        let id = first_with(&desk, Status::Prealert);

        let err = desk.apply(&id, Action::Handover).await.unwrap_err();
        assert!(matches!(err, DeskError::InvalidTransition { .. }));
        assert_eq!(desk.events().last_id().await.unwrap(), 1);

        let err = desk.apply("NOPE0000", Action::Accept).await.unwrap_err();
        assert!(matches!(err, DeskError::UnknownReferral(_)));
    }

    #[tokio::test]
    async fn test_reject_payload_carries_reason() {
        let dir = tempfile::tempdir().unwrap();
        let mut desk = desk_in(dir.path(), "a").await;
        let id = first_with(&desk, Status::Accepted);

        desk.apply(&id, Action::Reject(RejectReason::NoIcuBed)).await.unwrap();
        let events = desk.events().poll_events_since(1, None, 10).await.unwrap();
        assert_eq!(events[0].kind, "REJECTED");
        assert_eq!(events[0].payload["reason"], "No ICU bed");
    }

    #[tokio::test]
    async fn test_vitals_and_interventions() {
        let dir = tempfile::tempdir().unwrap();
        let mut desk = desk_in(dir.path(), "a").await;
        let id = first_with(&desk, Status::Enroute);

        let mut input = VitalsInput::from_referral(desk.referral(&id).unwrap());
        input.hr = 101;
        let updated = desk.record_vitals(&id, input.clone()).await.unwrap();
        assert_eq!(updated.latest_vitals().hr, 101);

        input.spo2 = 20;
        assert!(desk.record_vitals(&id, input).await.is_err());

        let names = vec!["Oxygen".to_string(), "TXA".to_string()];
        let updated = desk.record_interventions(&id, &names).await.unwrap();
        assert_eq!(updated.interventions.len(), 2);

        let events = desk.events().poll_events_since(1, Some(&id), 10).await.unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["VITALS", "INTERVENTIONS"]);
        assert_eq!(events[0].payload["hr"], 101);
        assert_eq!(events[1].payload["items"][1], "TXA");
    }

    #[tokio::test]
    async fn test_icu_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut desk = desk_in(dir.path(), "a").await;

        let meta = desk.set_icu_open(DEFAULT_FACILITY, 11).await.unwrap();
        assert_eq!(meta.icu_open, 11);
        assert_eq!(desk.analytics(DEFAULT_FACILITY).kpis.icu_open, 11);

        assert!(desk.set_icu_open(DEFAULT_FACILITY, 51).await.is_err());
        assert!(matches!(
            desk.set_icu_open("Nowhere", 1).await,
            Err(DeskError::UnknownFacility(_))
        ));
    }

    #[tokio::test]
    async fn test_sync_reloads_on_foreign_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = desk_in(dir.path(), "first").await;
        let mut second = desk_in(dir.path(), "second").await;
        let id = first_with(&first, Status::Prealert);

        // Own events are skipped
        first.apply(&id, Action::Accept).await.unwrap();
        assert!(first.sync().await.unwrap().is_empty());

        let seen = second.sync().await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(second.referral(&id).unwrap().status, Status::Accepted);
    }

    #[tokio::test]
    async fn test_observe_ignores_own_and_seen_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = desk_in(dir.path(), "first").await;
        let mut second = desk_in(dir.path(), "second").await;
        let id = first_with(&first, Status::Prealert);

        first.apply(&id, Action::Accept).await.unwrap();
        let polled = first.events().poll_events_since(0, None, 10).await.unwrap();

        assert!(!first.observe(&polled));
        assert!(second.observe(&polled));
        // Already seen
        assert!(!second.observe(&polled));
    }

    #[tokio::test]
    async fn test_views_cover_today() {
        let dir = tempfile::tempdir().unwrap();
        let desk = desk_in(dir.path(), "a").await;

        let total: usize = FACILITY_POOL.iter().map(|f| desk.today(f).len()).sum();
        assert_eq!(total, 140);

        let queue = desk.incoming_queue(DEFAULT_FACILITY);
        assert!(queue.iter().all(|r| r.status.is_active()));

        let csv = desk.export(DEFAULT_FACILITY, ExportFormat::Csv).unwrap();
        let rows = String::from_utf8(csv).unwrap().lines().count();
        assert_eq!(rows, desk.today(DEFAULT_FACILITY).len() + 1);

        assert!(desk.export("Nowhere", ExportFormat::Json).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writers_do_not_overwrite_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let mut tui = desk_in(dir.path(), "tui").await;
        let mut api = desk_in(dir.path(), "api").await;

        let prealerts: Vec<String> = tui
            .referrals()
            .iter()
            .filter(|r| r.status == Status::Prealert)
            .take(2)
            .map(|r| r.id.clone())
            .collect();
        let (first, second) = (&prealerts[0], &prealerts[1]);

        // No sync between the two writes
        tui.apply(first, Action::Accept).await.unwrap();
        api.apply(second, Action::Accept).await.unwrap();

        let fresh = desk_in(dir.path(), "check").await;
        assert_eq!(fresh.referral(first).unwrap().status, Status::Accepted);
        assert_eq!(fresh.referral(second).unwrap().status, Status::Accepted);

        tui.sync().await.unwrap();
        assert_eq!(tui.referral(first).unwrap().status, Status::Accepted);
        assert_eq!(tui.referral(second).unwrap().status, Status::Accepted);
    }

    #[tokio::test]
    async fn test_icu_write_keeps_foreign_referral_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut tui = desk_in(dir.path(), "tui").await;
        let mut api = desk_in(dir.path(), "api").await;
        let id = first_with(&tui, Status::Prealert);

        api.apply(&id, Action::Accept).await.unwrap();
        tui.set_icu_open(DEFAULT_FACILITY, 9).await.unwrap();

        let fresh = desk_in(dir.path(), "check").await;
        assert_eq!(fresh.referral(&id).unwrap().status, Status::Accepted);
        assert_eq!(fresh.facility_meta(DEFAULT_FACILITY).unwrap().icu_open, 9);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut desk = desk_in(dir.path(), "a").await;
        let id = first_with(&desk, Status::Prealert);

        // A directory where the snapshot should go makes the rename fail
        let snapshot = dir.path().join("data.json");
        fs::remove_file(&snapshot).unwrap();
        fs::create_dir(&snapshot).unwrap();

        assert!(desk.apply(&id, Action::Accept).await.is_err());
        assert_eq!(desk.referral(&id).unwrap().status, Status::Prealert);
        assert_eq!(desk.events().last_id().await.unwrap(), 1);

        assert!(desk.set_icu_open(DEFAULT_FACILITY, 11).await.is_err());
        assert_ne!(desk.facility_meta(DEFAULT_FACILITY).unwrap().icu_open, 11);
    }

    #[tokio::test]
    async fn test_export_to_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let desk = desk_in(dir.path(), "a").await;
        let path = dir.path().join("out.csv");

        let count = desk.export_to(DEFAULT_FACILITY, ExportFormat::Csv, &path).unwrap();
        assert_eq!(count, desk.today(DEFAULT_FACILITY).len());
        assert!(fs::read_to_string(&path).unwrap().starts_with("id,"));
    }

    #[tokio::test]
    async fn test_export_to_refuses_empty_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut desk = desk_in(dir.path(), "a").await;
        desk.new_day(7, 0).await.unwrap();
        let path = dir.path().join("out.json");

        let err = desk.export_to(DEFAULT_FACILITY, ExportFormat::Json, &path).unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput(_)));
        assert!(!path.exists());
    }
}
