//! Reminder scheduler - periodic day-before and same-day checks.
//!
//! Two independent tokio tasks drive the checks:
//! 1. Day-before: every day at 09:00 UTC, events dated tomorrow
//! 2. Same-day: at minute 0 of every hour UTC, events dated today that start
//!    within the next hour
//!
//! Each task runs its tick inline and only then computes the next fire time
//! from the later of the fire time it just served and the clock, so a task
//! never overlaps itself, never fires twice for one instant, and skips fire
//! times missed during a slow tick. Nothing records which reminders were
//! already sent.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::fmt;
use shared::{Event, EventStore, ReminderKind};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::evaluator;
use crate::notify::{Delivery, Notifier};

/// Wall-clock time (UTC) of the daily day-before check.
pub const DAY_BEFORE_CHECK_AT: NaiveTime = match NaiveTime::from_hms_opt(9, 0, 0) {
    Some(at) => at,
    None => panic!("invalid day-before check time"),
};

/// Source of the current UTC time for the periodic tasks.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Counters for one tick of a check. Logged as JSON at the end of each check.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub events_found: u32,
    pub reminders_due: u32,
    pub notifications_sent: u32,
    pub notifications_skipped: u32,
    pub errors: u32,
}

/// Next daily fire instant at `at`, strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Next top of the hour, strictly after `now`.
pub fn next_hourly_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let hour_start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    hour_start + Duration::hours(1)
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Looks up candidate events and hands due ones to every notifier.
pub struct ReminderDispatcher {
    store: Arc<dyn EventStore>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl ReminderDispatcher {
    pub fn new(store: Arc<dyn EventStore>, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { store, notifiers }
    }

    /// Send day-before reminders for events dated the day after `now`.
    pub async fn check_day_before(&self, now: DateTime<Utc>) -> TickReport {
        info!("Checking for day-before reminders");

        let Some(tomorrow) = now.date_naive().succ_opt() else {
            return TickReport::default();
        };

        self.run_check(now, ReminderKind::DayBefore, tomorrow).await
    }

    /// Send same-day reminders for today's events starting within the hour.
    pub async fn check_same_day(&self, now: DateTime<Utc>) -> TickReport {
        info!("Checking for same-day reminders");

        self.run_check(now, ReminderKind::SameDay, now.date_naive())
            .await
    }

    async fn run_check(
        &self,
        now: DateTime<Utc>,
        kind: ReminderKind,
        date: NaiveDate,
    ) -> TickReport {
        let mut report = TickReport::default();

        let events = match self.store.find_by_date(date).await {
            Ok(events) => events,
            Err(e) => {
                error!(kind = %kind, date = %date, error = %e, "Failed to fetch events");
                report.errors += 1;
                return report;
            }
        };

        report.events_found = events.len() as u32;

        let due = evaluator::due_events(now, kind, &events);
        report.reminders_due = due.len() as u32;

        for event in due {
            info!(event_id = event.id, title = %event.title, kind = %kind, "Sending reminder");
            self.deliver(event, kind, &mut report).await;
        }

        info!(kind = %kind, report = %report, "Reminder check complete");

        report
    }

    async fn deliver(&self, event: &Event, kind: ReminderKind, report: &mut TickReport) {
        for notifier in &self.notifiers {
            match notifier.notify(event, kind).await {
                Ok(Delivery::Sent { .. }) => report.notifications_sent += 1,
                Ok(Delivery::Skipped { .. }) => report.notifications_skipped += 1,
                Err(e) => {
                    error!(
                        event_id = event.id,
                        channel = notifier.channel(),
                        kind = %kind,
                        error = %e,
                        "Failed to send reminder"
                    );
                    report.errors += 1;
                }
            }
        }
    }
}

enum Lifecycle {
    Idle,
    Running(Vec<JoinHandle<()>>),
    Stopping(Vec<JoinHandle<()>>),
    Stopped,
}

/// Owns the two periodic reminder tasks.
pub struct ReminderScheduler {
    dispatcher: Arc<ReminderDispatcher>,
    clock: Clock,
    shutdown: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
}

impl ReminderScheduler {
    pub fn new(dispatcher: ReminderDispatcher) -> Self {
        Self::with_clock(dispatcher, Arc::new(Utc::now))
    }

    /// Like [`new`](Self::new), reading the current time from `clock`.
    pub fn with_clock(dispatcher: ReminderDispatcher, clock: Clock) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            dispatcher: Arc::new(dispatcher),
            clock,
            shutdown,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Spawn both periodic tasks on the current runtime and return immediately.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(*lifecycle, Lifecycle::Idle) {
            warn!("Reminder scheduler is not idle, ignoring start");
            return;
        }

        info!("Starting reminder scheduler");

        let day_before = {
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(run_periodic(
                "day_before",
                self.clock.clone(),
                self.shutdown.subscribe(),
                |now| next_daily_run(now, DAY_BEFORE_CHECK_AT),
                move |now| {
                    let dispatcher = dispatcher.clone();
                    async move { dispatcher.check_day_before(now).await }
                },
            ))
        };

        let same_day = {
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(run_periodic(
                "same_day",
                self.clock.clone(),
                self.shutdown.subscribe(),
                next_hourly_run,
                move |now| {
                    let dispatcher = dispatcher.clone();
                    async move { dispatcher.check_same_day(now).await }
                },
            ))
        };

        *lifecycle = Lifecycle::Running(vec![day_before, same_day]);
        info!("Reminder scheduler started");
    }

    /// Stop scheduling ticks. A tick already in progress is allowed to finish.
    ///
    /// A task checks the shutdown flag right before invoking each tick. A tick
    /// whose check passed before `stop` took effect counts as in progress and
    /// runs to completion; [`join`](Self::join) waits for it.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        *lifecycle = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(handles) => {
                self.shutdown.send_replace(true);
                info!("Reminder scheduler stopped");
                Lifecycle::Stopping(handles)
            }
            Lifecycle::Idle => Lifecycle::Stopped,
            other => other,
        };
    }

    pub fn is_running(&self) -> bool {
        let lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        matches!(*lifecycle, Lifecycle::Running(_))
    }

    /// Wait for both tasks to exit after [`stop`](Self::stop).
    pub async fn join(&self) {
        let handles = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Stopping(handles) => handles,
                Lifecycle::Running(handles) => {
                    *lifecycle = Lifecycle::Running(handles);
                    warn!("Reminder scheduler join called before stop");
                    return;
                }
                other => {
                    *lifecycle = other;
                    return;
                }
            }
        };

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Reminder task ended abnormally");
            }
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn run_periodic<N, F, Fut>(
    task: &'static str,
    clock: Clock,
    mut shutdown: watch::Receiver<bool>,
    next_run: N,
    tick: F,
) where
    N: Fn(DateTime<Utc>) -> DateTime<Utc>,
    F: Fn(DateTime<Utc>) -> Fut,
    Fut: std::future::Future<Output = TickReport>,
{
    let mut after = clock();

    loop {
        let fire_at = next_run(after);
        info!(task, next_run = %fire_at, "Next reminder check scheduled");

        let wait = (fire_at - clock()).to_std().unwrap_or_default();

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        if *shutdown.borrow_and_update() {
            break;
        }

        let report = tick(fire_at.max(clock())).await;
        if report.errors > 0 {
            warn!(task, errors = report.errors, "Reminder check finished with errors");
        }

        // A clock lagging behind the timer must not bring `fire_at` back
        after = fire_at.max(clock());
    }

    info!(task, "Reminder task exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::SubsecRound;
    use shared::{Error, Result};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn event(id: i64, date: &str, time: &str, reminder_day: bool, reminder_day_before: bool) -> Event {
        Event {
            id,
            title: format!("Event {}", id),
            description: String::new(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: time.to_string(),
            location: String::new(),
            email: "family@example.com".to_string(),
            phone: "+5491100000000".to_string(),
            reminder_day,
            reminder_day_before,
            is_all_day: time.is_empty(),
        }
    }

    struct FakeStore {
        events: Vec<Event>,
        fail: bool,
        queried: Mutex<Vec<NaiveDate>>,
    }

    impl FakeStore {
        fn new(events: Vec<Event>) -> Self {
            Self {
                events,
                fail: false,
                queried: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl EventStore for FakeStore {
        async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
            self.queried.lock().unwrap().push(date);
            if self.fail {
                return Err(Error::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self
                .events
                .iter()
                .filter(|e| e.date == date)
                .cloned()
                .collect())
        }
    }

    /// Records every attempt; fails for the listed event ids.
    struct RecordingNotifier {
        name: &'static str,
        fail_for: Vec<i64>,
        skip: bool,
        calls: Mutex<Vec<(i64, ReminderKind)>>,
    }

    impl RecordingNotifier {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail_for: Vec::new(),
                skip: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing_for(name: &'static str, ids: &[i64]) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail_for: ids.to_vec(),
                skip: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn skipping(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail_for: Vec::new(),
                skip: true,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn ids(&self) -> Vec<i64> {
            self.calls.lock().unwrap().iter().map(|(id, _)| *id).collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn channel(&self) -> &'static str {
            self.name
        }

        async fn notify(&self, event: &Event, kind: ReminderKind) -> Result<Delivery> {
            self.calls.lock().unwrap().push((event.id, kind));
            if self.fail_for.contains(&event.id) {
                return Err(Error::delivery(self.name, "provider unavailable"));
            }
            if self.skip {
                return Ok(Delivery::Skipped { reason: "not configured" });
            }
            Ok(Delivery::Sent {
                id: format!("{}-{}", self.name, event.id),
            })
        }
    }

    fn dispatcher(store: FakeStore, notifiers: &[Arc<RecordingNotifier>]) -> ReminderDispatcher {
        ReminderDispatcher::new(
            Arc::new(store),
            notifiers
                .iter()
                .map(|n| n.clone() as Arc<dyn Notifier>)
                .collect(),
        )
    }

    /// Wall clock starting at `base` and advancing with tokio's (paused) time.
    fn paused_clock(base: DateTime<Utc>) -> Clock {
        let origin = tokio::time::Instant::now();
        Arc::new(move || base + Duration::from_std(origin.elapsed()).unwrap())
    }

    fn hours_mins(h: u64, m: u64) -> std::time::Duration {
        std::time::Duration::from_secs(h * 3600 + m * 60)
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Store whose lookups take a configurable amount of (tokio) time per date.
    struct SlowStore {
        clock: Clock,
        delays: Vec<(NaiveDate, std::time::Duration)>,
        calls: Mutex<Vec<(NaiveDate, DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl SlowStore {
        fn new(clock: Clock, delays: &[(NaiveDate, std::time::Duration)]) -> Arc<Self> {
            Arc::new(Self {
                clock,
                delays: delays.to_vec(),
                calls: Mutex::new(Vec::new()),
            })
        }

        /// (start, finish) of every lookup for `date`, to the second.
        fn calls_for(&self, date: NaiveDate) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(d, _, _)| *d == date)
                .map(|(_, start, end)| (start.trunc_subsecs(0), end.trunc_subsecs(0)))
                .collect()
        }

        fn starts_for(&self, date: NaiveDate) -> Vec<DateTime<Utc>> {
            self.calls_for(date).into_iter().map(|(start, _)| start).collect()
        }
    }

    #[async_trait]
    impl EventStore for SlowStore {
        async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
            let started = (self.clock)();
            if let Some((_, delay)) = self.delays.iter().find(|(d, _)| *d == date) {
                tokio::time::sleep(*delay).await;
            }
            let finished = (self.clock)();
            self.calls.lock().unwrap().push((date, started, finished));
            Ok(Vec::new())
        }
    }

    fn slow_scheduler(store: Arc<SlowStore>) -> ReminderScheduler {
        let clock = store.clock.clone();
        ReminderScheduler::with_clock(ReminderDispatcher::new(store, Vec::new()), clock)
    }

    #[test]
    fn test_next_daily_run() {
        let nine = DAY_BEFORE_CHECK_AT;
        assert_eq!(nine, NaiveTime::from_hms_opt(9, 0, 0).unwrap());

        assert_eq!(
            next_daily_run(at("2024-06-01T08:59:59Z"), nine),
            at("2024-06-01T09:00:00Z")
        );
        assert_eq!(
            next_daily_run(at("2024-06-01T09:00:00Z"), nine),
            at("2024-06-02T09:00:00Z")
        );
        assert_eq!(
            next_daily_run(at("2024-12-31T23:00:00Z"), nine),
            at("2025-01-01T09:00:00Z")
        );
    }

    #[test]
    fn test_next_hourly_run() {
        assert_eq!(
            next_hourly_run(at("2024-06-02T13:00:00Z")),
            at("2024-06-02T14:00:00Z")
        );
        assert_eq!(
            next_hourly_run(at("2024-06-02T13:42:17.250Z")),
            at("2024-06-02T14:00:00Z")
        );
        assert_eq!(
            next_hourly_run(at("2024-06-02T23:30:00Z")),
            at("2024-06-03T00:00:00Z")
        );
    }

    #[tokio::test]
    async fn test_day_before_selects_tomorrows_opted_in_events() {
        let store = FakeStore::new(vec![
            event(1, "2024-06-02", "", false, true),
            event(2, "2024-06-02", "10:00", true, false),
            event(3, "2024-06-03", "10:00", true, true),
            event(4, "2024-06-01", "10:00", true, true),
        ]);
        let email = RecordingNotifier::new("email");
        let dispatcher = dispatcher(store, &[email.clone()]);

        let report = dispatcher.check_day_before(at("2024-06-01T09:00:00Z")).await;

        assert_eq!(email.ids(), vec![1]);
        assert_eq!(
            email.calls.lock().unwrap()[0],
            (1, ReminderKind::DayBefore)
        );
        assert_eq!(report.events_found, 2);
        assert_eq!(report.reminders_due, 1);
        assert_eq!(report.notifications_sent, 1);
    }

    #[tokio::test]
    async fn test_day_before_queries_tomorrow() {
        let store = Arc::new(FakeStore::new(Vec::new()));
        let dispatcher = ReminderDispatcher::new(store.clone(), Vec::new());

        dispatcher.check_day_before(at("2024-06-30T09:00:00Z")).await;

        assert_eq!(
            *store.queried.lock().unwrap(),
            vec![NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_same_day_window() {
        let events = vec![event(1, "2024-06-02", "14:00", true, false)];
        let cases = [
            ("2024-06-02T13:00:00Z", true),
            ("2024-06-02T12:59:59Z", false),
            ("2024-06-02T14:00:00Z", false),
        ];

        for (now, expected) in cases {
            let whatsapp = RecordingNotifier::new("whatsapp");
            let dispatcher = dispatcher(FakeStore::new(events.clone()), &[whatsapp.clone()]);

            dispatcher.check_same_day(at(now)).await;

            assert_eq!(!whatsapp.ids().is_empty(), expected, "now = {}", now);
        }
    }

    #[tokio::test]
    async fn test_same_day_skips_all_day_and_malformed() {
        let store = FakeStore::new(vec![
            event(1, "2024-06-02", "", true, false),
            event(2, "2024-06-02", "14h", true, false),
            event(3, "2024-06-02", "14:00", true, false),
            event(4, "2024-06-02", "14:00", false, true),
        ]);
        let email = RecordingNotifier::new("email");
        let dispatcher = dispatcher(store, &[email.clone()]);

        let report = dispatcher.check_same_day(at("2024-06-02T13:00:00Z")).await;

        assert_eq!(email.ids(), vec![3]);
        assert_eq!(report.events_found, 4);
        assert_eq!(report.reminders_due, 1);
        assert_eq!(report.errors, 0);
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_stop_other_channels_or_events() {
        let store = FakeStore::new(vec![
            event(1, "2024-06-02", "", false, true),
            event(2, "2024-06-02", "", false, true),
        ]);
        let email = RecordingNotifier::failing_for("email", &[1]);
        let whatsapp = RecordingNotifier::new("whatsapp");
        let dispatcher = dispatcher(store, &[email.clone(), whatsapp.clone()]);

        let report = dispatcher.check_day_before(at("2024-06-01T09:00:00Z")).await;

        assert_eq!(email.ids(), vec![1, 2]);
        assert_eq!(whatsapp.ids(), vec![1, 2]);
        assert_eq!(report.notifications_sent, 3);
        assert_eq!(report.errors, 1);
    }

    #[tokio::test]
    async fn test_unconfigured_channel_counts_as_skipped() {
        let store = FakeStore::new(vec![event(1, "2024-06-02", "", false, true)]);
        let email = RecordingNotifier::skipping("email");
        let whatsapp = RecordingNotifier::new("whatsapp");
        let dispatcher = dispatcher(store, &[email, whatsapp]);

        let report = dispatcher.check_day_before(at("2024-06-01T09:00:00Z")).await;

        assert_eq!(report.notifications_sent, 1);
        assert_eq!(report.notifications_skipped, 1);
        assert_eq!(report.errors, 0);
    }

    #[tokio::test]
    async fn test_store_failure_skips_tick() {
        let email = RecordingNotifier::new("email");
        let dispatcher = dispatcher(FakeStore::failing(), &[email.clone()]);

        let report = dispatcher.check_same_day(at("2024-06-02T13:00:00Z")).await;

        assert!(email.ids().is_empty());
        assert_eq!(
            report,
            TickReport {
                errors: 1,
                ..TickReport::default()
            }
        );
    }

    #[tokio::test]
    async fn test_repeated_ticks_renotify() {
        let events = vec![event(1, "2024-06-02", "14:30", true, false)];
        let email = RecordingNotifier::new("email");
        let dispatcher = dispatcher(FakeStore::new(events), &[email.clone()]);

        dispatcher.check_same_day(at("2024-06-02T13:45:00Z")).await;
        dispatcher.check_same_day(at("2024-06-02T14:00:00Z")).await;

        assert_eq!(email.ids(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let scheduler = ReminderScheduler::new(dispatcher(FakeStore::new(Vec::new()), &[]));
        assert!(!scheduler.is_running());

        scheduler.start();
        assert!(scheduler.is_running());

        // Second start is ignored
        scheduler.start();
        assert!(scheduler.is_running());

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::timeout(std::time::Duration::from_secs(5), scheduler.join())
            .await
            .expect("reminder tasks should exit after stop");

        // Stopped schedulers do not restart
        scheduler.start();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_tick_report_logs_as_json() {
        let report = TickReport {
            events_found: 3,
            reminders_due: 1,
            notifications_sent: 1,
            notifications_skipped: 1,
            errors: 0,
        };

        let json: serde_json::Value = serde_json::from_str(&report.to_string()).unwrap();
        assert_eq!(json["events_found"], 3);
        assert_eq!(json["notifications_skipped"], 1);
        assert_eq!(json["errors"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_day_before_tick_does_not_delay_same_day() {
        let clock = paused_clock(at("2024-06-01T08:59:00Z"));
        let store = SlowStore::new(clock, &[(day("2024-06-02"), hours_mins(3, 0))]);
        let scheduler = slow_scheduler(store.clone());

        scheduler.start();
        tokio::time::sleep(hours_mins(3, 30)).await;
        scheduler.stop();
        scheduler.join().await;

        assert_eq!(
            store.calls_for(day("2024-06-02")),
            vec![(at("2024-06-01T09:00:00Z"), at("2024-06-01T12:00:00Z"))]
        );
        assert_eq!(
            store.starts_for(day("2024-06-01")),
            vec![
                at("2024-06-01T09:00:00Z"),
                at("2024-06-01T10:00:00Z"),
                at("2024-06-01T11:00:00Z"),
                at("2024-06-01T12:00:00Z"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_skips_missed_fire_times() {
        let clock = paused_clock(at("2024-06-01T08:59:00Z"));
        let store = SlowStore::new(clock, &[(day("2024-06-01"), hours_mins(2, 30))]);
        let scheduler = slow_scheduler(store.clone());

        scheduler.start();
        tokio::time::sleep(hours_mins(6, 10)).await;
        scheduler.stop();
        scheduler.join().await;

        // 10:00, 11:00, 13:00 and 14:00 fall inside a running tick
        assert_eq!(
            store.calls_for(day("2024-06-01")),
            vec![
                (at("2024-06-01T09:00:00Z"), at("2024-06-01T11:30:00Z")),
                (at("2024-06-01T12:00:00Z"), at("2024-06-01T14:30:00Z")),
                (at("2024-06-01T15:00:00Z"), at("2024-06-01T17:30:00Z")),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_clock_does_not_fire_twice_for_one_instant() {
        // Clock runs slower than tokio's timer, so every wake-up reads a time
        // just before the fire instant it was scheduled for.
        let start = at("2024-06-01T08:59:00Z");
        let origin = tokio::time::Instant::now();
        let slow: Clock = Arc::new(move || {
            start + Duration::from_std(origin.elapsed().mul_f64(0.99)).unwrap()
        });
        let store = SlowStore::new(slow, &[]);
        let scheduler = slow_scheduler(store.clone());

        scheduler.start();
        tokio::time::sleep(hours_mins(1, 30)).await;
        scheduler.stop();
        scheduler.join().await;

        // Day-before at 09:00, same-day at 09:00 and 10:00
        assert_eq!(store.calls_for(day("2024-06-02")).len(), 1);
        assert_eq!(store.calls_for(day("2024-06-01")).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_running_tick_finish_and_starts_no_more() {
        let clock = paused_clock(at("2024-06-01T08:59:00Z"));
        let store = SlowStore::new(clock, &[(day("2024-06-01"), hours_mins(0, 30))]);
        let scheduler = slow_scheduler(store.clone());

        scheduler.start();
        tokio::time::sleep(hours_mins(0, 11)).await;
        scheduler.stop();
        scheduler.join().await;

        assert_eq!(
            store.calls_for(day("2024-06-01")),
            vec![(at("2024-06-01T09:00:00Z"), at("2024-06-01T09:30:00Z"))]
        );

        tokio::time::sleep(hours_mins(48, 0)).await;
        assert_eq!(store.calls_for(day("2024-06-01")).len(), 1);
        assert_eq!(store.calls_for(day("2024-06-02")).len(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let scheduler = ReminderScheduler::new(dispatcher(FakeStore::new(Vec::new()), &[]));
        scheduler.stop();
        scheduler.join().await;

        scheduler.start();
        assert!(!scheduler.is_running());
    }
}
