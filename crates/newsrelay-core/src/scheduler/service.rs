use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::pipeline::IngestionPipeline;
use crate::storage::{Database, TaskRepository};
use crate::Result;

use super::clock::{Clock, SystemClock};
use super::due::{next_occurrence, DueRules};
use super::models::{default_tasks, DueTime};
use super::queue::FireQueue;
use super::tasks::{self, TaskContext};

const HEARTBEAT_EVERY: u64 = 10;

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Polling scheduler that fires registered tasks near their time of day.
///
/// Stopped until [`Scheduler::start`]; each due task runs on its own tokio
/// task so a slow or failing run never delays the loop or other tasks.
pub struct Scheduler {
    ctx: TaskContext,
    rules: DueRules,
    tick: Duration,
    grace: Duration,
    cleanup_hour: u32,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(db: Database, pipeline: Arc<IngestionPipeline>, config: &AppConfig) -> Self {
        let scheduler = &config.scheduler;
        Self {
            ctx: TaskContext {
                db,
                pipeline,
                retention: chrono::Duration::days(i64::from(config.general.retention_days)),
                clock: Arc::new(SystemClock),
            },
            rules: DueRules::from_config(scheduler),
            tick: Duration::from_secs(scheduler.tick_secs.max(1)),
            grace: Duration::from_secs(scheduler.shutdown_grace_secs),
            cleanup_hour: scheduler.cleanup_hour,
            running: Mutex::new(None),
        }
    }

    /// Replace the time source used for due-ness decisions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ctx.clock = clock;
        self
    }

    /// Override the loop tick
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Seed the task registry and start the polling loop. No-op when already running.
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            info!("Scheduler already running");
            return Ok(());
        }

        let seeded = TaskRepository::new(&self.ctx.db)
            .seed(&default_tasks(self.cleanup_hour))
            .await?;
        info!("Scheduled tasks ready ({} newly registered)", seeded);

        let mut running = self.lock_running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let event_loop = EventLoop {
            ctx: self.ctx.clone(),
            rules: self.rules,
            tick: self.tick,
            grace: self.grace,
        };
        let handle = tokio::spawn(event_loop.run(shutdown_rx));

        *running = Some(RunningLoop {
            shutdown: shutdown_tx,
            handle,
        });
        info!("Scheduler started");
        Ok(())
    }

    /// Stop scheduling new work and wait for the loop to exit.
    ///
    /// In-flight tasks get the configured grace period to finish; any still
    /// running after that are detached, not cancelled.
    pub async fn stop(&self) {
        let running = self.lock_running().take();
        let Some(running) = running else {
            debug!("Scheduler not running");
            return;
        };

        info!("Stopping scheduler...");
        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            error!("Scheduler loop ended abnormally: {}", e);
        }
        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_running()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Next run time of every enabled task, soonest first
    pub async fn list_due_times(&self) -> Result<Vec<DueTime>> {
        let now = self.ctx.clock.now();
        let tasks = TaskRepository::new(&self.ctx.db).list_enabled().await?;

        let mut due: Vec<DueTime> = tasks
            .into_iter()
            .map(|task| DueTime {
                next_run: next_occurrence(task.schedule, now),
                task_name: task.name,
                schedule: task.schedule,
                last_run: task.last_run,
            })
            .collect();
        due.sort_by(|a, b| a.next_run.cmp(&b.next_run).then_with(|| a.task_name.cmp(&b.task_name)));

        Ok(due)
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct EventLoop {
    ctx: TaskContext,
    rules: DueRules,
    tick: Duration,
    grace: Duration,
}

impl EventLoop {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_ms = self.tick.as_millis() as u64, "Scheduler loop started");

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut queue: Option<FireQueue> = None;
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("Task execution ended abnormally: {}", e);
                    }
                }

                _ = interval.tick() => {
                    ticks += 1;
                    let now = self.ctx.clock.now();

                    if ticks % HEARTBEAT_EVERY == 0 {
                        info!(
                            in_flight = in_flight.len(),
                            "Scheduler heartbeat #{} at {} UTC",
                            ticks,
                            now.format("%Y-%m-%d %H:%M:%S")
                        );
                    }

                    if queue.is_none() {
                        queue = self.load_queue(now).await;
                    }

                    if let Some(queue) = queue.as_mut() {
                        if queue.is_empty() && ticks % HEARTBEAT_EVERY == 0 {
                            warn!("No scheduled tasks found");
                        }
                        self.fire_due(queue, &mut in_flight, now).await;
                    }
                }
            }
        }

        self.drain(in_flight).await;
        info!("Scheduler loop ended");
    }

    async fn load_queue(&self, now: DateTime<Utc>) -> Option<FireQueue> {
        match TaskRepository::new(&self.ctx.db).list_enabled().await {
            Ok(tasks) => {
                debug!("Loaded {} enabled tasks", tasks.len());
                Some(FireQueue::build(&tasks, &self.rules, now))
            }
            Err(e) => {
                error!("Failed to load scheduled tasks: {}", e);
                None
            }
        }
    }

    /// Launch every task whose window is open and that passes the due-ness rule.
    ///
    /// An entry that does not fire stays queued at the same time and is
    /// checked again on each tick until its window closes.
    async fn fire_due(
        &self,
        queue: &mut FireQueue,
        in_flight: &mut JoinSet<()>,
        now: DateTime<Utc>,
    ) {
        let repo = TaskRepository::new(&self.ctx.db);
        let mut open = queue.pop_open(&self.rules, now).into_iter();

        while let Some(entry) = open.next() {
            if self.rules.window_closed(entry.fire_at, now) {
                debug!(task = %entry.task_name, "Window missed, skipping to next day");
                queue.push_next_day(entry, &self.rules, now);
                continue;
            }

            let task = match repo.find_by_name(&entry.task_name).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    warn!(task = %entry.task_name, "Task no longer registered");
                    continue;
                }
                Err(e) => {
                    error!(task = %entry.task_name, "Failed to load task: {}", e);
                    // Retry on the next tick while the window is still open
                    queue.push(entry.task_name, entry.fire_at);
                    for rest in open.by_ref() {
                        queue.push(rest.task_name, rest.fire_at);
                    }
                    return;
                }
            };

            if task.enabled && self.rules.is_due(&task, now) {
                info!(task = %task.name, "Task is due to run");
                in_flight.spawn(tasks::execute(task, self.ctx.clone()));
                queue.push_next_day(entry, &self.rules, now);
            } else {
                debug!(task = %task.name, enabled = task.enabled, "Task not due");
                queue.push(entry.task_name, entry.fire_at);
            }
        }
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }

        info!("Waiting for {} in-flight tasks", in_flight.len());
        let finished = tokio::time::timeout(self.grace, async {
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    error!("Task execution ended abnormally: {}", e);
                }
            }
        })
        .await;

        if finished.is_err() {
            warn!("Detaching {} tasks still running after shutdown grace", in_flight.len());
            in_flight.detach_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{DeliveryClient, DeliveryError, MessageSink, SinkIdentity};
    use crate::feed::{FeedItem, FeedSource};
    use crate::pipeline::{RunKind, RunOutcome};
    use crate::scheduler::clock::testing::ManualClock;
    use crate::scheduler::models::{Schedule, ScheduledTask, TaskTarget};
    use crate::storage::StatusRepository;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const TICK: Duration = Duration::from_millis(20);

    enum FeedBehavior {
        Items(usize),
        Panic,
        Stall(Arc<AtomicBool>),
    }

    struct TestFeed(FeedBehavior);

    #[async_trait::async_trait]
    impl FeedSource for TestFeed {
        async fn fetch(&self) -> Vec<FeedItem> {
            match &self.0 {
                FeedBehavior::Items(count) => (0..*count)
                    .map(|n| FeedItem {
                        title: format!("Story {}", n),
                        link: format!("https://example.com/{}", n),
                        source: "ESPN".to_string(),
                        image_url: None,
                        description: None,
                    })
                    .collect(),
                FeedBehavior::Panic => panic!("feed exploded"),
                FeedBehavior::Stall(entered) => {
                    entered.store(true, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Vec::new()
                }
            }
        }
    }

    #[derive(Default)]
    struct CountingSink {
        sent: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MessageSink for CountingSink {
        async fn identity(&self) -> std::result::Result<SinkIdentity, DeliveryError> {
            Ok(SinkIdentity { id: 1, username: None })
        }

        async fn send_text(&self, _text: &str, _link_preview: bool) -> std::result::Result<(), DeliveryError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_image(&self, _image_url: &str, _caption: &str) -> std::result::Result<(), DeliveryError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, second).unwrap()
    }

    struct Harness {
        db: Database,
        sink: Arc<CountingSink>,
        clock: Arc<ManualClock>,
        scheduler: Scheduler,
    }

    async fn harness(feed: FeedBehavior, now: DateTime<Utc>, config: AppConfig) -> Harness {
        let db = Database::new_in_memory().await.unwrap();
        let sink = Arc::new(CountingSink::default());
        let clock = Arc::new(ManualClock::new(now));
        let pipeline = IngestionPipeline::new(
            db.clone(),
            Arc::new(TestFeed(feed)),
            DeliveryClient::new(sink.clone(), Duration::ZERO),
        );
        let scheduler = Scheduler::new(db.clone(), Arc::new(pipeline), &config)
            .with_clock(clock.clone())
            .with_tick(TICK);

        Harness {
            db,
            sink,
            clock,
            scheduler,
        }
    }

    async fn last_run(db: &Database, name: &str) -> Option<DateTime<Utc>> {
        TaskRepository::new(db)
            .find_by_name(name)
            .await
            .unwrap()
            .and_then(|task| task.last_run)
    }

    async fn wait_for_last_run(db: &Database, name: &str) -> DateTime<Utc> {
        for _ in 0..200 {
            if let Some(ran_at) = last_run(db, name).await {
                return ran_at;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never ran", name);
    }

    async fn wait_for_run_after(db: &Database, name: &str, after: DateTime<Utc>) -> DateTime<Utc> {
        for _ in 0..200 {
            if let Some(ran_at) = last_run(db, name).await.filter(|ran_at| *ran_at > after) {
                return ran_at;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not run after {}", name, after);
    }

    #[tokio::test]
    async fn test_due_task_fires_once_per_window() {
        let h = harness(FeedBehavior::Items(2), at(10, 0, 30), AppConfig::default()).await;

        h.scheduler.start().await.unwrap();
        assert_eq!(wait_for_last_run(&h.db, "news_hour_10").await, at(10, 0, 30));

        // Many more ticks inside the same window
        tokio::time::sleep(TICK * 10).await;
        h.scheduler.stop().await;

        assert_eq!(h.sink.sent.load(Ordering::SeqCst), 2);
        assert_eq!(last_run(&h.db, "news_hour_11").await, None);

        let status = StatusRepository::new(&h.db)
            .latest(RunKind::Ingestion)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.outcome, RunOutcome::Success);
        assert_eq!(status.articles_posted, 2);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let h = harness(FeedBehavior::Items(0), at(10, 30, 0), AppConfig::default()).await;
        assert!(!h.scheduler.is_running());

        h.scheduler.start().await.unwrap();
        h.scheduler.start().await.unwrap();
        assert!(h.scheduler.is_running());

        let tasks = TaskRepository::new(&h.db).list_all().await.unwrap();
        assert_eq!(tasks.len(), 25);

        h.scheduler.stop().await;
        assert!(!h.scheduler.is_running());
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_missed_window_is_not_fired_late() {
        let h = harness(FeedBehavior::Items(1), at(10, 5, 0), AppConfig::default()).await;

        h.scheduler.start().await.unwrap();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(last_run(&h.db, "news_hour_10").await, None);
        assert_eq!(h.sink.sent.load(Ordering::SeqCst), 0);

        h.clock.set(at(10, 58, 10));
        assert_eq!(wait_for_last_run(&h.db, "news_hour_11").await, at(10, 58, 10));
        assert_eq!(last_run(&h.db, "news_hour_10").await, None);

        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_spacing_is_rechecked_while_window_is_open() {
        let h = harness(FeedBehavior::Items(1), at(10, 30, 0), AppConfig::default()).await;
        let repo = TaskRepository::new(&h.db);
        repo.seed(&[ScheduledTask::new("news_extra_late", TaskTarget::Ingest, Schedule::new(10, 51))])
            .await
            .unwrap();
        repo.update_last_run("news_extra_late", at(10, 0, 0)).await.unwrap();

        h.scheduler.start().await.unwrap();
        tokio::time::sleep(TICK * 3).await;

        // Inside the window but only 49 minutes after the last run
        h.clock.set(at(10, 49, 0));
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(last_run(&h.db, "news_extra_late").await, Some(at(10, 0, 0)));
        assert_eq!(h.sink.sent.load(Ordering::SeqCst), 0);

        h.clock.set(at(10, 51, 0));
        assert_eq!(
            wait_for_run_after(&h.db, "news_extra_late", at(10, 0, 0)).await,
            at(10, 51, 0)
        );
        h.scheduler.stop().await;

        assert_eq!(h.sink.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_in_last_minute_of_window_still_fires() {
        let h = harness(FeedBehavior::Items(1), at(10, 2, 30), AppConfig::default()).await;

        h.scheduler.start().await.unwrap();
        assert_eq!(wait_for_last_run(&h.db, "news_hour_10").await, at(10, 2, 30));
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_task_reenabled_inside_window_fires() {
        let h = harness(FeedBehavior::Items(1), at(9, 30, 0), AppConfig::default()).await;
        let repo = TaskRepository::new(&h.db);

        h.scheduler.start().await.unwrap();
        repo.set_enabled("news_hour_10", false).await.unwrap();

        h.clock.set(at(9, 59, 0));
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(last_run(&h.db, "news_hour_10").await, None);

        repo.set_enabled("news_hour_10", true).await.unwrap();
        h.clock.set(at(10, 1, 0));
        assert_eq!(wait_for_last_run(&h.db, "news_hour_10").await, at(10, 1, 0));
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_task_disabled_after_start_is_skipped() {
        let h = harness(FeedBehavior::Items(1), at(9, 30, 0), AppConfig::default()).await;

        h.scheduler.start().await.unwrap();
        TaskRepository::new(&h.db)
            .set_enabled("news_hour_10", false)
            .await
            .unwrap();

        h.clock.set(at(9, 59, 0));
        tokio::time::sleep(TICK * 5).await;
        h.scheduler.stop().await;

        assert_eq!(last_run(&h.db, "news_hour_10").await, None);
        assert_eq!(h.sink.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_target_is_skipped() {
        let h = harness(FeedBehavior::Items(1), at(10, 0, 0), AppConfig::default()).await;
        let legacy = ScheduledTask {
            target: "send_weekly_digest".to_string(),
            ..ScheduledTask::new("weekly_digest", TaskTarget::Ingest, Schedule::new(10, 0))
        };
        TaskRepository::new(&h.db).seed(&[legacy]).await.unwrap();

        h.scheduler.start().await.unwrap();
        wait_for_last_run(&h.db, "news_hour_10").await;
        tokio::time::sleep(TICK * 3).await;

        assert!(h.scheduler.is_running());
        assert_eq!(last_run(&h.db, "weekly_digest").await, None);
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_panicking_routine_still_records_attempt() {
        let h = harness(FeedBehavior::Panic, at(10, 1, 0), AppConfig::default()).await;

        h.scheduler.start().await.unwrap();
        assert_eq!(wait_for_last_run(&h.db, "news_hour_10").await, at(10, 1, 0));
        assert!(h.scheduler.is_running());

        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_detaches_slow_tasks_after_grace() {
        let mut config = AppConfig::default();
        config.scheduler.shutdown_grace_secs = 0;
        let entered = Arc::new(AtomicBool::new(false));
        let h = harness(FeedBehavior::Stall(entered.clone()), at(10, 0, 0), config).await;

        h.scheduler.start().await.unwrap();
        for _ in 0..200 {
            if entered.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(entered.load(Ordering::SeqCst));

        let stopped = tokio::time::timeout(Duration::from_secs(2), h.scheduler.stop()).await;
        assert!(stopped.is_ok());
        assert!(!h.scheduler.is_running());
    }

    #[tokio::test]
    async fn test_list_due_times() {
        let h = harness(FeedBehavior::Items(0), at(10, 30, 0), AppConfig::default()).await;
        TaskRepository::new(&h.db)
            .seed(&default_tasks(3))
            .await
            .unwrap();

        let due = h.scheduler.list_due_times().await.unwrap();
        assert_eq!(due.len(), 25);
        assert_eq!(due[0].task_name, "news_hour_11");
        assert_eq!(due[0].next_run, at(11, 0, 0));
        assert!(due.iter().all(|d| d.next_run > at(10, 30, 0)));

        let cleanup = due
            .iter()
            .find(|d| d.task_name == "cleanup_old_articles_daily")
            .unwrap();
        assert_eq!(cleanup.next_run, at(3, 0, 0) + chrono::Duration::days(1));
    }
}
