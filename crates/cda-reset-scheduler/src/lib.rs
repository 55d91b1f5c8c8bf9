// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Annual reset scheduling. A cron trigger fires the reset once per eligible
//! window; a daily trigger emits reminder and overdue notifications. Every
//! reset passes through the on-chain eligibility gate, runs auditable
//! pre-reset tasks (report + backup) whose failure aborts the attempt, and
//! supports a dry-run mode that stops short of the state-mutating call.

use std::{collections::BTreeMap, str::FromStr, sync::RwLock};

use cda_ledger::{
    errors::CodedError,
    impl_coded_debug,
    notify::{Notifier, Severity},
    reports::ReportWriter,
    schedule::CronTrigger,
    CategoryCaps, Category, LedgerError, ResetLedgerObj, TokenLedgerObj,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub mod reports;

use reports::{final_cycle_report, new_cycle_report};

/// Default reset window: August 1st at midnight UTC.
pub const DEFAULT_RESET_CRON: &str = "0 0 1 8 *";
/// Daily eligibility/reminder pass at 09:00 UTC.
const DAILY_ELIGIBILITY_CRON: &str = "0 9 * * *";
/// Reminders start this many days before eligibility.
const REMINDER_WINDOW_DAYS: u64 = 30;
/// Re-evaluation period when a trigger has no upcoming fire time.
const TRIGGER_RECHECK: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const NOTIFY_SOURCE: &str = "CDA Reset Scheduler";

/// Process-wide reset configuration. Mutable via [`ResetSchedulerService::update_schedule`];
/// changes take effect at the next trigger evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetSchedule {
    pub enabled: bool,
    pub cron: String,
    pub dry_run: bool,
    pub notification_webhook: Option<Url>,
}

impl Default for ResetSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: DEFAULT_RESET_CRON.to_string(),
            dry_run: false,
            notification_webhook: None,
        }
    }
}

/// Field-wise overlay for [`ResetSchedule`].
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub enabled: Option<bool>,
    pub cron: Option<String>,
    pub dry_run: Option<bool>,
    pub notification_webhook: Option<Option<Url>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub schedule: ResetSchedule,
    pub next_reset: Option<String>,
}

#[derive(Error)]
pub enum SchedulerError {
    #[error("{code} failed to lock scheduler state", code = self.code())]
    LockFailed,

    #[error("{code} invalid cron expression: {0}", code = self.code())]
    InvalidCron(String),

    #[error("{code} {0}", code = self.code())]
    Ledger(#[from] LedgerError),

    #[error("{code} pre-reset tasks failed: {0:#}", code = self.code())]
    PreResetFailed(anyhow::Error),

    #[error("{code} failed to write report: {0:#}", code = self.code())]
    Report(anyhow::Error),
}

impl_coded_debug!(SchedulerError);

impl CodedError for SchedulerError {
    fn code(&self) -> &str {
        match self {
            SchedulerError::LockFailed => "[C-SCH-401]",
            SchedulerError::InvalidCron(_) => "[C-SCH-402]",
            SchedulerError::Ledger(_) => "[C-SCH-403]",
            SchedulerError::PreResetFailed(_) => "[C-SCH-404]",
            SchedulerError::Report(_) => "[C-SCH-405]",
        }
    }
}

pub struct ResetSchedulerService {
    token: TokenLedgerObj,
    reset: ResetLedgerObj,
    caps: CategoryCaps,
    schedule: RwLock<ResetSchedule>,
    notifier: RwLock<Notifier>,
    reports: ReportWriter,
    backups: ReportWriter,
    cancel: CancellationToken,
}

impl ResetSchedulerService {
    pub fn new(
        token: TokenLedgerObj,
        reset: ResetLedgerObj,
        caps: CategoryCaps,
        schedule: ResetSchedule,
        reports: ReportWriter,
        backups: ReportWriter,
        cancel: CancellationToken,
    ) -> Result<Self, SchedulerError> {
        // An unparsable expression is a configuration error: fail before
        // running rather than discovering it at the first evaluation.
        schedule
            .cron
            .parse::<CronTrigger>()
            .map_err(|err| SchedulerError::InvalidCron(err.to_string()))?;
        let notifier = Notifier::new(NOTIFY_SOURCE, schedule.notification_webhook.clone());
        Ok(Self {
            token,
            reset,
            caps,
            schedule: RwLock::new(schedule),
            notifier: RwLock::new(notifier),
            reports,
            backups,
            cancel,
        })
    }

    pub fn schedule(&self) -> Result<ResetSchedule, SchedulerError> {
        Ok(self.schedule.read().map_err(|_| SchedulerError::LockFailed)?.clone())
    }

    /// Merges the update into the live configuration. Takes effect on the
    /// next trigger evaluation, not retroactively.
    pub fn update_schedule(&self, update: ScheduleUpdate) -> Result<ResetSchedule, SchedulerError> {
        if let Some(cron) = &update.cron {
            cron.parse::<CronTrigger>()
                .map_err(|err| SchedulerError::InvalidCron(err.to_string()))?;
        }

        let mut schedule = self.schedule.write().map_err(|_| SchedulerError::LockFailed)?;
        if let Some(enabled) = update.enabled {
            schedule.enabled = enabled;
        }
        if let Some(cron) = update.cron {
            schedule.cron = cron;
        }
        if let Some(dry_run) = update.dry_run {
            schedule.dry_run = dry_run;
        }
        if let Some(webhook) = update.notification_webhook {
            schedule.notification_webhook = webhook.clone();
            let mut notifier = self.notifier.write().map_err(|_| SchedulerError::LockFailed)?;
            *notifier = Notifier::new(NOTIFY_SOURCE, webhook);
        }
        tracing::info!("Schedule updated: {:?}", *schedule);
        Ok(schedule.clone())
    }

    pub fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let schedule = self.schedule()?;
        let next_reset = schedule
            .cron
            .parse::<CronTrigger>()
            .ok()
            .and_then(|trigger| trigger.next_fire(Utc::now()))
            .map(|at| at.to_rfc3339());
        Ok(SchedulerStatus { schedule, next_reset })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn notify(&self, severity: Severity, title: &str, message: &str) {
        let notifier = match self.notifier.read() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                tracing::error!("Notifier lock poisoned; dropping notification `{title}`");
                return;
            }
        };
        notifier.send(severity, title, message).await;
    }

    /// Runs until cancelled. Both triggers are re-evaluated every iteration
    /// so configuration updates apply at the next firing.
    pub async fn run(&self) -> Result<(), SchedulerError> {
        let daily = DAILY_ELIGIBILITY_CRON
            .parse::<CronTrigger>()
            .map_err(|err| SchedulerError::InvalidCron(err.to_string()))?;
        {
            let schedule = self.schedule()?;
            tracing::info!(
                "Reset scheduler running: `{}` ({})",
                schedule.cron,
                if schedule.dry_run { "DRY RUN" } else { "LIVE" }
            );
        }

        loop {
            let schedule = self.schedule()?;
            let trigger = schedule
                .cron
                .parse::<CronTrigger>()
                .map_err(|err| SchedulerError::InvalidCron(err.to_string()))?;
            let now = Utc::now();
            let reset_wait = wait_for(trigger.next_fire(now), now);
            let daily_wait = wait_for(daily.next_fire(now), now);

            tokio::select! {
                _ = tokio::time::sleep(reset_wait) => {
                    if self.schedule()?.enabled {
                        self.execute_scheduled_reset().await;
                    } else {
                        tracing::info!("Reset window reached but scheduling is disabled");
                    }
                }
                _ = tokio::time::sleep(daily_wait) => {
                    self.check_reset_eligibility().await;
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("Reset scheduler stopped");
                    return Ok(());
                }
            }
        }
    }

    /// One reset attempt. Failures are terminal for this attempt but never
    /// for the scheduler process; the next window retries.
    pub async fn execute_scheduled_reset(&self) {
        tracing::info!("Executing scheduled reset");
        if let Err(err) = self.try_execute_reset().await {
            tracing::error!("Reset execution failed: {err}");
            self.notify(Severity::Error, "Reset Failed", &format!("Reset execution failed: {err}"))
                .await;
        }
    }

    async fn try_execute_reset(&self) -> Result<(), SchedulerError> {
        let status = self.reset.reset_status().await?;
        if !status.can_reset_now {
            tracing::warn!("Reset not allowed: {}", status.reset_reason);
            self.notify(
                Severity::Error,
                "Reset Failed",
                &format!("Reset not allowed: {}", status.reset_reason),
            )
            .await;
            return Ok(());
        }

        // The audit trail must exist before anything is zeroed; a failed
        // pre-reset task aborts the attempt.
        self.perform_pre_reset_tasks().await?;

        if self.schedule()?.dry_run {
            tracing::info!("DRY RUN: would execute reset now");
            self.notify(
                Severity::Info,
                "Reset Dry Run",
                "Reset would be executed now (dry run mode)",
            )
            .await;
            return Ok(());
        }

        tracing::info!("Initiating annual reset");
        self.reset.initiate_reset().await?;
        tracing::info!("Reset completed successfully");

        self.perform_post_reset_tasks().await?;
        self.notify(
            Severity::Success,
            "Annual Reset Completed",
            "CDA system has been reset successfully. New cycle started.",
        )
        .await;
        Ok(())
    }

    /// Read-only daily pass: reminder when the window approaches, overdue
    /// alert when eligible but not yet reset.
    pub async fn check_reset_eligibility(&self) {
        let outcome: Result<(), SchedulerError> = async {
            let status = self.reset.reset_status().await?;
            let cycle = self.token.cycle_info().await?;

            if status.days_until_eligible > 0 && status.days_until_eligible <= REMINDER_WINDOW_DAYS
            {
                self.notify(
                    Severity::Warning,
                    "Reset Reminder",
                    &format!(
                        "CDA system reset eligible in {} days. Current cycle: {}",
                        status.days_until_eligible, cycle.cycle
                    ),
                )
                .await;
            }

            if status.can_reset_now && status.days_until_eligible == 0 {
                self.notify(
                    Severity::Error,
                    "Reset Overdue",
                    "CDA system is eligible for reset but hasn't been reset yet!",
                )
                .await;
            }
            Ok(())
        }
        .await;

        if let Err(err) = outcome {
            tracing::error!("Failed to check reset eligibility: {err}");
        }
    }

    async fn perform_pre_reset_tasks(&self) -> Result<(), SchedulerError> {
        tracing::info!("Performing pre-reset tasks");
        self.generate_final_cycle_report()
            .await
            .map_err(|err| SchedulerError::PreResetFailed(anyhow::anyhow!("{err}")))?;
        self.backup_current_state()
            .await
            .map_err(SchedulerError::PreResetFailed)?;
        self.notify(
            Severity::Info,
            "Reset Starting",
            "Annual CDA reset is starting. All token balances will be reset to zero.",
        )
        .await;
        Ok(())
    }

    async fn perform_post_reset_tasks(&self) -> Result<(), SchedulerError> {
        tracing::info!("Performing post-reset tasks");
        let cycle = self.token.cycle_info().await?;
        tracing::info!("New cycle started: {}", cycle.cycle);

        let report = new_cycle_report(&cycle, &self.caps, Utc::now());
        self.reports
            .write(&format!("new-cycle-{}", cycle.cycle), &report)
            .map_err(SchedulerError::Report)?;

        // External collaborators (frontends, indexers) learn about the new
        // cycle through the notification side channel.
        self.notify(
            Severity::Info,
            "New Cycle Started",
            &format!("Cycle {} is live with fresh allocations.", cycle.cycle),
        )
        .await;
        Ok(())
    }

    /// Per-category utilization of the closing cycle, written to the audit
    /// trail. Read-only against the ledger.
    pub async fn generate_final_cycle_report(&self) -> Result<std::path::PathBuf, SchedulerError> {
        let cycle = self.token.cycle_info().await?;
        let mut remaining = BTreeMap::new();
        for category in Category::ALL {
            remaining.insert(category, self.token.remaining_allocation(category).await?);
        }
        let report = final_cycle_report(&cycle, &remaining, &self.caps, Utc::now());
        tracing::info!(
            "Overall utilization: {}",
            report.total_utilization.overall_utilization_rate
        );
        self.reports
            .write(&format!("final-cycle-{}", cycle.cycle), &report)
            .map_err(SchedulerError::Report)
    }

    async fn backup_current_state(&self) -> anyhow::Result<()> {
        tracing::info!("Creating pre-reset backup");
        let cycle = self.token.cycle_info().await.map_err(|err| anyhow::anyhow!("{err}"))?;
        let backup = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "cycle_info": cycle,
        });
        self.backups.write("pre-reset-backup", &backup)?;
        Ok(())
    }
}

fn wait_for(next: Option<chrono::DateTime<Utc>>, now: chrono::DateTime<Utc>) -> Duration {
    match next {
        Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO),
        None => TRIGGER_RECHECK,
    }
}

impl FromStr for ScheduleUpdate {
    type Err = serde_json::Error;

    /// Parses a JSON overlay, e.g. `{"dry_run": true}`. Used by operator
    /// tooling; absent fields are left untouched.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        #[derive(Deserialize)]
        struct Raw {
            enabled: Option<bool>,
            cron: Option<String>,
            dry_run: Option<bool>,
            #[serde(default, with = "double_option")]
            notification_webhook: Option<Option<Url>>,
        }
        let raw: Raw = serde_json::from_str(s)?;
        Ok(Self {
            enabled: raw.enabled,
            cron: raw.cron,
            dry_run: raw.dry_run,
            notification_webhook: raw.notification_webhook,
        })
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cda_ledger::test_utils::TestLedger;
    use cda_ledger::TokenLedger;
    use httpmock::prelude::*;
    use tempfile::tempdir;

    use super::*;

    struct Harness {
        ledger: Arc<TestLedger>,
        service: ResetSchedulerService,
        _dir: tempfile::TempDir,
    }

    fn harness(schedule: ResetSchedule) -> Harness {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        let service = ResetSchedulerService::new(
            ledger.clone(),
            ledger.clone(),
            CategoryCaps::default(),
            schedule,
            ReportWriter::new(dir.path().join("reports")),
            ReportWriter::new(dir.path().join("backups")),
            CancellationToken::new(),
        )
        .unwrap();
        Harness { ledger, service, _dir: dir }
    }

    fn schedule_with_webhook(server: &MockServer, dry_run: bool) -> ResetSchedule {
        ResetSchedule {
            enabled: true,
            cron: DEFAULT_RESET_CRON.to_string(),
            dry_run,
            notification_webhook: Some(server.url("/hook").parse().unwrap()),
        }
    }

    fn report_files(dir: &std::path::Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => vec![],
        }
    }

    #[tokio::test]
    async fn ineligible_reset_mutates_nothing_and_notifies_once() {
        let server = MockServer::start_async().await;
        let hook = server
            .mock_async(|when, then| {
                when.method(POST).path("/hook");
                then.status(204);
            })
            .await;

        let h = harness(schedule_with_webhook(&server, false));
        h.ledger.set_reset_eligibility(false, "Cycle has 120 days remaining", 120);

        h.service.execute_scheduled_reset().await;

        assert_eq!(h.ledger.reset_count(), 0);
        assert_eq!(hook.hits_async().await, 1, "exactly one error notification");
        // The gate aborts before any pre-reset reporting.
        assert!(report_files(h.service.reports.dir()).is_empty());
    }

    #[tokio::test]
    async fn dry_run_reports_but_never_calls_reset() {
        let server = MockServer::start_async().await;
        let dry_run_hook = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .json_body_partial(r#"{"embeds": [{"title": "Reset Dry Run"}]}"#);
                then.status(204);
            })
            .await;

        let h = harness(schedule_with_webhook(&server, true));
        h.ledger.set_reset_eligibility(true, "eligible", 0);

        h.service.execute_scheduled_reset().await;

        assert_eq!(h.ledger.reset_count(), 0, "dry run must not mutate the ledger");
        assert_eq!(dry_run_hook.hits_async().await, 1);
        // Pre-reset audit artifacts are still produced.
        let reports = report_files(h.service.reports.dir());
        assert!(reports.iter().any(|name| name.starts_with("final-cycle-1-")));
        let backups = report_files(h.service.backups.dir());
        assert!(backups.iter().any(|name| name.starts_with("pre-reset-backup-")));
    }

    #[tokio::test]
    async fn eligible_reset_runs_pre_and_post_tasks() {
        let server = MockServer::start_async().await;
        let success_hook = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .json_body_partial(r#"{"embeds": [{"title": "Annual Reset Completed"}]}"#);
                then.status(204);
            })
            .await;

        let h = harness(schedule_with_webhook(&server, false));
        h.ledger.set_reset_eligibility(true, "eligible", 0);

        h.service.execute_scheduled_reset().await;

        assert_eq!(h.ledger.reset_count(), 1);
        assert_eq!(h.ledger.cycle_info().await.unwrap().cycle, 2);
        assert_eq!(success_hook.hits_async().await, 1);

        let reports = report_files(h.service.reports.dir());
        assert!(reports.iter().any(|name| name.starts_with("final-cycle-1-")));
        assert!(reports.iter().any(|name| name.starts_with("new-cycle-2-")));
    }

    #[tokio::test]
    async fn pre_reset_failure_aborts_the_reset() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        // Occupy the reports path with a file so report writing fails.
        let blocked = dir.path().join("reports");
        std::fs::write(&blocked, b"occupied").unwrap();

        let service = ResetSchedulerService::new(
            ledger.clone(),
            ledger.clone(),
            CategoryCaps::default(),
            ResetSchedule::default(),
            ReportWriter::new(&blocked),
            ReportWriter::new(dir.path().join("backups")),
            CancellationToken::new(),
        )
        .unwrap();
        ledger.set_reset_eligibility(true, "eligible", 0);

        service.execute_scheduled_reset().await;

        assert_eq!(ledger.reset_count(), 0, "missing audit trail must abort the reset");
    }

    #[tokio::test]
    async fn eligibility_reminder_within_thirty_days() {
        let server = MockServer::start_async().await;
        let reminder = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .json_body_partial(r#"{"embeds": [{"title": "Reset Reminder"}]}"#);
                then.status(204);
            })
            .await;

        let h = harness(schedule_with_webhook(&server, false));
        h.ledger.set_reset_eligibility(false, "soon", 20);
        h.service.check_reset_eligibility().await;
        assert_eq!(reminder.hits_async().await, 1);

        // Outside the window: no reminder.
        h.ledger.set_reset_eligibility(false, "later", 100);
        h.service.check_reset_eligibility().await;
        assert_eq!(reminder.hits_async().await, 1);
        assert_eq!(h.ledger.reset_count(), 0, "eligibility check never mutates");
    }

    #[tokio::test]
    async fn overdue_alert_when_eligible_but_unreset() {
        let server = MockServer::start_async().await;
        let overdue = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .json_body_partial(r#"{"embeds": [{"title": "Reset Overdue"}]}"#);
                then.status(204);
            })
            .await;

        let h = harness(schedule_with_webhook(&server, false));
        h.ledger.set_reset_eligibility(true, "overdue", 0);
        h.service.check_reset_eligibility().await;
        assert_eq!(overdue.hits_async().await, 1);
        assert_eq!(h.ledger.reset_count(), 0);
    }

    #[tokio::test]
    async fn schedule_update_merges_fields() {
        let h = harness(ResetSchedule::default());

        let updated = h
            .service
            .update_schedule(ScheduleUpdate {
                dry_run: Some(true),
                cron: Some("0 0 1 9 *".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert!(updated.enabled, "untouched fields keep their values");
        assert!(updated.dry_run);
        assert_eq!(updated.cron, "0 0 1 9 *");

        let err = h
            .service
            .update_schedule(ScheduleUpdate { cron: Some("bogus".to_string()), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron(_)));
        // The rejected update left the schedule untouched.
        assert_eq!(h.service.schedule().unwrap().cron, "0 0 1 9 *");
    }

    #[tokio::test]
    async fn status_reports_next_fire_time() {
        let h = harness(ResetSchedule::default());
        let status = h.service.status().unwrap();
        let next: chrono::DateTime<Utc> = status.next_reset.unwrap().parse().unwrap();
        assert_eq!((next.format("%m-%d %H:%M").to_string()), "08-01 00:00");
    }

    #[test]
    fn schedule_update_parses_json_overlay() {
        let update: ScheduleUpdate = r#"{"dry_run": true}"#.parse().unwrap();
        assert_eq!(update.dry_run, Some(true));
        assert!(update.enabled.is_none());
        assert!(update.notification_webhook.is_none());

        let update: ScheduleUpdate = r#"{"notification_webhook": null}"#.parse().unwrap();
        assert_eq!(update.notification_webhook, Some(None));
    }
}
