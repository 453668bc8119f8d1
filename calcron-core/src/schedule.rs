//! Command flavor: turning events into `at`-style jobs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::JOB_RETENTION_DAYS;
use crate::deferred::{CommandTemplates, EventPlan, plan_event};
use crate::engine::Reconciler;
use crate::error::CalcronResult;
use crate::event::NormalizedEvent;
use crate::ports::{CommandExecutor, JobId};

/// Jobs scheduled for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub ids: Vec<JobId>,
    /// Event end, or the latest job time if that is later.
    pub end: NaiveDateTime,
}

/// Event identifier -> scheduled jobs.
pub type JobMap = BTreeMap<String, JobRecord>;

pub struct CommandScheduler<'a> {
    templates: CommandTemplates,
    description_commands: bool,
    executor: &'a dyn CommandExecutor,
}

impl<'a> CommandScheduler<'a> {
    pub fn new(templates: CommandTemplates, executor: &'a dyn CommandExecutor) -> Self {
        CommandScheduler {
            templates,
            description_commands: false,
            executor,
        }
    }

    /// Take commands from event descriptions instead of the templates.
    pub fn with_description_commands(mut self, enabled: bool) -> Self {
        self.description_commands = enabled;
        self
    }

    async fn cancel(&self, job_ids: &[JobId]) {
        if job_ids.is_empty() {
            return;
        }
        debug!(?job_ids, "Cancelling jobs");
        if let Err(e) = self.executor.cancel(job_ids).await {
            warn!(error = %e, ?job_ids, "Could not cancel jobs");
        }
    }
}

/// Forget records whose event ended more than a retention period ago.
pub fn prune_jobs(jobs: JobMap, now: NaiveDateTime) -> JobMap {
    let cutoff = now - Duration::days(JOB_RETENTION_DAYS);
    jobs.into_iter()
        .filter(|(id, record)| {
            let keep = record.end > cutoff;
            if !keep {
                debug!(event = %id, "Dropping expired job record");
            }
            keep
        })
        .collect()
}

#[async_trait]
impl Reconciler for CommandScheduler<'_> {
    type Records = JobMap;

    async fn reconcile(
        &self,
        mut jobs: JobMap,
        events: Vec<NormalizedEvent>,
        now: NaiveDateTime,
    ) -> CalcronResult<JobMap> {
        let plans: Vec<(NormalizedEvent, EventPlan)> = events
            .into_iter()
            .map(|event| {
                let tracked = jobs.contains_key(&event.id);
                let plan = plan_event(
                    &event,
                    now,
                    tracked,
                    &self.templates,
                    self.description_commands,
                );
                (event, plan)
            })
            .collect();

        // First unschedule every modified or cancelled event
        let mut removed: Vec<JobId> = Vec::new();
        for (event, plan) in &plans {
            if matches!(plan, EventPlan::Keep) {
                continue;
            }
            if matches!(plan, EventPlan::Remove) {
                info!(event = %event.id, "cancelled {}", event.label());
            }
            if let Some(record) = jobs.remove(&event.id) {
                removed.extend(record.ids);
            }
        }
        self.cancel(&removed).await;

        // Then schedule the new and modified ones
        for (event, plan) in plans {
            let EventPlan::Replace(actions) = plan else {
                continue;
            };

            for action in actions {
                if action.at < now {
                    continue;
                }
                match self.executor.schedule(&action.command, action.at).await {
                    Ok(job_id) => {
                        info!(
                            event = %event.id,
                            job = %job_id,
                            at = %action.at,
                            command = %action.command,
                            "Scheduled job"
                        );
                        let record = jobs.entry(event.id.clone()).or_insert_with(|| JobRecord {
                            ids: Vec::new(),
                            end: event.end,
                        });
                        record.ids.push(job_id);
                        record.end = record.end.max(action.at);
                    }
                    Err(e) => {
                        warn!(
                            event = %event.id,
                            error = %e,
                            command = %action.command,
                            "Could not schedule job"
                        );
                    }
                }
            }
        }

        Ok(prune_jobs(jobs, now))
    }

    async fn reset(&self, jobs: JobMap) -> JobMap {
        let job_ids: Vec<JobId> = jobs.into_values().flat_map(|record| record.ids).collect();
        self.cancel(&job_ids).await;
        JobMap::new()
    }
}
