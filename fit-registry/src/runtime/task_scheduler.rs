/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Cooperative single-thread tick scheduler for periodic synchronization work.
//!
//! One background thread ticks at a fixed interval. On each tick every task counts down by
//! one, and the tasks reaching zero run one after another, in task-id order, before the next
//! tick is taken. A slow task therefore delays every task due after it; no two task bodies
//! ever run concurrently on the same scheduler.

use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::lock;
use crate::error::RegistryListenerError;
use crate::observability::events;
use crate::runtime::worker_runtime::spawn_runtime_thread;

const COMPONENT: &str = "task_scheduler";

pub type TaskId = u64;

/// Body of a periodic task; invoked once per firing.
pub type TaskBody = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A task firing every `period` ticks, counted down cooperatively.
pub struct PeriodicTask {
    name: String,
    period: u64,
    countdown: u64,
    body: TaskBody,
}

impl PeriodicTask {
    pub fn new(name: &str, period: u64, body: TaskBody) -> Self {
        let period = period.max(1);
        Self {
            name: name.to_string(),
            period,
            countdown: period,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consumes one tick. Returns `true` when the task is due, re-arming the countdown.
    pub fn schedule(&mut self) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.countdown = self.period;
            true
        } else {
            false
        }
    }
}

struct RunningScheduler {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    thread_id: ThreadId,
}

struct SchedulerInner {
    name: String,
    tick: Duration,
    tasks: Mutex<BTreeMap<TaskId, PeriodicTask>>,
    next_task_id: AtomicU64,
    running: Mutex<Option<RunningScheduler>>,
}

impl SchedulerInner {
    async fn tick_once(&self) {
        let due: Vec<(TaskId, String, TaskBody)> = lock(&self.tasks)
            .iter_mut()
            .filter_map(|(id, task)| {
                task.schedule()
                    .then(|| (*id, task.name.clone(), task.body.clone()))
            })
            .collect();

        for (task_id, task_name, body) in due {
            debug!(
                event = events::SCHEDULER_TASK_FIRED,
                component = COMPONENT,
                scheduler = self.name.as_str(),
                task_id,
                task_name = task_name.as_str(),
                "running periodic task"
            );
            body().await;
        }
    }
}

/// Handle to a tick scheduler; clones share the same task queue and thread.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
}

impl TaskScheduler {
    pub fn new(name: &str, tick: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                name: name.to_string(),
                tick,
                tasks: Mutex::new(BTreeMap::new()),
                next_task_id: AtomicU64::new(1),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn tick(&self) -> Duration {
        self.inner.tick
    }

    /// Registers `task`; it first fires `period` ticks from now.
    pub fn schedule(&self, task: PeriodicTask) -> TaskId {
        let task_id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            event = events::SCHEDULER_TASK_SCHEDULED,
            component = COMPONENT,
            scheduler = self.inner.name.as_str(),
            task_id,
            task_name = task.name(),
            period = task.period,
            "periodic task scheduled"
        );
        lock(&self.inner.tasks).insert(task_id, task);
        task_id
    }

    pub fn unschedule(&self, task_id: TaskId) -> Result<(), RegistryListenerError> {
        match lock(&self.inner.tasks).remove(&task_id) {
            Some(task) => {
                debug!(
                    event = events::SCHEDULER_TASK_UNSCHEDULED,
                    component = COMPONENT,
                    scheduler = self.inner.name.as_str(),
                    task_id,
                    task_name = task.name(),
                    "periodic task unscheduled"
                );
                Ok(())
            }
            None => Err(RegistryListenerError::NotFound(format!(
                "scheduled task {task_id}"
            ))),
        }
    }

    pub fn task_count(&self) -> usize {
        lock(&self.inner.tasks).len()
    }

    /// Advances every task by one tick on the calling task, running the due ones.
    pub async fn tick_once(&self) {
        self.inner.tick_once().await;
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.running).is_some()
    }

    /// Starts the background tick thread. Starting a running scheduler is a no-op.
    pub fn start(&self) -> Result<(), RegistryListenerError> {
        let mut running = lock(&self.inner.running);
        if running.is_some() {
            return Ok(());
        }

        let (shutdown, mut shutdown_receiver) = oneshot::channel();
        let weak_inner: Weak<SchedulerInner> = Arc::downgrade(&self.inner);
        let tick = self.inner.tick;
        let handle = spawn_runtime_thread(&self.inner.name, move || async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = &mut shutdown_receiver => break,
                    _ = interval.tick() => {
                        let Some(inner) = weak_inner.upgrade() else {
                            break;
                        };
                        inner.tick_once().await;
                    }
                }
            }
        })?;

        info!(
            event = events::SCHEDULER_START,
            component = COMPONENT,
            scheduler = self.inner.name.as_str(),
            tick_millis = tick.as_millis() as u64,
            "scheduler started"
        );
        *running = Some(RunningScheduler {
            shutdown,
            thread_id: handle.thread().id(),
            handle,
        });
        Ok(())
    }

    /// Stops the background thread and waits for it to exit. A tick in progress completes
    /// first.
    pub fn shutdown(&self) {
        let Some(running) = lock(&self.inner.running).take() else {
            return;
        };
        let _ = running.shutdown.send(());

        if running.thread_id == thread::current().id() {
            // Called from a task body; the loop exits once this tick returns.
            warn!(
                event = events::SCHEDULER_STOP,
                component = COMPONENT,
                scheduler = self.inner.name.as_str(),
                "scheduler stopped from its own thread; not joining"
            );
            return;
        }
        if running.handle.join().is_err() {
            warn!(
                event = events::SCHEDULER_STOP,
                component = COMPONENT,
                scheduler = self.inner.name.as_str(),
                "scheduler thread panicked"
            );
            return;
        }
        info!(
            event = events::SCHEDULER_STOP,
            component = COMPONENT,
            scheduler = self.inner.name.as_str(),
            "scheduler stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{PeriodicTask, TaskBody, TaskScheduler};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_body(counter: Arc<AtomicUsize>) -> TaskBody {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[test]
    fn periodic_task_fires_every_period_ticks() {
        let mut task = PeriodicTask::new("t", 3, counting_body(Arc::new(AtomicUsize::new(0))));

        let fired: Vec<bool> = (0..6).map(|_| task.schedule()).collect();

        assert_eq!(fired, vec![false, false, true, false, false, true]);
    }

    #[tokio::test]
    async fn tick_once_runs_due_tasks() {
        let scheduler = TaskScheduler::new("test-scheduler", Duration::from_millis(10));
        let every_tick = Arc::new(AtomicUsize::new(0));
        let every_other = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(PeriodicTask::new("a", 1, counting_body(every_tick.clone())));
        scheduler.schedule(PeriodicTask::new("b", 2, counting_body(every_other.clone())));

        for _ in 0..4 {
            scheduler.tick_once().await;
        }

        assert_eq!(every_tick.load(Ordering::SeqCst), 4);
        assert_eq!(every_other.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unschedule_unknown_task_is_not_found() {
        let scheduler = TaskScheduler::new("test-scheduler", Duration::from_millis(10));
        let task_id = scheduler.schedule(PeriodicTask::new(
            "a",
            1,
            counting_body(Arc::new(AtomicUsize::new(0))),
        ));

        assert!(scheduler.unschedule(task_id).is_ok());
        assert!(scheduler.unschedule(task_id).is_err());
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn background_thread_ticks_until_shutdown() {
        let scheduler = TaskScheduler::new("fit-test-ticker", Duration::from_millis(5));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(PeriodicTask::new("a", 1, counting_body(counter.clone())));

        scheduler.start().expect("scheduler should start");
        assert!(scheduler.is_running());
        std::thread::sleep(Duration::from_millis(100));
        scheduler.shutdown();
        assert!(!scheduler.is_running());

        let fired = counter.load(Ordering::SeqCst);
        assert!(fired > 0);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::SeqCst), fired);
    }
}
