/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

//! Pull strategy: re-query every known fitable once per poll interval.

use futures::FutureExt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::domain::lock;
use crate::error::RegistryListenerError;
use crate::fitable_instance::FitableInfo;
use crate::observability::events;
use crate::runtime::task_scheduler::{PeriodicTask, TaskId, TaskScheduler};
use crate::spi::RegistryListenerSpi;
use crate::synchronizer::{AddressReconciler, AddressSynchronizer};

const COMPONENT: &str = "active_synchronizer";
const TASK_NAME: &str = "registry-poll";

pub struct ActiveAddressSynchronizer {
    spi: Arc<dyn RegistryListenerSpi>,
    reconciler: AddressReconciler,
    scheduler: TaskScheduler,
    interval_ticks: u64,
    task: Mutex<Option<TaskId>>,
}

impl ActiveAddressSynchronizer {
    pub fn new(
        spi: Arc<dyn RegistryListenerSpi>,
        reconciler: AddressReconciler,
        scheduler: TaskScheduler,
        interval_ticks: u64,
    ) -> Self {
        Self {
            spi,
            reconciler,
            scheduler,
            interval_ticks,
            task: Mutex::new(None),
        }
    }

    /// Runs one poll immediately, outside the scheduler.
    pub async fn sync_once(&self) {
        poll(&self.spi, &self.reconciler).await;
    }
}

async fn poll(spi: &Arc<dyn RegistryListenerSpi>, reconciler: &AddressReconciler) {
    let fitables: Vec<FitableInfo> = reconciler
        .topology()
        .list_fitables()
        .iter()
        .map(|fitable| fitable.info().clone())
        .collect();
    if fitables.is_empty() {
        return;
    }

    match spi.query_fitable_instances(&fitables).await {
        Ok(instances) => {
            debug!(
                event = events::SYNC_QUERY_OK,
                component = COMPONENT,
                fitables = fitables.len(),
                instances = instances.len(),
                "polled fitable instances"
            );
            reconciler.accept_changes(&instances);
        }
        Err(err) => {
            warn!(
                event = events::SYNC_QUERY_FAILED,
                component = COMPONENT,
                fitables = fitables.len(),
                err = %err,
                "poll failed; retrying next interval"
            );
        }
    }
}

impl AddressSynchronizer for ActiveAddressSynchronizer {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    fn start(&self) -> Result<(), RegistryListenerError> {
        let mut task = lock(&self.task);
        if task.is_some() {
            return Ok(());
        }

        let spi = self.spi.clone();
        let reconciler = self.reconciler.clone();
        let body = Arc::new(move || {
            let spi = spi.clone();
            let reconciler = reconciler.clone();
            async move { poll(&spi, &reconciler).await }.boxed()
        });
        *task = Some(
            self.scheduler
                .schedule(PeriodicTask::new(TASK_NAME, self.interval_ticks, body)),
        );
        info!(
            event = events::SYNCHRONIZER_START,
            component = COMPONENT,
            interval_ticks = self.interval_ticks,
            "polling synchronizer started"
        );
        Ok(())
    }

    fn stop(&self) {
        let Some(task_id) = lock(&self.task).take() else {
            return;
        };
        if let Err(err) = self.scheduler.unschedule(task_id) {
            warn!(
                event = events::SYNCHRONIZER_STOP,
                component = COMPONENT,
                err = %err,
                "poll task was already gone"
            );
            return;
        }
        info!(
            event = events::SYNCHRONIZER_STOP,
            component = COMPONENT,
            "polling synchronizer stopped"
        );
    }
}
