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

//! Isolation sweep: ages every isolation marker by one tick and re-queries the fitables whose
//! markers expired.
//!
//! Recovery goes through the ordinary reconciliation path: an endpoint comes back only if the
//! fresh snapshot still lists it.

use futures::FutureExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::domain::{lock, Fitable, FitableUnavailableEndpoint};
use crate::error::RegistryListenerError;
use crate::fitable_instance::FitableInfo;
use crate::observability::events;
use crate::repository::Keyed;
use crate::runtime::task_scheduler::{PeriodicTask, TaskId, TaskScheduler};
use crate::spi::RegistryListenerSpi;
use crate::synchronizer::{AddressReconciler, AddressSynchronizer};

const COMPONENT: &str = "unavailable_endpoints_synchronizer";
const TASK_NAME: &str = "isolation-sweep";

pub struct UnavailableEndpointsSynchronizer {
    spi: Arc<dyn RegistryListenerSpi>,
    reconciler: AddressReconciler,
    scheduler: TaskScheduler,
    task: Mutex<Option<TaskId>>,
}

impl UnavailableEndpointsSynchronizer {
    pub fn new(
        spi: Arc<dyn RegistryListenerSpi>,
        reconciler: AddressReconciler,
        scheduler: TaskScheduler,
    ) -> Self {
        Self {
            spi,
            reconciler,
            scheduler,
            task: Mutex::new(None),
        }
    }

    /// Runs one sweep immediately, outside the scheduler. Returns the number of markers
    /// lifted.
    pub async fn sync_once(&self) -> usize {
        sweep(&self.spi, &self.reconciler).await
    }
}

async fn sweep(spi: &Arc<dyn RegistryListenerSpi>, reconciler: &AddressReconciler) -> usize {
    let topology = reconciler.topology();
    let expired: Vec<Arc<FitableUnavailableEndpoint>> = topology
        .list_unavailable_endpoints()
        .into_iter()
        .filter(|marker| marker.try_expire())
        .collect();
    if expired.is_empty() {
        return 0;
    }

    let fitables: BTreeMap<FitableInfo, Arc<Fitable>> = expired
        .iter()
        .filter_map(|marker| marker.fitable())
        .map(|fitable| (fitable.info().clone(), fitable))
        .collect();
    let infos: Vec<FitableInfo> = fitables.keys().cloned().collect();

    match spi.query_fitable_instances(&infos).await {
        Ok(instances) => {
            reconciler.accept_changes(&instances);
        }
        Err(err) => {
            // Expired markers stay at zero and are retried on the next sweep.
            warn!(
                event = events::SYNC_QUERY_FAILED,
                component = COMPONENT,
                fitables = infos.len(),
                err = %err,
                "unable to re-query isolated fitables"
            );
            return 0;
        }
    }

    let mut lifted = 0;
    for marker in &expired {
        let Some(fitable) = marker.fitable() else {
            continue;
        };
        let removed = fitable
            .unavailable_endpoints()
            .remove_if(marker.key(), |current| {
                // Re-isolated while the query was in flight: keep the fresh countdown.
                std::ptr::eq(current, Arc::as_ptr(marker)) && current.remaining() == 0
            })
            .is_some();
        if removed {
            lifted += 1;
            info!(
                event = events::ISOLATION_EXPIRED,
                component = COMPONENT,
                fitable_id = fitable.info().fitable_id.as_str(),
                host = marker.host(),
                port = marker.port(),
                "endpoint isolation expired"
            );
        }
    }
    for fitable in fitables.values() {
        topology.prune_fitable(fitable);
    }
    lifted
}

impl AddressSynchronizer for UnavailableEndpointsSynchronizer {
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
            async move {
                sweep(&spi, &reconciler).await;
            }
            .boxed()
        });
        *task = Some(self.scheduler.schedule(PeriodicTask::new(TASK_NAME, 1, body)));
        info!(
            event = events::SYNCHRONIZER_START,
            component = COMPONENT,
            "isolation sweep started"
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
                "isolation sweep task was already gone"
            );
            return;
        }
        info!(
            event = events::SYNCHRONIZER_STOP,
            component = COMPONENT,
            "isolation sweep stopped"
        );
    }
}
