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

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::RegistryListenerConfig;
use crate::domain::{Application, Fitable, Topology};
use crate::error::RegistryListenerError;
use crate::fitable_instance::{FitableInfo, FitableInstance, WorkerInfo};
use crate::observability::events;
use crate::runtime::task_scheduler::{PeriodicTask, TaskBody, TaskId, TaskScheduler};
use crate::spi::RegistryListenerSpi;
use crate::synchronizer::{AddressReconciler, AddressSynchronizerComposite};

const COMPONENT: &str = "registry_listener";
const SCHEDULER_THREAD_NAME: &str = "fit-registry-ticker";

/// Entry point for the broker: address lookups and isolation on the call path, with the
/// configured synchronizers keeping the topology current in the background.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use fit_registry::{FitableInfo, RegistryListener, RegistryListenerConfig, RegistryListenerSpi};
/// # fn build(spi: Arc<dyn RegistryListenerSpi>) -> Result<(), fit_registry::RegistryListenerError> {
/// let listener = RegistryListener::new(RegistryListenerConfig::default(), spi);
/// listener.start()?;
///
/// let fitable = FitableInfo::new("genericable", "1.0.0", "fitable", "1.0.0");
/// let instance = listener.get_addresses(&fitable);
/// for application in &instance.application_instances {
///     println!("{} workers", application.workers.len());
/// }
///
/// listener.stop();
/// # Ok(())
/// # }
/// ```
pub struct RegistryListener {
    config: RegistryListenerConfig,
    topology: Arc<Topology>,
    reconciler: AddressReconciler,
    scheduler: TaskScheduler,
    synchronizers: AddressSynchronizerComposite,
}

impl RegistryListener {
    pub fn new(config: RegistryListenerConfig, spi: Arc<dyn RegistryListenerSpi>) -> Self {
        let topology = Arc::new(Topology::new(config.isolation.expiration));
        let reconciler = AddressReconciler::new(topology.clone());
        let scheduler = TaskScheduler::new(SCHEDULER_THREAD_NAME, config.tick());
        let synchronizers = AddressSynchronizerComposite::from_config(
            &config,
            spi,
            reconciler.clone(),
            scheduler.clone(),
        );
        Self {
            config,
            topology,
            reconciler,
            scheduler,
            synchronizers,
        }
    }

    pub fn config(&self) -> &RegistryListenerConfig {
        &self.config
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn reconciler(&self) -> &AddressReconciler {
        &self.reconciler
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn synchronizers(&self) -> &AddressSynchronizerComposite {
        &self.synchronizers
    }

    /// Starts the synchronizers, then the tick thread driving them.
    pub fn start(&self) -> Result<(), RegistryListenerError> {
        self.synchronizers.start()?;
        if let Err(err) = self.scheduler.start() {
            self.synchronizers.stop();
            return Err(err);
        }
        info!(
            event = events::SYNCHRONIZER_START,
            component = COMPONENT,
            synchronizers = ?self.synchronizers.names(),
            "registry listener started"
        );
        Ok(())
    }

    /// Stops the synchronizers and waits for the tick thread to exit.
    pub fn stop(&self) {
        self.synchronizers.stop();
        self.scheduler.shutdown();
        info!(
            event = events::SYNCHRONIZER_STOP,
            component = COMPONENT,
            "registry listener stopped"
        );
    }

    /// With `create_new`, the fitable is requested: it is kept, and followed by the push
    /// synchronizer, while no provider serves it, until [`RegistryListener::release_fitable`].
    pub fn get_fitable(&self, info: &FitableInfo, create_new: bool) -> Option<Arc<Fitable>> {
        if create_new {
            self.topology.request_fitable(info)
        } else {
            self.topology.get_fitable(info, false)
        }
    }

    /// Gives up the local interest in `info`; an unserved fitable then leaves the topology.
    pub fn release_fitable(&self, info: &FitableInfo) -> bool {
        self.topology.release_fitable(info)
    }

    pub fn get_application(
        &self,
        name: &str,
        name_version: &str,
        extensions: Option<BTreeMap<String, String>>,
        create_new: bool,
    ) -> Option<Arc<Application>> {
        self.topology
            .get_application(name, name_version, extensions, create_new)
    }

    /// Current providers of `info`, without disabled or isolated endpoints. Empty when
    /// nothing is known yet; the lookup registers the fitable for synchronization.
    pub fn get_addresses(&self, info: &FitableInfo) -> FitableInstance {
        self.topology.get_addresses(info)
    }

    /// Excludes every endpoint of `worker` from `fitable`'s addresses until the isolation
    /// sweep expires it. Returns the number of endpoints isolated.
    pub fn isolate(&self, fitable: &FitableInfo, worker: &WorkerInfo) -> usize {
        self.topology.isolate(fitable, worker)
    }

    pub fn un_isolate(&self, fitable: &FitableInfo, host: &str, port: u16) -> bool {
        self.topology.un_isolate(fitable, host, port)
    }

    pub fn schedule_task(&self, name: &str, period_ticks: u64, body: TaskBody) -> TaskId {
        self.scheduler
            .schedule(PeriodicTask::new(name, period_ticks, body))
    }

    pub fn unschedule_task(&self, task_id: TaskId) -> Result<(), RegistryListenerError> {
        self.scheduler.unschedule(task_id)
    }
}

impl Drop for RegistryListener {
    fn drop(&mut self) {
        if self.scheduler.is_running() {
            self.stop();
        }
    }
}
