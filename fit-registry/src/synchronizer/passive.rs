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

//! Push strategy: subscribe fitables as they enter the topology and fold server pushes in.
//!
//! Topology observers run on the caller's thread, so they only enqueue commands. A dedicated
//! worker thread drains the queue and issues the subscribe/unsubscribe SPI calls.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::domain::{lock, ObserverId};
use crate::error::RegistryListenerError;
use crate::fitable_instance::{FitableInfo, FitableInstance};
use crate::observability::events;
use crate::runtime::worker_runtime::spawn_runtime_thread;
use crate::spi::{FitablesChangedCallback, RegistryListenerSpi};
use crate::synchronizer::{AddressReconciler, AddressSynchronizer};

const COMPONENT: &str = "passive_synchronizer";
const WORKER_THREAD_NAME: &str = "fit-registry-push";

enum SubscriptionCommand {
    Subscribe(Vec<FitableInfo>),
    Unsubscribe(Vec<FitableInfo>),
    Shutdown,
}

/// Folds pushed instances into the topology on the SPI's delivery thread.
struct ReconcilingCallback {
    reconciler: AddressReconciler,
}

impl FitablesChangedCallback for ReconcilingCallback {
    fn notify(&self, instances: &[FitableInstance]) {
        debug!(
            event = events::SYNC_PUSH_RECEIVED,
            component = COMPONENT,
            instances = instances.len(),
            "registry pushed fitable changes"
        );
        self.reconciler.accept_changes(instances);
    }
}

struct RunningPassive {
    subscribed_observer: ObserverId,
    unsubscribed_observer: ObserverId,
    callback: Arc<dyn FitablesChangedCallback>,
    commands: UnboundedSender<SubscriptionCommand>,
    worker: JoinHandle<()>,
}

pub struct PassiveAddressSynchronizer {
    spi: Arc<dyn RegistryListenerSpi>,
    reconciler: AddressReconciler,
    running: Mutex<Option<RunningPassive>>,
}

impl PassiveAddressSynchronizer {
    pub fn new(spi: Arc<dyn RegistryListenerSpi>, reconciler: AddressReconciler) -> Self {
        Self {
            spi,
            reconciler,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }
}

async fn subscribe(
    spi: &Arc<dyn RegistryListenerSpi>,
    reconciler: &AddressReconciler,
    fitables: &[FitableInfo],
) {
    match spi.subscribe_fitables(fitables).await {
        Ok(instances) => {
            debug!(
                event = events::SYNC_SUBSCRIBE_OK,
                component = COMPONENT,
                fitables = fitables.len(),
                instances = instances.len(),
                "subscribed fitables"
            );
            reconciler.accept_changes(&instances);
        }
        Err(err) => {
            warn!(
                event = events::SYNC_SUBSCRIBE_FAILED,
                component = COMPONENT,
                fitables = fitables.len(),
                err = %err,
                "unable to subscribe fitables"
            );
        }
    }
}

async fn unsubscribe(spi: &Arc<dyn RegistryListenerSpi>, fitables: &[FitableInfo]) {
    if let Err(err) = spi.unsubscribe_fitables(fitables).await {
        warn!(
            event = events::SYNC_UNSUBSCRIBE_FAILED,
            component = COMPONENT,
            fitables = fitables.len(),
            err = %err,
            "unable to unsubscribe fitables"
        );
    }
}

impl AddressSynchronizer for PassiveAddressSynchronizer {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    fn start(&self) -> Result<(), RegistryListenerError> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Ok(());
        }

        let (commands, mut receiver) = mpsc::unbounded_channel();
        let spi = self.spi.clone();
        let reconciler = self.reconciler.clone();
        let worker = spawn_runtime_thread(WORKER_THREAD_NAME, move || async move {
            while let Some(command) = receiver.recv().await {
                match command {
                    SubscriptionCommand::Subscribe(fitables) => {
                        subscribe(&spi, &reconciler, &fitables).await
                    }
                    SubscriptionCommand::Unsubscribe(fitables) => {
                        unsubscribe(&spi, &fitables).await
                    }
                    SubscriptionCommand::Shutdown => break,
                }
            }
        })?;

        // Register for pushes before the bootstrap subscribe so no delta is missed.
        let callback: Arc<dyn FitablesChangedCallback> = Arc::new(ReconcilingCallback {
            reconciler: self.reconciler.clone(),
        });
        self.spi.subscribe_fitables_changed(callback.clone());

        let topology = self.reconciler.topology();
        let subscribed_sender = commands.clone();
        let subscribed_observer =
            topology.observe_fitables_subscribed(Arc::new(move |fitables: &[FitableInfo]| {
                let _ = subscribed_sender.send(SubscriptionCommand::Subscribe(fitables.to_vec()));
            }));
        let unsubscribed_sender = commands.clone();
        let unsubscribed_observer =
            topology.observe_fitables_unsubscribed(Arc::new(move |fitables: &[FitableInfo]| {
                let _ =
                    unsubscribed_sender.send(SubscriptionCommand::Unsubscribe(fitables.to_vec()));
            }));

        let known: Vec<FitableInfo> = topology
            .list_fitables()
            .iter()
            .map(|fitable| fitable.info().clone())
            .collect();
        if !known.is_empty() {
            let _ = commands.send(SubscriptionCommand::Subscribe(known));
        }

        info!(
            event = events::SYNCHRONIZER_START,
            component = COMPONENT,
            "push synchronizer started"
        );
        *running = Some(RunningPassive {
            subscribed_observer,
            unsubscribed_observer,
            callback,
            commands,
            worker,
        });
        Ok(())
    }

    fn stop(&self) {
        let Some(running) = lock(&self.running).take() else {
            return;
        };

        let topology = self.reconciler.topology();
        topology.remove_observer(running.subscribed_observer);
        topology.remove_observer(running.unsubscribed_observer);
        self.spi.unsubscribe_fitables_changed(&running.callback);

        // Commands queued before this one are still served.
        let _ = running.commands.send(SubscriptionCommand::Shutdown);
        if running.worker.thread().id() != thread::current().id()
            && running.worker.join().is_err()
        {
            warn!(
                event = events::SYNCHRONIZER_STOP,
                component = COMPONENT,
                "push worker thread panicked"
            );
        }
        info!(
            event = events::SYNCHRONIZER_STOP,
            component = COMPONENT,
            "push synchronizer stopped"
        );
    }
}
