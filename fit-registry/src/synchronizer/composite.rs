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

use std::sync::Arc;
use tracing::warn;

use crate::config::RegistryListenerConfig;
use crate::error::RegistryListenerError;
use crate::observability::events;
use crate::runtime::task_scheduler::TaskScheduler;
use crate::spi::RegistryListenerSpi;
use crate::synchronizer::{
    ActiveAddressSynchronizer, AddressReconciler, AddressSynchronizer,
    PassiveAddressSynchronizer, UnavailableEndpointsSynchronizer,
};

const COMPONENT: &str = "synchronizer_composite";

/// Starts and stops a fixed, ordered set of synchronizers.
pub struct AddressSynchronizerComposite {
    synchronizers: Vec<Arc<dyn AddressSynchronizer>>,
}

impl AddressSynchronizerComposite {
    pub fn new(synchronizers: Vec<Arc<dyn AddressSynchronizer>>) -> Self {
        Self { synchronizers }
    }

    /// Isolation sweep first, then polling when pull is enabled, then push when push is
    /// enabled.
    pub fn from_config(
        config: &RegistryListenerConfig,
        spi: Arc<dyn RegistryListenerSpi>,
        reconciler: AddressReconciler,
        scheduler: TaskScheduler,
    ) -> Self {
        let mut synchronizers: Vec<Arc<dyn AddressSynchronizer>> =
            vec![Arc::new(UnavailableEndpointsSynchronizer::new(
                spi.clone(),
                reconciler.clone(),
                scheduler.clone(),
            ))];
        if config.pull.enabled {
            synchronizers.push(Arc::new(ActiveAddressSynchronizer::new(
                spi.clone(),
                reconciler.clone(),
                scheduler,
                config.pull_interval_ticks(),
            )));
        }
        if config.push.enabled {
            synchronizers.push(Arc::new(PassiveAddressSynchronizer::new(spi, reconciler)));
        }
        Self::new(synchronizers)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.synchronizers
            .iter()
            .map(|synchronizer| synchronizer.name())
            .collect()
    }

    /// Starts every synchronizer in order. When one fails, the ones already started are
    /// stopped again and the error is returned.
    pub fn start(&self) -> Result<(), RegistryListenerError> {
        for (index, synchronizer) in self.synchronizers.iter().enumerate() {
            if let Err(err) = synchronizer.start() {
                warn!(
                    event = events::SYNCHRONIZER_START,
                    component = COMPONENT,
                    synchronizer = synchronizer.name(),
                    err = %err,
                    "synchronizer failed to start; rolling back"
                );
                for started in &self.synchronizers[..index] {
                    started.stop();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Stops every synchronizer, in start order.
    pub fn stop(&self) {
        for synchronizer in &self.synchronizers {
            synchronizer.stop();
        }
    }
}
