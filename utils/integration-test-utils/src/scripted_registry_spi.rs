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

use async_trait::async_trait;
use fit_registry::observability::events;
use fit_registry::{
    CallbackIdentityKey, FitableInfo, FitableInstance, FitablesChangedCallback,
    RegistryListenerError, RegistryListenerSpi,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SpiCall {
    Query(Vec<FitableInfo>),
    Subscribe(Vec<FitableInfo>),
    Unsubscribe(Vec<FitableInfo>),
}

/// In-memory registry whose answers are set by the test, recording every call made to it.
#[derive(Default)]
pub struct ScriptedRegistrySpi {
    instances: Mutex<BTreeMap<FitableInfo, FitableInstance>>,
    failing: AtomicBool,
    query_delay: Mutex<Duration>,
    calls: Mutex<Vec<SpiCall>>,
    callbacks: Mutex<HashSet<CallbackIdentityKey>>,
}

impl ScriptedRegistrySpi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the snapshot returned for the instance's fitable.
    pub fn set_instance(&self, instance: FitableInstance) {
        if let Some(fitable) = instance.fitable.clone() {
            self.instances.lock().unwrap().insert(fitable, instance);
        }
    }

    pub fn remove_instance(&self, fitable: &FitableInfo) {
        self.instances.lock().unwrap().remove(fitable);
    }

    /// While failing, every remote call returns `RemoteUnavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every query is recorded first, then held for `delay` before it answers.
    pub fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<SpiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, SpiCall::Query(_)))
            .count()
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    /// Delivers `instances` to every registered callback on the calling thread.
    pub fn push(&self, instances: &[FitableInstance]) {
        let callbacks: Vec<Arc<dyn FitablesChangedCallback>> = self
            .callbacks
            .lock()
            .unwrap()
            .iter()
            .map(|key| key.callback().clone())
            .collect();
        for callback in callbacks {
            callback.notify(instances);
        }
    }

    fn record(&self, call: SpiCall) {
        debug!(
            event = events::SPI_CALL_RECORDED,
            component = "scripted_registry_spi",
            call = ?call,
            "scripted registry call"
        );
        self.calls.lock().unwrap().push(call);
    }

    fn check_available(&self, operation: &'static str) -> Result<(), RegistryListenerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryListenerError::remote_unavailable(
                operation,
                "scripted failure",
            ));
        }
        Ok(())
    }

    fn resolve(&self, fitables: &[FitableInfo]) -> Vec<FitableInstance> {
        let instances = self.instances.lock().unwrap();
        fitables
            .iter()
            .map(|fitable| {
                instances
                    .get(fitable)
                    .cloned()
                    .unwrap_or_else(|| FitableInstance::new(fitable.clone(), Vec::new()))
            })
            .collect()
    }
}

#[async_trait]
impl RegistryListenerSpi for ScriptedRegistrySpi {
    async fn query_fitable_instances(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<Vec<FitableInstance>, RegistryListenerError> {
        self.record(SpiCall::Query(fitables.to_vec()));
        let delay = *self.query_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_available("query_fitable_instances")?;
        Ok(self.resolve(fitables))
    }

    async fn subscribe_fitables(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<Vec<FitableInstance>, RegistryListenerError> {
        self.record(SpiCall::Subscribe(fitables.to_vec()));
        self.check_available("subscribe_fitables")?;
        Ok(self.resolve(fitables))
    }

    async fn unsubscribe_fitables(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<(), RegistryListenerError> {
        self.record(SpiCall::Unsubscribe(fitables.to_vec()));
        self.check_available("unsubscribe_fitables")
    }

    fn subscribe_fitables_changed(&self, callback: Arc<dyn FitablesChangedCallback>) {
        self.callbacks
            .lock()
            .unwrap()
            .insert(CallbackIdentityKey::new(callback));
    }

    fn unsubscribe_fitables_changed(&self, callback: &Arc<dyn FitablesChangedCallback>) {
        self.callbacks
            .lock()
            .unwrap()
            .remove(&CallbackIdentityKey::new(callback.clone()));
    }
}
