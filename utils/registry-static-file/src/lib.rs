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

//! [`RegistryListenerSpi`] answered from a JSON topology file instead of a registry server.
//!
//! The file holds a `fitableInstances` list. It is read on first use and cached by
//! genericable id; [`RegistryStaticFile::reload`] re-reads it and pushes the fresh snapshots
//! of every subscribed fitable to the registered callbacks.

use async_trait::async_trait;
use fit_registry::observability::events;
use fit_registry::{
    CallbackIdentityKey, FitableInfo, FitableInstance, FitablesChangedCallback,
    RegistryListenerError, RegistryListenerSpi,
};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const COMPONENT: &str = "registry_static_file";

type GenericableCache = HashMap<String, Vec<FitableInstance>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StaticTopology {
    #[serde(default)]
    fitable_instances: Vec<FitableInstance>,
}

pub struct RegistryStaticFile {
    static_file: PathBuf,
    cache: Mutex<Option<Arc<GenericableCache>>>,
    subscribed: Mutex<BTreeSet<FitableInfo>>,
    callbacks: Mutex<HashSet<CallbackIdentityKey>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RegistryStaticFile {
    pub fn new(static_file: impl Into<PathBuf>) -> Self {
        Self {
            static_file: static_file.into(),
            cache: Mutex::new(None),
            subscribed: Mutex::new(BTreeSet::new()),
            callbacks: Mutex::new(HashSet::new()),
        }
    }

    pub fn static_file(&self) -> &Path {
        &self.static_file
    }

    pub fn subscribed_fitables(&self) -> Vec<FitableInfo> {
        lock(&self.subscribed).iter().cloned().collect()
    }

    fn read_topology(&self, operation: &'static str) -> Result<GenericableCache, RegistryListenerError> {
        debug!(
            event = events::STATIC_TOPOLOGY_READ,
            component = COMPONENT,
            file = %self.static_file.display(),
            "reading static topology"
        );
        let data = fs::read_to_string(&self.static_file).map_err(|err| {
            RegistryListenerError::remote_unavailable(
                operation,
                format!(
                    "unable to read static topology {}: {err}",
                    self.static_file.display()
                ),
            )
        })?;
        let topology: StaticTopology = serde_json::from_str(&data).map_err(|err| {
            RegistryListenerError::remote_unavailable(
                operation,
                format!(
                    "unable to parse static topology {}: {err}",
                    self.static_file.display()
                ),
            )
        })?;

        let mut cache = GenericableCache::new();
        for instance in topology.fitable_instances {
            let Some(fitable) = instance.fitable.as_ref() else {
                warn!(
                    event = events::STATIC_TOPOLOGY_ENTRY_SKIPPED,
                    component = COMPONENT,
                    "static topology entry without fitable identity; skipping"
                );
                continue;
            };
            cache
                .entry(fitable.genericable_id.clone())
                .or_default()
                .push(instance);
        }
        Ok(cache)
    }

    fn cached(&self, operation: &'static str) -> Result<Arc<GenericableCache>, RegistryListenerError> {
        let mut cache = lock(&self.cache);
        if let Some(current) = cache.as_ref() {
            return Ok(current.clone());
        }
        let loaded = Arc::new(self.read_topology(operation)?);
        *cache = Some(loaded.clone());
        Ok(loaded)
    }

    /// Fitables absent from the file resolve to an instance without providers.
    fn resolve(cache: &GenericableCache, fitables: &[FitableInfo]) -> Vec<FitableInstance> {
        fitables
            .iter()
            .map(|info| {
                cache
                    .get(&info.genericable_id)
                    .and_then(|instances| {
                        instances
                            .iter()
                            .find(|instance| instance.fitable.as_ref() == Some(info))
                    })
                    .cloned()
                    .unwrap_or_else(|| FitableInstance::new(info.clone(), Vec::new()))
            })
            .collect()
    }

    /// Re-reads the file and pushes the snapshots of every subscribed fitable to the
    /// registered callbacks. Returns the number of snapshots pushed.
    pub fn reload(&self) -> Result<usize, RegistryListenerError> {
        let fresh = Arc::new(self.read_topology("reload")?);
        *lock(&self.cache) = Some(fresh.clone());

        let subscribed = self.subscribed_fitables();
        if subscribed.is_empty() {
            return Ok(0);
        }
        let instances = Self::resolve(&fresh, &subscribed);
        let callbacks: Vec<Arc<dyn FitablesChangedCallback>> = lock(&self.callbacks)
            .iter()
            .map(|key| key.callback().clone())
            .collect();
        info!(
            event = events::STATIC_TOPOLOGY_RELOADED,
            component = COMPONENT,
            fitables = instances.len(),
            callbacks = callbacks.len(),
            "static topology reloaded"
        );
        for callback in callbacks {
            callback.notify(&instances);
        }
        Ok(instances.len())
    }
}

#[async_trait]
impl RegistryListenerSpi for RegistryStaticFile {
    async fn query_fitable_instances(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<Vec<FitableInstance>, RegistryListenerError> {
        let cache = self.cached("query_fitable_instances")?;
        Ok(Self::resolve(&cache, fitables))
    }

    async fn subscribe_fitables(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<Vec<FitableInstance>, RegistryListenerError> {
        let cache = self.cached("subscribe_fitables")?;
        lock(&self.subscribed).extend(fitables.iter().cloned());
        debug!(
            event = events::SPI_FITABLES_SUBSCRIBED,
            component = COMPONENT,
            fitables = fitables.len(),
            "fitables subscribed"
        );
        Ok(Self::resolve(&cache, fitables))
    }

    async fn unsubscribe_fitables(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<(), RegistryListenerError> {
        let mut subscribed = lock(&self.subscribed);
        for fitable in fitables {
            subscribed.remove(fitable);
        }
        debug!(
            event = events::SPI_FITABLES_UNSUBSCRIBED,
            component = COMPONENT,
            fitables = fitables.len(),
            "fitables unsubscribed"
        );
        Ok(())
    }

    fn subscribe_fitables_changed(&self, callback: Arc<dyn FitablesChangedCallback>) {
        lock(&self.callbacks).insert(CallbackIdentityKey::new(callback));
    }

    fn unsubscribe_fitables_changed(&self, callback: &Arc<dyn FitablesChangedCallback>) {
        lock(&self.callbacks).remove(&CallbackIdentityKey::new(callback.clone()));
    }
}
