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

//! Root of the domain graph: resolve-or-create entry points, pruning, isolation and the
//! address read path.

use arc_swap::ArcSwap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{
    Application, ApplicationKey, Fitable, FitableUnavailableEndpoint, Genericable,
    GenericableKey, UnavailableEndpointKey, Worker, WorkerKey,
};
use crate::fitable_instance::{
    AddressInfo, ApplicationInstance, EndpointInfo, FitableInfo, FitableInstance, WorkerInfo,
};
use crate::observability::events;
use crate::repository::{ApplicationRepo, GenericableRepo, Keyed};

const COMPONENT: &str = "topology";

pub type ObserverId = u64;

/// Callback receiving the identities of fitables that entered or left the local topology.
pub type FitablesObserver = Arc<dyn Fn(&[FitableInfo]) + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ObserverKind {
    Subscribed,
    Unsubscribed,
}

struct ObserverEntry {
    id: ObserverId,
    kind: ObserverKind,
    observer: FitablesObserver,
}

pub struct Topology {
    genericables: GenericableRepo,
    applications: ApplicationRepo,
    isolation_expiration: u32,
    observers: ArcSwap<Vec<Arc<ObserverEntry>>>,
    next_observer_id: AtomicU64,
}

impl Topology {
    pub fn new(isolation_expiration: u32) -> Self {
        Self {
            genericables: GenericableRepo::new(),
            applications: ApplicationRepo::new(),
            isolation_expiration,
            observers: ArcSwap::from_pointee(Vec::new()),
            next_observer_id: AtomicU64::new(1),
        }
    }

    pub fn genericables(&self) -> &GenericableRepo {
        &self.genericables
    }

    pub fn applications(&self) -> &ApplicationRepo {
        &self.applications
    }

    pub fn isolation_expiration(&self) -> u32 {
        self.isolation_expiration
    }

    fn is_live(&self, genericable: &Arc<Genericable>) -> bool {
        self.genericables
            .get(genericable.key())
            .is_some_and(|current| Arc::ptr_eq(&current, genericable))
    }

    /// Resolves the fitable for `info`. With `create_new`, a missing fitable (and its
    /// genericable) is created and every subscribed-observer is told about it.
    pub fn get_fitable(&self, info: &FitableInfo, create_new: bool) -> Option<Arc<Fitable>> {
        if let Err(err) = info.validate() {
            warn!(
                event = events::RECONCILE_ITEM_SKIPPED,
                component = COMPONENT,
                err = %err,
                "refusing to resolve malformed fitable"
            );
            return None;
        }

        let key = GenericableKey::from(info);
        loop {
            let genericable =
                self.genericables
                    .get_with(&key, create_new, || Genericable::new(key.clone()))?;
            let (fitable, created) = if create_new {
                genericable.get_or_create_fitable(info)
            } else {
                (genericable.get_fitable(info)?, false)
            };

            // A concurrent prune may have dropped the genericable between the two lookups.
            if !self.is_live(&genericable) {
                continue;
            }

            if created {
                debug!(
                    event = events::FITABLE_CREATED,
                    component = COMPONENT,
                    genericable_id = info.genericable_id.as_str(),
                    fitable_id = info.fitable_id.as_str(),
                    "fitable entered local topology"
                );
                self.notify(ObserverKind::Subscribed, std::slice::from_ref(info));
            }
            return Some(fitable);
        }
    }

    fn is_fitable_live(&self, fitable: &Arc<Fitable>) -> bool {
        fitable.genericable().is_some_and(|genericable| {
            self.is_live(&genericable)
                && genericable
                    .get_fitable(fitable.info())
                    .is_some_and(|current| Arc::ptr_eq(&current, fitable))
        })
    }

    /// Resolves or creates the fitable on behalf of a local caller. A requested fitable is
    /// kept, and stays subscribed, while no provider serves it, until
    /// [`Topology::release_fitable`].
    pub fn request_fitable(&self, info: &FitableInfo) -> Option<Arc<Fitable>> {
        loop {
            let fitable = self.get_fitable(info, true)?;
            fitable.set_requested(true);
            // A prune that checked the flag before it was set removed this fitable.
            if self.is_fitable_live(&fitable) {
                return Some(fitable);
            }
        }
    }

    /// Drops the local interest in `info` and prunes the fitable when nothing else holds
    /// it. Returns whether the fitable left the topology.
    pub fn release_fitable(&self, info: &FitableInfo) -> bool {
        let Some(fitable) = self.get_fitable(info, false) else {
            return false;
        };
        fitable.set_requested(false);
        self.prune_fitable(&fitable)
    }

    /// Removes `fitable` from its genericable when it is unreferenced, then removes the
    /// genericable when it has no fitables left.
    pub fn prune_fitable(&self, fitable: &Arc<Fitable>) -> bool {
        let Some(genericable) = fitable.genericable() else {
            return false;
        };
        let removed = genericable
            .fitables()
            .remove_if(fitable.info(), |current| {
                std::ptr::eq(current, Arc::as_ptr(fitable)) && current.is_unreferenced()
            })
            .is_some();
        if !removed {
            return false;
        }

        debug!(
            event = events::FITABLE_PRUNED,
            component = COMPONENT,
            genericable_id = genericable.id(),
            fitable_id = fitable.info().fitable_id.as_str(),
            "fitable left local topology"
        );
        self.notify(
            ObserverKind::Unsubscribed,
            std::slice::from_ref(fitable.info()),
        );

        if self
            .genericables
            .remove_if(genericable.key(), |current| {
                std::ptr::eq(current, Arc::as_ptr(&genericable)) && current.fitables().is_empty()
            })
            .is_some()
        {
            debug!(
                event = events::GENERICABLE_PRUNED,
                component = COMPONENT,
                genericable_id = genericable.id(),
                "genericable has no fitables left"
            );
        }
        true
    }

    /// Resolves the application `(name, name_version)`. Provided extensions replace the
    /// stored ones.
    pub fn get_application(
        &self,
        name: &str,
        name_version: &str,
        extensions: Option<BTreeMap<String, String>>,
        create_new: bool,
    ) -> Option<Arc<Application>> {
        let key = ApplicationKey::new(name, name_version);
        let application =
            self.applications
                .get_with(&key, create_new, || Application::new(key.clone()))?;
        if let Some(extensions) = extensions {
            application.set_extensions(extensions);
        }
        Some(application)
    }

    /// Detaches `application` from `fitable` and prunes the application when no fitable
    /// refers to it any more.
    pub fn detach_application(&self, fitable: &Fitable, application: &ApplicationKey) -> bool {
        let Some(relation) = fitable.detach_application(application) else {
            return false;
        };
        debug!(
            event = events::APPLICATION_DETACHED,
            component = COMPONENT,
            application = application.name.as_str(),
            application_version = application.name_version.as_str(),
            fitable_id = fitable.info().fitable_id.as_str(),
            "application no longer serves fitable"
        );
        if let Some(application) = relation.application() {
            self.prune_application(&application);
        }
        true
    }

    /// Removes `application` and its worker tree when it serves no fitable.
    pub fn prune_application(&self, application: &Arc<Application>) -> bool {
        let removed = self
            .applications
            .remove_if(application.key(), |current| {
                std::ptr::eq(current, Arc::as_ptr(application)) && current.fitables().is_empty()
            })
            .is_some();
        if removed {
            let workers = application.workers().clear();
            debug!(
                event = events::APPLICATION_PRUNED,
                component = COMPONENT,
                application = application.name(),
                application_version = application.name_version(),
                workers = workers.len(),
                "application is unreferenced"
            );
        }
        removed
    }

    /// Every fitable currently known, in genericable then fitable order.
    pub fn list_fitables(&self) -> Vec<Arc<Fitable>> {
        self.genericables
            .list()
            .iter()
            .flat_map(|genericable| genericable.fitables().list())
            .collect()
    }

    pub fn list_unavailable_endpoints(&self) -> Vec<Arc<FitableUnavailableEndpoint>> {
        self.list_fitables()
            .iter()
            .flat_map(|fitable| fitable.unavailable_endpoints().list())
            .collect()
    }

    /// Isolates every endpoint of `worker` for `fitable_info` with a fresh expiration.
    ///
    /// Covers the addresses carried by `worker` plus the endpoints stored locally for the
    /// same worker under any application of the fitable. Returns the number of `host:port`
    /// pairs marked.
    pub fn isolate(&self, fitable_info: &FitableInfo, worker: &WorkerInfo) -> usize {
        let Some(fitable) = self.get_fitable(fitable_info, false) else {
            return 0;
        };

        let mut targets: BTreeSet<(String, u16)> = worker
            .addresses
            .iter()
            .flat_map(|address| {
                address
                    .endpoints
                    .iter()
                    .map(move |endpoint| (address.host.clone(), endpoint.port))
            })
            .collect();

        let worker_key = WorkerKey::new(&worker.id, &worker.environment);
        for relation in fitable.applications().list() {
            let Some(application) = relation.application() else {
                continue;
            };
            if let Some(known) = application.workers().get(&worker_key) {
                targets.extend(
                    known
                        .endpoints()
                        .list()
                        .iter()
                        .map(|endpoint| (endpoint.host().to_string(), endpoint.port())),
                );
            }
        }

        for (host, port) in &targets {
            let marker = fitable.isolate_endpoint(host, *port, self.isolation_expiration);
            info!(
                event = events::ENDPOINT_ISOLATED,
                component = COMPONENT,
                fitable_id = fitable_info.fitable_id.as_str(),
                worker_id = worker.id.as_str(),
                host = host.as_str(),
                port,
                remaining = marker.remaining(),
                "endpoint isolated"
            );
        }
        targets.len()
    }

    /// Lifts the isolation of `host:port` for `fitable_info`.
    pub fn un_isolate(&self, fitable_info: &FitableInfo, host: &str, port: u16) -> bool {
        let Some(fitable) = self.get_fitable(fitable_info, false) else {
            return false;
        };
        let removed = fitable
            .unavailable_endpoints()
            .remove(&UnavailableEndpointKey::new(host, port))
            .is_some();
        if removed {
            info!(
                event = events::ENDPOINT_UNISOLATED,
                component = COMPONENT,
                fitable_id = fitable_info.fitable_id.as_str(),
                host,
                port,
                "endpoint isolation lifted"
            );
        }
        removed
    }

    /// Flattens the providers of `fitable_info` into a snapshot, leaving out disabled and
    /// isolated endpoints. The fitable is requested, so it is registered locally when it is
    /// new and kept while it has no providers.
    pub fn get_addresses(&self, fitable_info: &FitableInfo) -> FitableInstance {
        let Some(fitable) = self.request_fitable(fitable_info) else {
            return FitableInstance::new(fitable_info.clone(), Vec::new());
        };

        let application_instances = fitable
            .applications()
            .list()
            .iter()
            .filter_map(|relation| {
                let application = relation.application()?;
                let workers: Vec<WorkerInfo> = application
                    .workers()
                    .list()
                    .iter()
                    .filter_map(|worker| Self::worker_snapshot(&fitable, worker))
                    .collect();
                if workers.is_empty() {
                    return None;
                }
                Some(ApplicationInstance {
                    application: Some(application.info()),
                    formats: relation.formats(),
                    workers,
                })
            })
            .collect();

        FitableInstance::new(fitable_info.clone(), application_instances)
    }

    fn worker_snapshot(fitable: &Fitable, worker: &Worker) -> Option<WorkerInfo> {
        let mut addresses: Vec<AddressInfo> = Vec::new();
        // Endpoints are sorted by host first, so each host forms one contiguous run.
        for endpoint in worker.endpoints().list() {
            if !endpoint.is_enabled() || fitable.is_isolated(endpoint.host(), endpoint.port()) {
                continue;
            }
            let endpoint_info = EndpointInfo::new(endpoint.port(), endpoint.protocol());
            match addresses.last_mut() {
                Some(address) if address.host == endpoint.host() => {
                    address.endpoints.push(endpoint_info)
                }
                _ => addresses.push(AddressInfo {
                    host: endpoint.host().to_string(),
                    endpoints: vec![endpoint_info],
                }),
            }
        }

        if addresses.is_empty() {
            return None;
        }
        Some(WorkerInfo {
            id: worker.id().to_string(),
            environment: worker.environment().to_string(),
            extensions: worker.extensions(),
            addresses,
        })
    }

    fn add_observer(&self, kind: ObserverKind, observer: FitablesObserver) -> ObserverId {
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(ObserverEntry { id, kind, observer });
        self.observers.rcu(|current| {
            let mut next = (**current).clone();
            next.push(entry.clone());
            next
        });
        debug!(
            event = events::OBSERVER_REGISTERED,
            component = COMPONENT,
            observer_id = id,
            kind = ?kind,
            "fitable observer registered"
        );
        id
    }

    pub fn observe_fitables_subscribed(&self, observer: FitablesObserver) -> ObserverId {
        self.add_observer(ObserverKind::Subscribed, observer)
    }

    pub fn observe_fitables_unsubscribed(&self, observer: FitablesObserver) -> ObserverId {
        self.add_observer(ObserverKind::Unsubscribed, observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let previous = self.observers.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|entry| entry.id == id);
        if removed {
            debug!(
                event = events::OBSERVER_REMOVED,
                component = COMPONENT,
                observer_id = id,
                "fitable observer removed"
            );
        }
        removed
    }

    fn notify(&self, kind: ObserverKind, fitables: &[FitableInfo]) {
        let observers = self.observers.load_full();
        for entry in observers.iter().filter(|entry| entry.kind == kind) {
            (entry.observer)(fitables);
        }
    }
}
