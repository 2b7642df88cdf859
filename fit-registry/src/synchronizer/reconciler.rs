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

//! Diff-and-prune reconciliation of remote snapshots into the local domain graph.
//!
//! Every pass is a full replacement per fitable: applications, workers and endpoints the
//! snapshot no longer lists are removed, and whatever ends up with no children is pruned.
//! Malformed sub-items are logged and skipped without aborting their siblings.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{
    Application, ApplicationFitable, ApplicationKey, Fitable, Topology, Worker, WorkerEndpointKey,
    WorkerKey,
};
use crate::fitable_instance::{
    AddressInfo, ApplicationInfo, ApplicationInstance, FitableInstance, WorkerInfo,
};
use crate::observability::events;
use crate::repository::Keyed;

const COMPONENT: &str = "reconciler";

/// Name version given to the per-worker applications of legacy snapshots.
const LEGACY_APPLICATION_VERSION: &str = "";

/// Counts of one `accept_changes` call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconcileSummary {
    pub fitables: usize,
    pub skipped: usize,
}

/// Folds [`FitableInstance`] snapshots into a [`Topology`].
#[derive(Clone)]
pub struct AddressReconciler {
    topology: Arc<Topology>,
}

impl AddressReconciler {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn accept_changes(&self, instances: &[FitableInstance]) -> ReconcileSummary {
        debug!(
            event = events::RECONCILE_START,
            component = COMPONENT,
            instances = instances.len(),
            "reconciling fitable instances"
        );

        let mut summary = ReconcileSummary::default();
        for instance in instances {
            if self.accept_fitable_instance(instance) {
                summary.fitables += 1;
            } else {
                summary.skipped += 1;
            }
        }

        debug!(
            event = events::RECONCILE_OK,
            component = COMPONENT,
            fitables = summary.fitables,
            skipped = summary.skipped,
            "fitable instances reconciled"
        );
        summary
    }

    fn accept_fitable_instance(&self, instance: &FitableInstance) -> bool {
        let Some(info) = instance.fitable.as_ref() else {
            warn!(
                event = events::RECONCILE_ITEM_SKIPPED,
                component = COMPONENT,
                "fitable instance without fitable identity"
            );
            return false;
        };
        let Some(fitable) = self.topology.get_fitable(info, true) else {
            return false;
        };

        let mut used: BTreeSet<ApplicationKey> = BTreeSet::new();
        for application_instance in &instance.application_instances {
            self.accept_application_instance(&fitable, application_instance, &mut used);
        }

        for relation in fitable.applications().list() {
            let application = &relation.key().application;
            if !used.contains(application) {
                self.topology.detach_application(&fitable, application);
            }
        }
        self.topology.prune_fitable(&fitable);
        true
    }

    fn accept_application_instance(
        &self,
        fitable: &Arc<Fitable>,
        instance: &ApplicationInstance,
        used: &mut BTreeSet<ApplicationKey>,
    ) {
        let named = instance
            .application
            .as_ref()
            .filter(|application| !application.name.is_empty());

        if instance.workers.is_empty() {
            // Nothing serves the fitable from this application any more; the unused-application
            // sweep detaches it.
            if let Some(application) = named {
                debug!(
                    event = events::APPLICATION_DETACHED,
                    component = COMPONENT,
                    application = application.name.as_str(),
                    fitable_id = fitable.info().fitable_id.as_str(),
                    "application reported without workers"
                );
            }
            return;
        }

        match named {
            Some(application) => {
                self.accept_named_application(fitable, application, instance, used)
            }
            None => self.accept_legacy_workers(fitable, instance, used),
        }
    }

    fn accept_named_application(
        &self,
        fitable: &Arc<Fitable>,
        info: &ApplicationInfo,
        instance: &ApplicationInstance,
        used: &mut BTreeSet<ApplicationKey>,
    ) {
        let Some((application, relation)) = self.attach_application(
            fitable,
            &info.name,
            &info.name_version,
            Some(info.extensions.clone()),
        ) else {
            return;
        };
        relation.set_formats(instance.formats.clone());
        self.accept_worker_changes(&application, &instance.workers);

        if !application.workers().is_empty() {
            used.insert(application.key().clone());
        }
    }

    /// One application per worker, named after the worker id.
    fn accept_legacy_workers(
        &self,
        fitable: &Arc<Fitable>,
        instance: &ApplicationInstance,
        used: &mut BTreeSet<ApplicationKey>,
    ) {
        for worker in &instance.workers {
            if let Err(err) = worker.validate() {
                warn!(
                    event = events::RECONCILE_ITEM_SKIPPED,
                    component = COMPONENT,
                    fitable_id = fitable.info().fitable_id.as_str(),
                    err = %err,
                    "skipping legacy worker"
                );
                continue;
            }
            let Some((application, relation)) =
                self.attach_application(fitable, &worker.id, LEGACY_APPLICATION_VERSION, None)
            else {
                continue;
            };
            relation.set_formats(instance.formats.clone());
            self.accept_worker_changes(&application, std::slice::from_ref(worker));

            if !application.workers().is_empty() {
                used.insert(application.key().clone());
            }
        }
    }

    /// Resolves the application and links it to `fitable`, retrying when a concurrent prune
    /// removed the application in between.
    fn attach_application(
        &self,
        fitable: &Arc<Fitable>,
        name: &str,
        name_version: &str,
        extensions: Option<std::collections::BTreeMap<String, String>>,
    ) -> Option<(Arc<Application>, Arc<ApplicationFitable>)> {
        loop {
            let application =
                self.topology
                    .get_application(name, name_version, extensions.clone(), true)?;
            let relation = fitable.attach_application(&application);
            let live = self
                .topology
                .applications()
                .get(application.key())
                .is_some_and(|current| Arc::ptr_eq(&current, &application));
            if live {
                return Some((application, relation));
            }
        }
    }

    /// Replaces the worker set of `application` with `workers`.
    pub fn accept_worker_changes(&self, application: &Arc<Application>, workers: &[WorkerInfo]) {
        let mut used: BTreeSet<WorkerKey> = BTreeSet::new();
        for info in workers {
            if let Err(err) = info.validate() {
                warn!(
                    event = events::RECONCILE_ITEM_SKIPPED,
                    component = COMPONENT,
                    application = application.name(),
                    err = %err,
                    "skipping worker"
                );
                continue;
            }
            let Some(worker) = application.get_worker(&info.id, &info.environment, true) else {
                continue;
            };
            worker.set_extensions(info.extensions.clone());
            self.accept_endpoints(&worker, &info.addresses);
            if !worker.endpoints().is_empty() {
                used.insert(worker.key().clone());
            }
        }

        for worker in application
            .workers()
            .retain(|worker| used.contains(worker.key()))
        {
            debug!(
                event = events::WORKER_PRUNED,
                component = COMPONENT,
                application = application.name(),
                worker_id = worker.id(),
                environment = worker.environment(),
                "worker no longer reported"
            );
        }
    }

    /// Replaces the endpoint set of `worker` with the endpoints listed under `addresses`.
    pub fn accept_endpoints(&self, worker: &Arc<Worker>, addresses: &[AddressInfo]) {
        let mut used: BTreeSet<WorkerEndpointKey> = BTreeSet::new();
        for address in addresses {
            if let Err(err) = address.validate() {
                warn!(
                    event = events::RECONCILE_ITEM_SKIPPED,
                    component = COMPONENT,
                    worker_id = worker.id(),
                    err = %err,
                    "skipping address"
                );
                continue;
            }
            for endpoint in &address.endpoints {
                let Some(stored) =
                    worker.get_endpoint(&address.host, endpoint.port, endpoint.protocol, true)
                else {
                    continue;
                };
                stored.set_enabled(endpoint.enabled);
                used.insert(stored.key().clone());
            }
        }

        for endpoint in worker
            .endpoints()
            .retain(|endpoint| used.contains(endpoint.key()))
        {
            debug!(
                event = events::ENDPOINT_PRUNED,
                component = COMPONENT,
                worker_id = worker.id(),
                host = endpoint.host(),
                port = endpoint.port(),
                protocol = endpoint.protocol(),
                "endpoint no longer reported"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AddressReconciler;
    use crate::domain::{ApplicationKey, Topology};
    use crate::fitable_instance::{
        AddressInfo, ApplicationInfo, ApplicationInstance, EndpointInfo, FitableInfo,
        FitableInstance, WorkerInfo,
    };
    use std::sync::Arc;

    fn fitable_info() -> FitableInfo {
        FitableInfo::new("g", "1.0", "f", "1.0")
    }

    fn instance(application: Option<ApplicationInfo>, workers: Vec<WorkerInfo>) -> FitableInstance {
        FitableInstance::new(
            fitable_info(),
            vec![ApplicationInstance {
                application,
                formats: vec![0, 1],
                workers,
            }],
        )
    }

    fn reconciler() -> AddressReconciler {
        AddressReconciler::new(Arc::new(Topology::new(5)))
    }

    #[test]
    fn snapshot_builds_graph() {
        let reconciler = reconciler();
        let worker = WorkerInfo::new("w", "prod").with_endpoint("127.0.0.1", 8080, 3);

        let summary =
            reconciler.accept_changes(&[instance(Some(ApplicationInfo::new("a", "1")), vec![worker])]);

        assert_eq!(summary.fitables, 1);
        let topology = reconciler.topology();
        let application = topology.get_application("a", "1", None, false).unwrap();
        assert_eq!(application.workers().count(), 1);
        let fitable = topology.get_fitable(&fitable_info(), false).unwrap();
        let relation = fitable
            .get_application_fitable(&ApplicationKey::new("a", "1"))
            .unwrap();
        assert_eq!(relation.formats(), vec![0, 1]);
    }

    #[test]
    fn replaying_a_snapshot_is_idempotent() {
        let reconciler = reconciler();
        let worker = WorkerInfo::new("w", "prod")
            .with_endpoint("127.0.0.1", 8080, 3)
            .with_endpoint("127.0.0.1", 8081, 2);
        let snapshot = instance(Some(ApplicationInfo::new("a", "1")), vec![worker]);

        reconciler.accept_changes(std::slice::from_ref(&snapshot));
        let first = reconciler.topology().get_addresses(&fitable_info());
        reconciler.accept_changes(std::slice::from_ref(&snapshot));
        let second = reconciler.topology().get_addresses(&fitable_info());

        assert_eq!(first, second);
        assert_eq!(second.endpoint_count(), 2);
        assert_eq!(reconciler.topology().applications().count(), 1);
    }

    #[test]
    fn missing_workers_and_endpoints_are_pruned() {
        let reconciler = reconciler();
        let application = Some(ApplicationInfo::new("a", "1"));
        reconciler.accept_changes(&[instance(
            application.clone(),
            vec![
                WorkerInfo::new("w1", "prod")
                    .with_endpoint("127.0.0.1", 8080, 3)
                    .with_endpoint("127.0.0.1", 8081, 3),
                WorkerInfo::new("w2", "prod").with_endpoint("127.0.0.2", 8080, 3),
            ],
        )]);

        reconciler.accept_changes(&[instance(
            application,
            vec![WorkerInfo::new("w1", "prod").with_endpoint("127.0.0.1", 8081, 3)],
        )]);

        let stored = reconciler
            .topology()
            .get_application("a", "1", None, false)
            .unwrap();
        let workers = stored.workers().list();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].id(), "w1");
        let endpoints = workers[0].endpoints().list();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].port(), 8081);
    }

    #[test]
    fn empty_workers_detach_and_prune_application() {
        let reconciler = reconciler();
        let application = Some(ApplicationInfo::new("a", "1"));
        reconciler.accept_changes(&[instance(
            application.clone(),
            vec![WorkerInfo::new("w", "prod").with_endpoint("127.0.0.1", 8080, 3)],
        )]);

        reconciler.accept_changes(&[instance(application, Vec::new())]);

        let topology = reconciler.topology();
        assert!(topology.get_application("a", "1", None, false).is_none());
        assert!(topology.genericables().is_empty());
    }

    #[test]
    fn legacy_instance_creates_application_per_worker() {
        let reconciler = reconciler();
        reconciler.accept_changes(&[instance(
            Some(ApplicationInfo::new("", "")),
            vec![
                WorkerInfo::new("w1", "prod").with_endpoint("127.0.0.1", 8080, 3),
                WorkerInfo::new("w2", "prod").with_endpoint("127.0.0.2", 8080, 3),
            ],
        )]);

        let topology = reconciler.topology();
        assert_eq!(topology.applications().count(), 2);
        let application = topology.get_application("w2", "", None, false).unwrap();
        assert_eq!(application.workers().list()[0].id(), "w2");
        assert_eq!(topology.get_addresses(&fitable_info()).endpoint_count(), 2);
    }

    #[test]
    fn malformed_items_are_skipped_without_aborting_siblings() {
        let reconciler = reconciler();
        let valid = WorkerInfo::new("w1", "prod").with_endpoint("127.0.0.1", 8080, 3);
        let mut bad_address = WorkerInfo::new("w2", "prod");
        bad_address.addresses.push(AddressInfo {
            host: String::new(),
            endpoints: vec![EndpointInfo::new(8080, 3)],
        });
        let snapshots = vec![
            FitableInstance::default(),
            instance(
                Some(ApplicationInfo::new("a", "1")),
                vec![WorkerInfo::new("", "prod"), bad_address, valid],
            ),
        ];

        let summary = reconciler.accept_changes(&snapshots);

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.fitables, 1);
        let application = reconciler
            .topology()
            .get_application("a", "1", None, false)
            .unwrap();
        assert_eq!(application.workers().count(), 1);
    }

    #[test]
    fn disabled_flag_follows_snapshot() {
        let reconciler = reconciler();
        let mut worker = WorkerInfo::new("w", "prod").with_endpoint("127.0.0.1", 8080, 3);
        worker.addresses[0].endpoints[0].enabled = false;

        reconciler.accept_changes(&[instance(Some(ApplicationInfo::new("a", "1")), vec![worker])]);

        let application = reconciler
            .topology()
            .get_application("a", "1", None, false)
            .unwrap();
        let endpoints = application.workers().list()[0].endpoints().list();
        assert!(!endpoints[0].is_enabled());
        assert_eq!(
            reconciler.topology().get_addresses(&fitable_info()).endpoint_count(),
            0
        );
    }
}
