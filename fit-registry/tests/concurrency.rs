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

use fit_registry::repository::Keyed;
use fit_registry::synchronizer::AddressReconciler;
use fit_registry::{FitableInfo, FitableInstance, Topology, WorkerInfo};
use integration_test_utils::{application_instance, fitable_info, init_logging, worker};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const PASSES: usize = 400;

type Endpoint = (String, String, String, u16);

fn first_snapshot(fitable: &FitableInfo) -> FitableInstance {
    FitableInstance::new(
        fitable.clone(),
        vec![application_instance(
            "calculator",
            vec![
                worker("w1", "127.0.0.1", &[(8080, 3)]),
                worker("w2", "127.0.0.2", &[(8080, 3)]),
            ],
        )],
    )
}

fn second_snapshot(fitable: &FitableInfo) -> FitableInstance {
    FitableInstance::new(
        fitable.clone(),
        vec![
            application_instance(
                "calculator",
                vec![
                    worker("w2", "127.0.0.2", &[(8080, 3), (8081, 3)]),
                    worker("w3", "127.0.0.3", &[(8080, 3)]),
                ],
            ),
            application_instance("calculator-canary", vec![worker("w4", "127.0.0.4", &[(8080, 3)])]),
        ],
    )
}

fn snapshot_endpoints(instance: &FitableInstance) -> BTreeSet<Endpoint> {
    let mut endpoints = BTreeSet::new();
    for application in &instance.application_instances {
        let name = application
            .application
            .as_ref()
            .map(|info| info.name.clone())
            .unwrap_or_default();
        for worker in &application.workers {
            for address in &worker.addresses {
                for endpoint in &address.endpoints {
                    endpoints.insert((
                        name.clone(),
                        worker.id.clone(),
                        address.host.clone(),
                        endpoint.port,
                    ));
                }
            }
        }
    }
    endpoints
}

fn stored_endpoints(topology: &Topology, fitable: &FitableInfo) -> BTreeSet<Endpoint> {
    let mut endpoints = BTreeSet::new();
    let Some(fitable) = topology.get_fitable(fitable, false) else {
        return endpoints;
    };
    for relation in fitable.applications().list() {
        let Some(application) = relation.application() else {
            continue;
        };
        for worker in application.workers().list() {
            for endpoint in worker.endpoints().list() {
                endpoints.insert((
                    application.name().to_string(),
                    worker.id().to_string(),
                    endpoint.host().to_string(),
                    endpoint.port(),
                ));
            }
        }
    }
    endpoints
}

fn assert_consistent_read(instance: &FitableInstance) {
    for application in &instance.application_instances {
        let ids: BTreeSet<&str> = application.workers.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids.len(), application.workers.len(), "duplicate worker in {application:?}");
        for worker in &application.workers {
            let ports: BTreeSet<(&str, u16)> = worker
                .addresses
                .iter()
                .flat_map(|address| {
                    address
                        .endpoints
                        .iter()
                        .map(move |endpoint| (address.host.as_str(), endpoint.port))
                })
                .collect();
            let listed: usize = worker.addresses.iter().map(|a| a.endpoints.len()).sum();
            assert_eq!(ports.len(), listed, "duplicate endpoint in {worker:?}");
        }
    }
}

fn assert_sorted<K: Ord + std::fmt::Debug>(keys: Vec<K>) {
    assert!(
        keys.windows(2).all(|pair| pair[0] < pair[1]),
        "repository out of order: {keys:?}"
    );
}

#[test]
fn reads_and_isolation_race_reconciliation_without_corrupting_the_graph() {
    init_logging();
    let topology = Arc::new(Topology::new(3));
    let reconciler = AddressReconciler::new(topology.clone());
    let fitable = fitable_info("calculator.add", "default");
    let first = first_snapshot(&fitable);
    let second = second_snapshot(&fitable);
    let churning = AtomicBool::new(true);

    thread::scope(|scope| {
        scope.spawn(|| {
            for pass in 0..PASSES {
                let snapshot = if pass % 2 == 0 { &first } else { &second };
                reconciler.accept_changes(std::slice::from_ref(snapshot));
            }
            reconciler.accept_changes(std::slice::from_ref(&second));
            churning.store(false, Ordering::SeqCst);
        });

        scope.spawn(|| {
            while churning.load(Ordering::SeqCst) {
                assert_consistent_read(&topology.get_addresses(&fitable));
                if let Some(entity) = topology.get_fitable(&fitable, false) {
                    assert_sorted(
                        entity
                            .applications()
                            .list()
                            .iter()
                            .map(|relation| relation.key().clone())
                            .collect(),
                    );
                }
                assert_sorted(
                    topology
                        .applications()
                        .list()
                        .iter()
                        .map(|application| application.key().clone())
                        .collect(),
                );
            }
        });

        scope.spawn(|| {
            let isolated = WorkerInfo::new("w2", "prod");
            while churning.load(Ordering::SeqCst) {
                topology.isolate(&fitable, &isolated);
                assert_consistent_read(&topology.get_addresses(&fitable));
                topology.un_isolate(&fitable, "127.0.0.2", 8080);
            }
        });
    });

    let expected = snapshot_endpoints(&second);
    assert_eq!(stored_endpoints(&topology, &fitable), expected);
    assert_eq!(topology.applications().count(), 2);

    for marker in topology.list_unavailable_endpoints() {
        topology.un_isolate(&fitable, marker.host(), marker.port());
    }
    let addresses = topology.get_addresses(&fitable);
    assert_consistent_read(&addresses);
    assert_eq!(snapshot_endpoints(&addresses), expected);
}
