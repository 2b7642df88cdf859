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

use fit_registry::synchronizer::{AddressReconciler, UnavailableEndpointsSynchronizer};
use fit_registry::{FitableInfo, FitableInstance, TaskScheduler, Topology, WorkerInfo};
use integration_test_utils::{
    application_instance, fitable_info, init_logging, single_worker_instance, wait_until, worker,
    ScriptedRegistrySpi, SpiCall,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    spi: Arc<ScriptedRegistrySpi>,
    reconciler: AddressReconciler,
    sweeper: UnavailableEndpointsSynchronizer,
    fitable: FitableInfo,
}

fn harness(expiration: u32) -> Harness {
    init_logging();
    let spi = Arc::new(ScriptedRegistrySpi::new());
    let reconciler = AddressReconciler::new(Arc::new(Topology::new(expiration)));
    let sweeper = UnavailableEndpointsSynchronizer::new(
        spi.clone(),
        reconciler.clone(),
        TaskScheduler::new("isolation-test", Duration::from_millis(10)),
    );
    let fitable = fitable_info("calculator.add", "default");
    let snapshot = single_worker_instance(&fitable, "calculator", "w", "127.0.0.1", 8080, 3);
    spi.set_instance(snapshot.clone());
    reconciler.accept_changes(&[snapshot]);
    Harness {
        spi,
        reconciler,
        sweeper,
        fitable,
    }
}

fn is_isolated(harness: &Harness) -> bool {
    harness
        .reconciler
        .topology()
        .get_fitable(&harness.fitable, false)
        .is_some_and(|fitable| fitable.is_isolated("127.0.0.1", 8080))
}

#[tokio::test(flavor = "multi_thread")]
async fn isolation_expires_on_second_sweep_with_expiration_two() {
    let harness = harness(2);
    let topology = harness.reconciler.topology();

    assert_eq!(
        topology.isolate(&harness.fitable, &WorkerInfo::new("w", "prod")),
        1
    );
    assert_eq!(topology.get_addresses(&harness.fitable).endpoint_count(), 0);

    assert_eq!(harness.sweeper.sync_once().await, 0);
    assert!(is_isolated(&harness));
    assert_eq!(topology.get_addresses(&harness.fitable).endpoint_count(), 0);
    assert_eq!(harness.spi.query_count(), 0);

    assert_eq!(harness.sweeper.sync_once().await, 1);
    assert!(!is_isolated(&harness));
    assert_eq!(
        harness.spi.calls(),
        vec![SpiCall::Query(vec![harness.fitable.clone()])]
    );

    assert_eq!(harness.sweeper.sync_once().await, 0);
    assert!(!is_isolated(&harness));
    assert_eq!(topology.get_addresses(&harness.fitable).endpoint_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn endpoint_dropped_by_registry_stays_out_after_expiry() {
    let harness = harness(1);
    let topology = harness.reconciler.topology();
    topology.isolate(&harness.fitable, &WorkerInfo::new("w", "prod"));
    harness.spi.set_instance(FitableInstance::new(
        harness.fitable.clone(),
        vec![application_instance(
            "calculator",
            vec![worker("w", "127.0.0.2", &[(8080, 3)])],
        )],
    ));

    assert_eq!(harness.sweeper.sync_once().await, 1);

    let addresses = topology.get_addresses(&harness.fitable);
    assert_eq!(addresses.endpoint_count(), 1);
    assert_eq!(
        addresses.application_instances[0].workers[0].addresses[0].host,
        "127.0.0.2"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_requery_keeps_endpoint_isolated_until_registry_answers() {
    let harness = harness(1);
    let topology = harness.reconciler.topology();
    topology.isolate(&harness.fitable, &WorkerInfo::new("w", "prod"));
    harness.spi.set_failing(true);

    assert_eq!(harness.sweeper.sync_once().await, 0);
    assert_eq!(harness.sweeper.sync_once().await, 0);
    assert!(is_isolated(&harness));
    assert_eq!(harness.spi.query_count(), 2);

    harness.spi.set_failing(false);
    assert_eq!(harness.sweeper.sync_once().await, 1);
    assert!(!is_isolated(&harness));
    assert_eq!(topology.get_addresses(&harness.fitable).endpoint_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn re_isolating_rearms_the_countdown() {
    let harness = harness(2);
    let topology = harness.reconciler.topology();
    let worker = WorkerInfo::new("w", "prod");
    topology.isolate(&harness.fitable, &worker);

    harness.sweeper.sync_once().await;
    topology.isolate(&harness.fitable, &worker);
    assert_eq!(harness.sweeper.sync_once().await, 0);
    assert!(is_isolated(&harness));

    assert_eq!(harness.sweeper.sync_once().await, 1);
    assert!(!is_isolated(&harness));
}

#[tokio::test(flavor = "multi_thread")]
async fn isolating_during_requery_keeps_the_fresh_countdown() {
    let harness = harness(1);
    let topology = harness.reconciler.topology();
    let worker = WorkerInfo::new("w", "prod");
    topology.isolate(&harness.fitable, &worker);
    harness.spi.set_query_delay(Duration::from_millis(200));

    let (lifted, requery_seen) = tokio::join!(harness.sweeper.sync_once(), async {
        let seen = wait_until(Duration::from_secs(5), || harness.spi.query_count() == 1).await;
        topology.isolate(&harness.fitable, &worker);
        seen
    });

    assert!(requery_seen);
    assert_eq!(lifted, 0);
    assert!(is_isolated(&harness));
    assert_eq!(topology.get_addresses(&harness.fitable).endpoint_count(), 0);

    harness.spi.set_query_delay(Duration::ZERO);
    assert_eq!(harness.sweeper.sync_once().await, 1);
    assert!(!is_isolated(&harness));
}

#[tokio::test(flavor = "multi_thread")]
async fn isolation_is_scoped_to_one_fitable() {
    let harness = harness(2);
    let topology = harness.reconciler.topology();
    let other = fitable_info("calculator.sub", "default");
    harness.reconciler.accept_changes(&[single_worker_instance(
        &other, "calculator", "w", "127.0.0.1", 8080, 3,
    )]);

    topology.isolate(&harness.fitable, &WorkerInfo::new("w", "prod"));

    assert_eq!(topology.get_addresses(&harness.fitable).endpoint_count(), 0);
    assert_eq!(topology.get_addresses(&other).endpoint_count(), 1);
}
