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

use fit_registry::{
    FitableInfo, FitableInstance, FitablesChangedCallback, RegistryListenerError,
    RegistryListenerSpi,
};
use fit_registry::observability::events;
use integration_test_utils::{capture_events, init_logging};
use registry_static_file::RegistryStaticFile;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const TESTDATA: &str = "static-configs/testdata.json";

fn add_default() -> FitableInfo {
    FitableInfo::new("calculator.add", "1.0.0", "default", "1.0.0")
}

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "registry-static-file-{}-{name}.json",
        std::process::id()
    ));
    fs::write(&path, contents).expect("scratch file should be writable");
    path
}

#[derive(Default)]
struct RecordingCallback {
    pushed: Mutex<Vec<FitableInstance>>,
}

impl FitablesChangedCallback for RecordingCallback {
    fn notify(&self, instances: &[FitableInstance]) {
        self.pushed.lock().unwrap().extend_from_slice(instances);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn query_resolves_fitables_by_genericable() {
    init_logging();
    let spi = RegistryStaticFile::new(TESTDATA);

    let instances = spi
        .query_fitable_instances(&[
            add_default(),
            FitableInfo::new("greeter.hello", "2.0.0", "default", "2.0.0"),
        ])
        .await
        .expect("testdata should load");

    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].fitable.as_ref(), Some(&add_default()));
    assert_eq!(instances[0].endpoint_count(), 2);
    assert_eq!(instances[1].endpoint_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_fitable_resolves_without_providers() {
    init_logging();
    let spi = RegistryStaticFile::new(TESTDATA);
    let unknown = FitableInfo::new("calculator.add", "1.0.0", "missing", "1.0.0");

    let instances = spi
        .query_fitable_instances(std::slice::from_ref(&unknown))
        .await
        .expect("testdata should load");

    assert_eq!(instances, vec![FitableInstance::new(unknown, Vec::new())]);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_file_is_remote_unavailable() {
    init_logging();
    let spi = RegistryStaticFile::new("static-configs/does-not-exist.json");

    let result = spi.query_fitable_instances(&[add_default()]).await;

    assert!(matches!(
        result,
        Err(RegistryListenerError::RemoteUnavailable {
            operation: "query_fitable_instances",
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn reload_pushes_subscribed_fitables_only() {
    init_logging();
    let original = fs::read_to_string(TESTDATA).expect("testdata readable");
    let path = scratch_file("reload", &original);
    let spi = RegistryStaticFile::new(path.clone());
    let callback = Arc::new(RecordingCallback::default());
    let registered: Arc<dyn FitablesChangedCallback> = callback.clone();
    spi.subscribe_fitables_changed(registered.clone());

    spi.subscribe_fitables(&[add_default()])
        .await
        .expect("subscribe should succeed");
    fs::write(&path, r#"{ "fitableInstances": [] }"#).expect("rewrite scratch file");

    assert_eq!(spi.reload().expect("reload should succeed"), 1);
    {
        let pushed = callback.pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert!(pushed[0].application_instances.is_empty());
    }

    spi.unsubscribe_fitables(&[add_default()])
        .await
        .expect("unsubscribe should succeed");
    assert_eq!(spi.reload().expect("reload should succeed"), 0);

    spi.subscribe_fitables(&[add_default()]).await.unwrap();
    spi.unsubscribe_fitables_changed(&registered);
    spi.reload().expect("reload should succeed");
    assert_eq!(callback.pushed.lock().unwrap().len(), 1);

    let _ = fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread")]
async fn reload_events_carry_event_and_component() {
    init_logging();
    let path = scratch_file(
        "events",
        r#"{ "fitableInstances": [ { "applicationInstances": [] } ] }"#,
    );
    let spi = RegistryStaticFile::new(path.clone());
    spi.subscribe_fitables(&[add_default()])
        .await
        .expect("subscribe should succeed");

    let (reloaded, captured) = capture_events(|| spi.reload());

    assert_eq!(reloaded.expect("reload should succeed"), 1);
    assert!(!captured.is_empty());
    for event in &captured {
        assert!(event.field("event").is_some(), "missing event field: {event:?}");
        assert_eq!(event.field("component"), Some("registry_static_file"));
    }
    let names: Vec<&str> = captured.iter().filter_map(|e| e.field("event")).collect();
    assert!(names.contains(&events::STATIC_TOPOLOGY_ENTRY_SKIPPED));
    assert!(names.contains(&events::STATIC_TOPOLOGY_RELOADED));

    let _ = fs::remove_file(path);
}
