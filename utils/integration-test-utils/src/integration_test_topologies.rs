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

use fit_registry::{ApplicationInfo, ApplicationInstance, FitableInfo, FitableInstance, WorkerInfo};

pub fn fitable_info(genericable_id: &str, fitable_id: &str) -> FitableInfo {
    FitableInfo::new(genericable_id, "1.0.0", fitable_id, "1.0.0")
}

/// Worker in `prod` listening on `host` at each `(port, protocol)`.
pub fn worker(id: &str, host: &str, endpoints: &[(u16, i32)]) -> WorkerInfo {
    endpoints
        .iter()
        .fold(WorkerInfo::new(id, "prod"), |worker, (port, protocol)| {
            worker.with_endpoint(host, *port, *protocol)
        })
}

pub fn application_instance(name: &str, workers: Vec<WorkerInfo>) -> ApplicationInstance {
    ApplicationInstance {
        application: Some(ApplicationInfo::new(name, "1.0.0")),
        formats: vec![0],
        workers,
    }
}

/// Unnamed application instance, as sent by single-application-per-worker deployments.
pub fn legacy_application_instance(workers: Vec<WorkerInfo>) -> ApplicationInstance {
    ApplicationInstance {
        application: None,
        formats: vec![0],
        workers,
    }
}

/// `fitable` served by `application` through one worker at `host:port`.
pub fn single_worker_instance(
    fitable: &FitableInfo,
    application: &str,
    worker_id: &str,
    host: &str,
    port: u16,
    protocol: i32,
) -> FitableInstance {
    FitableInstance::new(
        fitable.clone(),
        vec![application_instance(
            application,
            vec![worker(worker_id, host, &[(port, protocol)])],
        )],
    )
}
