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

//! # fit-registry
//!
//! `fit-registry` keeps an in-memory view of which endpoints currently implement which
//! fitable, and serves that view to the broker's load-balancing path.
//!
//! The view is fed from a [`RegistryListenerSpi`] by up to three synchronizers: a poller,
//! a push subscriber and an isolation sweep that re-admits endpoints once their isolation
//! expires. All of them go through the same reconciliation pass.
//!
//! ## Static Configuration Mode
//!
//! ```
//! use std::sync::Arc;
//! use fit_registry::{
//!     FitableInfo, RegistryListener, RegistryListenerConfig, RegistryListenerSpi, WorkerInfo,
//! };
//! use registry_static_file::RegistryStaticFile;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let spi = Arc::new(RegistryStaticFile::new(
//!     "../utils/registry-static-file/static-configs/testdata.json",
//! ));
//! let listener = RegistryListener::new(RegistryListenerConfig::default(), spi.clone());
//!
//! let fitable = FitableInfo::new("calculator.add", "1.0.0", "default", "1.0.0");
//! assert!(listener.get_addresses(&fitable).application_instances.is_empty());
//!
//! let instances = spi.query_fitable_instances(&[fitable.clone()]).await.unwrap();
//! listener.reconciler().accept_changes(&instances);
//! let addresses = listener.get_addresses(&fitable);
//! assert_eq!(addresses.endpoint_count(), 2);
//!
//! let worker = WorkerInfo::new("calculator-worker-1", "prod");
//! assert_eq!(listener.isolate(&fitable, &worker), 1);
//! assert_eq!(listener.get_addresses(&fitable).endpoint_count(), 1);
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Domain: genericable/fitable/application/worker/endpoint graph rooted at [`Topology`]
//! - Repository: sorted, mutex-guarded per-entity indexes
//! - Synchronizer: reconciler, poll/push/isolation strategies and their composite
//! - Runtime: cooperative tick scheduler and dedicated runtime threads
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber. Binaries and tests
//! are responsible for one-time `tracing_subscriber` initialization at process boundaries.

mod config;
pub use config::{
    IsolationConfig, PullConfig, PushConfig, RegistryListenerConfig, SchedulerConfig,
};

mod domain;
pub use domain::{
    Application, ApplicationFitable, ApplicationFitableKey, ApplicationKey, Fitable,
    FitableUnavailableEndpoint, FitablesObserver, Genericable, GenericableKey, ObserverId,
    Topology, UnavailableEndpointKey, Worker, WorkerEndpoint, WorkerEndpointKey, WorkerKey,
};

mod error;
pub use error::RegistryListenerError;

mod fitable_instance;
pub use fitable_instance::{
    AddressInfo, ApplicationInfo, ApplicationInstance, EndpointInfo, FitableInfo,
    FitableInstance, WorkerInfo,
};

#[doc(hidden)]
pub mod observability;

pub mod repository;

mod registry_listener;
pub use registry_listener::RegistryListener;

mod runtime;
pub use runtime::task_scheduler::{PeriodicTask, TaskBody, TaskId, TaskScheduler};

mod spi;
pub use spi::{CallbackIdentityKey, FitablesChangedCallback, RegistryListenerSpi};

pub mod synchronizer;
