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

//! Domain graph of genericables, fitables, applications, workers and endpoints.
//!
//! Ownership runs downward from [`Topology`]: the topology owns genericables and
//! applications, a genericable owns its fitables, an application owns its workers and a
//! worker owns its endpoints. Every upward link is a `Weak` reference that resolves to `None`
//! once the owner has been pruned. The fitable/application relation is shared by both sides
//! and owns neither of them.

mod application;
mod fitable;
mod genericable;
mod topology;
mod unavailable_endpoint;
mod worker;

pub use application::{Application, ApplicationKey};
pub use fitable::{ApplicationFitable, ApplicationFitableKey, Fitable};
pub use genericable::{Genericable, GenericableKey};
pub use topology::{FitablesObserver, ObserverId, Topology};
pub use unavailable_endpoint::{FitableUnavailableEndpoint, UnavailableEndpointKey};
pub use worker::{Worker, WorkerEndpoint, WorkerEndpointKey, WorkerKey};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
