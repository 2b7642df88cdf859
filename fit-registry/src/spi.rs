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

//! Boundary to the remote registry server, or to a local configuration source standing in
//! for it.

use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::RegistryListenerError;
use crate::fitable_instance::{FitableInfo, FitableInstance};

/// Receives server-pushed topology deltas.
///
/// `notify` runs on whatever thread the SPI delivers from and must stay short: it may only
/// fold the instances into local state, never issue further remote calls.
pub trait FitablesChangedCallback: Send + Sync {
    fn notify(&self, instances: &[FitableInstance]);
}

#[async_trait]
pub trait RegistryListenerSpi: Send + Sync {
    /// Fetches current provider snapshots for `fitables`.
    async fn query_fitable_instances(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<Vec<FitableInstance>, RegistryListenerError>;

    /// Starts receiving pushes for `fitables` and returns their current snapshots.
    async fn subscribe_fitables(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<Vec<FitableInstance>, RegistryListenerError>;

    async fn unsubscribe_fitables(
        &self,
        fitables: &[FitableInfo],
    ) -> Result<(), RegistryListenerError>;

    fn subscribe_fitables_changed(&self, callback: Arc<dyn FitablesChangedCallback>);

    fn unsubscribe_fitables_changed(&self, callback: &Arc<dyn FitablesChangedCallback>);
}

/// Pointer identity of a registered callback, for SPI implementations keeping callback sets.
#[derive(Clone)]
pub struct CallbackIdentityKey {
    callback: Arc<dyn FitablesChangedCallback>,
}

impl CallbackIdentityKey {
    pub fn new(callback: Arc<dyn FitablesChangedCallback>) -> Self {
        Self { callback }
    }

    pub fn callback(&self) -> &Arc<dyn FitablesChangedCallback> {
        &self.callback
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.callback) as *const ()
    }
}

impl Hash for CallbackIdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl PartialEq for CallbackIdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for CallbackIdentityKey {}

impl Debug for CallbackIdentityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackIdentityKey")
            .field("address", &self.address())
            .finish()
    }
}
