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

//! Strategies keeping the local topology in step with the registry.
//!
//! - [`ActiveAddressSynchronizer`] polls every known fitable on a tick interval.
//! - [`PassiveAddressSynchronizer`] subscribes fitables as they appear and folds pushes in.
//! - [`UnavailableEndpointsSynchronizer`] expires isolation markers and re-queries their
//!   fitables.
//!
//! All three feed the same [`AddressReconciler`].

mod active;
mod composite;
mod passive;
mod reconciler;
mod unavailable_endpoints;

pub use active::ActiveAddressSynchronizer;
pub use composite::AddressSynchronizerComposite;
pub use passive::PassiveAddressSynchronizer;
pub use reconciler::{AddressReconciler, ReconcileSummary};
pub use unavailable_endpoints::UnavailableEndpointsSynchronizer;

use crate::error::RegistryListenerError;

/// Start/stop lifecycle shared by every synchronization strategy.
pub trait AddressSynchronizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Starting an already started synchronizer is a no-op.
    fn start(&self) -> Result<(), RegistryListenerError>;

    /// Stopping a stopped synchronizer is a no-op.
    fn stop(&self);
}
