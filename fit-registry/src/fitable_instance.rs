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

//! Topology snapshot records exchanged with the registry SPI and the broker.
//!
//! These are flat value types: the SPI produces them, the reconciler folds them into the
//! domain graph, and [`RegistryListener::get_addresses`](crate::RegistryListener::get_addresses)
//! flattens the graph back into them.

use crate::error::RegistryListenerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of one fitable: the genericable it implements plus its own id and version.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitableInfo {
    pub genericable_id: String,
    #[serde(default)]
    pub genericable_version: String,
    pub fitable_id: String,
    #[serde(default)]
    pub fitable_version: String,
}

impl FitableInfo {
    pub fn new(
        genericable_id: &str,
        genericable_version: &str,
        fitable_id: &str,
        fitable_version: &str,
    ) -> Self {
        Self {
            genericable_id: genericable_id.to_string(),
            genericable_version: genericable_version.to_string(),
            fitable_id: fitable_id.to_string(),
            fitable_version: fitable_version.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), RegistryListenerError> {
        if self.genericable_id.is_empty() {
            return Err(RegistryListenerError::invalid_argument(
                "fitable is missing its genericable id",
            ));
        }
        if self.fitable_id.is_empty() {
            return Err(RegistryListenerError::invalid_argument(format!(
                "fitable of genericable {} is missing its id",
                self.genericable_id
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    pub name: String,
    #[serde(default)]
    pub name_version: String,
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl ApplicationInfo {
    pub fn new(name: &str, name_version: &str) -> Self {
        Self {
            name: name.to_string(),
            name_version: name_version.to_string(),
            extensions: BTreeMap::new(),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// One listening port of an address.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    pub port: u16,
    pub protocol: i32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl EndpointInfo {
    pub fn new(port: u16, protocol: i32) -> Self {
        Self {
            port,
            protocol,
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub host: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointInfo>,
}

impl AddressInfo {
    pub fn validate(&self) -> Result<(), RegistryListenerError> {
        if self.host.is_empty() {
            return Err(RegistryListenerError::invalid_argument(
                "address is missing its host",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    pub id: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
    #[serde(default)]
    pub addresses: Vec<AddressInfo>,
}

impl WorkerInfo {
    pub fn new(id: &str, environment: &str) -> Self {
        Self {
            id: id.to_string(),
            environment: environment.to_string(),
            ..Default::default()
        }
    }

    /// Adds one `host:port` endpoint, grouping it under an existing address for the same host.
    pub fn with_endpoint(mut self, host: &str, port: u16, protocol: i32) -> Self {
        let endpoint = EndpointInfo::new(port, protocol);
        match self.addresses.iter_mut().find(|address| address.host == host) {
            Some(address) => address.endpoints.push(endpoint),
            None => self.addresses.push(AddressInfo {
                host: host.to_string(),
                endpoints: vec![endpoint],
            }),
        }
        self
    }

    pub fn validate(&self) -> Result<(), RegistryListenerError> {
        if self.id.is_empty() {
            return Err(RegistryListenerError::invalid_argument(
                "worker is missing its id",
            ));
        }
        Ok(())
    }
}

/// Snapshot of one application's workers serving a fitable.
///
/// An instance without workers is a removal signal for the application. An instance whose
/// `application` is absent or unnamed is a legacy record: every worker stands for its own
/// application, named after the worker id.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInstance {
    #[serde(default)]
    pub application: Option<ApplicationInfo>,
    #[serde(default)]
    pub formats: Vec<i32>,
    #[serde(default)]
    pub workers: Vec<WorkerInfo>,
}

/// Full snapshot of one fitable's providers.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitableInstance {
    #[serde(default)]
    pub fitable: Option<FitableInfo>,
    #[serde(default)]
    pub application_instances: Vec<ApplicationInstance>,
}

impl FitableInstance {
    pub fn new(fitable: FitableInfo, application_instances: Vec<ApplicationInstance>) -> Self {
        Self {
            fitable: Some(fitable),
            application_instances,
        }
    }

    /// Number of enabled `(host, port, protocol)` endpoints across all applications.
    pub fn endpoint_count(&self) -> usize {
        self.application_instances
            .iter()
            .flat_map(|instance| instance.workers.iter())
            .flat_map(|worker| worker.addresses.iter())
            .flat_map(|address| address.endpoints.iter())
            .filter(|endpoint| endpoint.enabled)
            .count()
    }
}
