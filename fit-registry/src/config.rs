/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
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

//! Registry-listener options, deserialized from the `registry-listener` config section.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct RegistryListenerConfig {
    pub pull: PullConfig,
    pub push: PushConfig,
    pub isolation: IsolationConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct PullConfig {
    pub enabled: bool,
    /// Seconds between two polls.
    pub interval: u64,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 120,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct PushConfig {
    pub enabled: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct IsolationConfig {
    /// Isolation-synchronizer ticks an isolated endpoint stays excluded.
    pub expiration: u32,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self { expiration: 5 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct SchedulerConfig {
    pub tick_millis: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_millis: 1000 }
    }
}

impl RegistryListenerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.scheduler.tick_millis.max(1))
    }

    /// Poll interval expressed in scheduler ticks, never less than one.
    pub fn pull_interval_ticks(&self) -> u64 {
        let tick_millis = self.scheduler.tick_millis.max(1);
        (self.pull.interval.saturating_mul(1000) / tick_millis).max(1)
    }
}
