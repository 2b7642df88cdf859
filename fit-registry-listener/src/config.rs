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

use fit_registry::{FitableInfo, RegistryListenerConfig};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub(crate) registry_listener: RegistryListenerConfig,
    pub(crate) static_file: StaticFileConfig,
    #[serde(default)]
    pub(crate) fitables: Vec<FitableInfo>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StaticFileConfig {
    pub(crate) file_path: String,
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn default_config_parses() {
        let config: Config = json5::from_str(include_str!("../DEFAULT_CONFIG.json5"))
            .expect("default config should parse");

        assert!(config.registry_listener.push.enabled);
        assert_eq!(config.registry_listener.pull.interval, 120);
        assert_eq!(config.fitables.len(), 2);
        assert_eq!(config.fitables[0].genericable_id, "calculator.add");
    }

    #[test]
    fn listener_section_is_optional() {
        let config: Config =
            json5::from_str(r#"{ "static-file": { "file-path": "topology.json" } }"#)
                .expect("minimal config should parse");

        assert!(config.registry_listener.pull.enabled);
        assert!(!config.registry_listener.push.enabled);
        assert!(config.fitables.is_empty());
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let parsed = json5::from_str::<Config>(
            r#"{ "static-file": { "file-path": "t.json" }, "transports": {} }"#,
        );

        assert!(parsed.is_err());
    }
}
