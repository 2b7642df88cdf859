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

mod config;

use crate::config::Config;
use clap::Parser;
use fit_registry::observability::events;
use fit_registry::{FitableInfo, RegistryListener};
use registry_static_file::RegistryStaticFile;
use std::error::Error;
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "fit_registry_listener";

#[derive(Parser)]
#[command()]
struct ListenerArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

fn log_addresses(listener: &RegistryListener, fitables: &[FitableInfo]) {
    for fitable in fitables {
        let addresses = listener.get_addresses(fitable);
        info!(
            event = events::LISTENER_ADDRESSES,
            component = COMPONENT,
            genericable_id = fitable.genericable_id.as_str(),
            fitable_id = fitable.fitable_id.as_str(),
            applications = addresses.application_instances.len(),
            endpoints = addresses.endpoint_count(),
            "current addresses"
        );
    }
}

#[cfg(unix)]
async fn serve(listener: &RegistryListener, spi: &RegistryStaticFile, fitables: &[FitableInfo]) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(err) => {
            warn!(
                event = events::LISTENER_SIGNAL_UNAVAILABLE,
                component = COMPONENT,
                err = %err,
                "Unable to listen for SIGHUP, topology reload disabled"
            );
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return,
            _ = hangup.recv() => match spi.reload() {
                Ok(pushed) => {
                    info!(
                        event = events::STATIC_TOPOLOGY_RELOADED,
                        component = COMPONENT,
                        pushed,
                        "Reloaded static topology"
                    );
                    log_addresses(listener, fitables);
                }
                Err(err) => warn!(
                    event = events::STATIC_TOPOLOGY_RELOAD_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "Unable to reload static topology"
                ),
            },
        }
    }
}

#[cfg(not(unix))]
async fn serve(_listener: &RegistryListener, _spi: &RegistryStaticFile, _fitables: &[FitableInfo]) {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    info!(
        event = events::LISTENER_START,
        component = COMPONENT,
        "Started fit-registry-listener"
    );

    // Get the config file.
    let args = ListenerArgs::parse();
    let contents = fs::read_to_string(&args.config)
        .map_err(|e| format!("Unable to read config file {}: {e}", args.config))?;
    let config: Config =
        json5::from_str(&contents).map_err(|e| format!("Unable to parse config file: {e}"))?;

    let spi = Arc::new(RegistryStaticFile::new(config.static_file.file_path.clone()));
    let listener = RegistryListener::new(config.registry_listener.clone(), spi.clone());
    listener.start()?;

    for fitable in &config.fitables {
        if listener.get_fitable(fitable, true).is_none() {
            warn!(
                event = events::LISTENER_FITABLE_SKIPPED,
                component = COMPONENT,
                genericable_id = fitable.genericable_id.as_str(),
                fitable_id = fitable.fitable_id.as_str(),
                "Skipping malformed fitable from config"
            );
        }
    }

    serve(&listener, &spi, &config.fitables).await;

    info!(
        event = events::LISTENER_STOP,
        component = COMPONENT,
        "Stopping fit-registry-listener"
    );
    listener.stop();
    Ok(())
}
