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

//! Error taxonomy shared by the registry listener, its synchronizers and SPI implementations.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failures surfaced by registry-listener operations.
#[derive(Debug)]
pub enum RegistryListenerError {
    /// The named entity or task does not exist.
    NotFound(String),
    /// A snapshot field or caller argument is malformed.
    InvalidArgument(String),
    /// An SPI call to the registry server (or its local stand-in) did not succeed.
    RemoteUnavailable {
        operation: &'static str,
        reason: String,
    },
    /// A dedicated thread or its runtime could not be created.
    Runtime(std::io::Error),
}

impl RegistryListenerError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        RegistryListenerError::InvalidArgument(reason.into())
    }

    pub fn remote_unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        RegistryListenerError::RemoteUnavailable {
            operation,
            reason: reason.into(),
        }
    }
}

impl Display for RegistryListenerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryListenerError::NotFound(what) => write!(f, "not found: {what}"),
            RegistryListenerError::InvalidArgument(reason) => {
                write!(f, "invalid argument: {reason}")
            }
            RegistryListenerError::RemoteUnavailable { operation, reason } => {
                write!(f, "registry call {operation} failed: {reason}")
            }
            RegistryListenerError::Runtime(err) => {
                write!(f, "unable to start registry listener runtime: {err}")
            }
        }
    }
}

impl Error for RegistryListenerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryListenerError::Runtime(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RegistryListenerError {
    fn from(err: std::io::Error) -> Self {
        RegistryListenerError::Runtime(err)
    }
}

#[cfg(test)]
mod tests {
    use super::RegistryListenerError;
    use std::error::Error;

    #[test]
    fn remote_unavailable_display_names_operation() {
        let error = RegistryListenerError::remote_unavailable("query_fitable_instances", "timeout");

        assert_eq!(
            error.to_string(),
            "registry call query_fitable_instances failed: timeout"
        );
        assert!(error.source().is_none());
    }

    #[test]
    fn runtime_error_exposes_io_source() {
        let error: RegistryListenerError =
            std::io::Error::new(std::io::ErrorKind::Other, "no threads").into();

        assert!(error.to_string().contains("no threads"));
        assert!(error.source().is_some());
    }
}
