//! Per-fitable isolation marker for an endpoint that recently failed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use crate::domain::Fitable;
use crate::repository::Keyed;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnavailableEndpointKey {
    pub host: String,
    pub port: u16,
}

impl UnavailableEndpointKey {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

pub struct FitableUnavailableEndpoint {
    key: UnavailableEndpointKey,
    remaining: AtomicU32,
    fitable: Weak<Fitable>,
}

impl Keyed for FitableUnavailableEndpoint {
    type Key = UnavailableEndpointKey;

    fn key(&self) -> &UnavailableEndpointKey {
        &self.key
    }
}

impl FitableUnavailableEndpoint {
    pub(crate) fn new(key: UnavailableEndpointKey, expiration: u32, fitable: Weak<Fitable>) -> Self {
        Self {
            key,
            remaining: AtomicU32::new(expiration),
            fitable,
        }
    }

    pub fn host(&self) -> &str {
        &self.key.host
    }

    pub fn port(&self) -> u16 {
        self.key.port
    }

    pub fn fitable(&self) -> Option<Arc<Fitable>> {
        self.fitable.upgrade()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self, expiration: u32) {
        self.remaining.store(expiration, Ordering::Release);
    }

    /// Consumes one tick. Returns `true` once the remaining count has reached zero.
    pub fn try_expire(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                Some(remaining.saturating_sub(1))
            })
            .unwrap_or(0);
        previous <= 1
    }
}
