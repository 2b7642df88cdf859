//! Worker entity and its network endpoints.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::domain::{lock, Application};
use crate::repository::{Keyed, WorkerEndpointRepo};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WorkerKey {
    pub id: String,
    pub environment: String,
}

impl WorkerKey {
    pub fn new(id: &str, environment: &str) -> Self {
        Self {
            id: id.to_string(),
            environment: environment.to_string(),
        }
    }
}

/// One running process instance of an application.
pub struct Worker {
    key: WorkerKey,
    application: Weak<Application>,
    extensions: Mutex<BTreeMap<String, String>>,
    endpoints: WorkerEndpointRepo,
}

impl Keyed for Worker {
    type Key = WorkerKey;

    fn key(&self) -> &WorkerKey {
        &self.key
    }
}

impl Worker {
    pub(crate) fn new(key: WorkerKey, application: Weak<Application>) -> Self {
        Self {
            key,
            application,
            extensions: Mutex::new(BTreeMap::new()),
            endpoints: WorkerEndpointRepo::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn environment(&self) -> &str {
        &self.key.environment
    }

    pub fn application(&self) -> Option<Arc<Application>> {
        self.application.upgrade()
    }

    pub fn extensions(&self) -> BTreeMap<String, String> {
        lock(&self.extensions).clone()
    }

    pub fn set_extensions(&self, extensions: BTreeMap<String, String>) {
        *lock(&self.extensions) = extensions;
    }

    pub fn endpoints(&self) -> &WorkerEndpointRepo {
        &self.endpoints
    }

    pub fn get_endpoint(
        self: &Arc<Self>,
        host: &str,
        port: u16,
        protocol: i32,
        create_new: bool,
    ) -> Option<Arc<WorkerEndpoint>> {
        let key = WorkerEndpointKey::new(host, port, protocol);
        self.endpoints.get_with(&key, create_new, || WorkerEndpoint {
            key: key.clone(),
            enabled: AtomicBool::new(true),
            worker: Arc::downgrade(self),
        })
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WorkerEndpointKey {
    pub host: String,
    pub port: u16,
    pub protocol: i32,
}

impl WorkerEndpointKey {
    pub fn new(host: &str, port: u16, protocol: i32) -> Self {
        Self {
            host: host.to_string(),
            port,
            protocol,
        }
    }
}

/// One listening point of a worker.
pub struct WorkerEndpoint {
    key: WorkerEndpointKey,
    enabled: AtomicBool,
    worker: Weak<Worker>,
}

impl Keyed for WorkerEndpoint {
    type Key = WorkerEndpointKey;

    fn key(&self) -> &WorkerEndpointKey {
        &self.key
    }
}

impl WorkerEndpoint {
    pub fn host(&self) -> &str {
        &self.key.host
    }

    pub fn port(&self) -> u16 {
        self.key.port
    }

    pub fn protocol(&self) -> i32 {
        self.key.protocol
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn worker(&self) -> Option<Arc<Worker>> {
        self.worker.upgrade()
    }
}

#[cfg(test)]
mod tests {
    use super::{Worker, WorkerKey};
    use std::sync::{Arc, Weak};

    #[test]
    fn endpoints_are_identified_by_host_port_and_protocol() {
        let worker = Arc::new(Worker::new(WorkerKey::new("w", "prod"), Weak::new()));

        worker.get_endpoint("127.0.0.1", 8080, 3, true);
        worker.get_endpoint("127.0.0.1", 8080, 3, true);
        worker.get_endpoint("127.0.0.1", 8080, 2, true);

        assert_eq!(worker.endpoints().count(), 2);
        let endpoints = worker.endpoints().list();
        let first = &endpoints[0];
        assert_eq!(first.protocol(), 2);
        assert!(first.is_enabled());
        assert!(first.worker().is_some());
        assert!(worker.application().is_none());
    }
}
