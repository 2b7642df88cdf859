//! Fitable entity and its relation to the applications that serve it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::domain::{
    lock, Application, ApplicationKey, FitableUnavailableEndpoint, Genericable,
    UnavailableEndpointKey,
};
use crate::fitable_instance::FitableInfo;
use crate::repository::{ApplicationFitableRepo, FitableUnavailableEndpointRepo, Keyed};

/// One implementation variant of a genericable.
pub struct Fitable {
    info: FitableInfo,
    genericable: Weak<Genericable>,
    applications: ApplicationFitableRepo,
    unavailable_endpoints: FitableUnavailableEndpointRepo,
    requested: AtomicBool,
}

impl Keyed for Fitable {
    type Key = FitableInfo;

    fn key(&self) -> &FitableInfo {
        &self.info
    }
}

impl Fitable {
    pub(crate) fn new(info: FitableInfo, genericable: Weak<Genericable>) -> Self {
        Self {
            info,
            genericable,
            applications: ApplicationFitableRepo::new(),
            unavailable_endpoints: FitableUnavailableEndpointRepo::new(),
            requested: AtomicBool::new(false),
        }
    }

    pub fn info(&self) -> &FitableInfo {
        &self.info
    }

    /// Owning genericable, or `None` once it has been pruned.
    pub fn genericable(&self) -> Option<Arc<Genericable>> {
        self.genericable.upgrade()
    }

    pub fn applications(&self) -> &ApplicationFitableRepo {
        &self.applications
    }

    pub fn unavailable_endpoints(&self) -> &FitableUnavailableEndpointRepo {
        &self.unavailable_endpoints
    }

    pub fn get_application_fitable(
        &self,
        application: &ApplicationKey,
    ) -> Option<Arc<ApplicationFitable>> {
        self.applications
            .get(&ApplicationFitableKey::new(application, &self.info))
    }

    /// Links `application` to this fitable on both sides. Re-attaching returns the existing
    /// relation.
    pub fn attach_application(
        self: &Arc<Self>,
        application: &Arc<Application>,
    ) -> Arc<ApplicationFitable> {
        let key = ApplicationFitableKey::new(application.key(), &self.info);
        let (relation, _) = self.applications.get_or_create(&key, || ApplicationFitable {
            key: key.clone(),
            application: Arc::downgrade(application),
            fitable: Arc::downgrade(self),
            formats: Mutex::new(Vec::new()),
        });
        let current = relation
            .application()
            .is_some_and(|linked| Arc::ptr_eq(&linked, application));
        if !current {
            // Left over from a pruned application with the same identity.
            self.applications.remove_if(&key, |stale| {
                std::ptr::eq(stale, Arc::as_ptr(&relation))
            });
            return self.attach_application(application);
        }
        application.fitables().attach(relation.clone());
        relation
    }

    /// Unlinks `application` from this fitable on both sides. Only the relation is removed;
    /// pruning the application itself is left to the topology.
    pub fn detach_application(&self, application: &ApplicationKey) -> Option<Arc<ApplicationFitable>> {
        let relation = self
            .applications
            .remove(&ApplicationFitableKey::new(application, &self.info))?;
        if let Some(application) = relation.application() {
            application.fitables().remove(relation.key());
        }
        Some(relation)
    }

    /// Marks `host:port` unavailable for this fitable and (re)arms its expiration.
    pub fn isolate_endpoint(
        self: &Arc<Self>,
        host: &str,
        port: u16,
        expiration: u32,
    ) -> Arc<FitableUnavailableEndpoint> {
        let key = UnavailableEndpointKey::new(host, port);
        loop {
            let (marker, created) = self.unavailable_endpoints.get_or_create(&key, || {
                FitableUnavailableEndpoint::new(key.clone(), expiration, Arc::downgrade(self))
            });
            if created {
                return marker;
            }
            marker.reset(expiration);
            // The sweep may have lifted the marker before it was re-armed.
            if self
                .unavailable_endpoints
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(&current, &marker))
            {
                return marker;
            }
        }
    }

    pub fn is_isolated(&self, host: &str, port: u16) -> bool {
        self.unavailable_endpoints
            .contains(&UnavailableEndpointKey::new(host, port))
    }

    /// Whether a local caller asked for this fitable and has not released it.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn set_requested(&self, requested: bool) {
        self.requested.store(requested, Ordering::SeqCst);
    }

    /// True when no local caller holds this fitable, nothing serves it and no isolation
    /// marker still refers to it.
    pub fn is_unreferenced(&self) -> bool {
        !self.is_requested()
            && self.applications.is_empty()
            && self.unavailable_endpoints.is_empty()
    }
}

/// Sorted by application identity first, then by fitable identity.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ApplicationFitableKey {
    pub application: ApplicationKey,
    pub fitable: FitableInfo,
}

impl ApplicationFitableKey {
    pub fn new(application: &ApplicationKey, fitable: &FitableInfo) -> Self {
        Self {
            application: application.clone(),
            fitable: fitable.clone(),
        }
    }
}

/// Many-to-many relation between a fitable and an application, carrying the serialization
/// formats the application supports for that fitable.
pub struct ApplicationFitable {
    key: ApplicationFitableKey,
    application: Weak<Application>,
    fitable: Weak<Fitable>,
    formats: Mutex<Vec<i32>>,
}

impl Keyed for ApplicationFitable {
    type Key = ApplicationFitableKey;

    fn key(&self) -> &ApplicationFitableKey {
        &self.key
    }
}

impl ApplicationFitable {
    pub fn application(&self) -> Option<Arc<Application>> {
        self.application.upgrade()
    }

    pub fn fitable(&self) -> Option<Arc<Fitable>> {
        self.fitable.upgrade()
    }

    pub fn formats(&self) -> Vec<i32> {
        lock(&self.formats).clone()
    }

    /// Replaces the format list wholesale with the latest snapshot.
    pub fn set_formats(&self, formats: Vec<i32>) {
        *lock(&self.formats) = formats;
    }
}
