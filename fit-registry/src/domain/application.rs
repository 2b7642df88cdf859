//! Application entity: a deployable unit owning its running workers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::domain::{lock, Worker, WorkerKey};
use crate::fitable_instance::ApplicationInfo;
use crate::repository::{ApplicationFitableRepo, Keyed, WorkerRepo};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ApplicationKey {
    pub name: String,
    pub name_version: String,
}

impl ApplicationKey {
    pub fn new(name: &str, name_version: &str) -> Self {
        Self {
            name: name.to_string(),
            name_version: name_version.to_string(),
        }
    }
}

impl From<&ApplicationInfo> for ApplicationKey {
    fn from(info: &ApplicationInfo) -> Self {
        Self::new(&info.name, &info.name_version)
    }
}

pub struct Application {
    key: ApplicationKey,
    extensions: Mutex<BTreeMap<String, String>>,
    workers: WorkerRepo,
    fitables: ApplicationFitableRepo,
}

impl Keyed for Application {
    type Key = ApplicationKey;

    fn key(&self) -> &ApplicationKey {
        &self.key
    }
}

impl Application {
    pub(crate) fn new(key: ApplicationKey) -> Self {
        Self {
            key,
            extensions: Mutex::new(BTreeMap::new()),
            workers: WorkerRepo::new(),
            fitables: ApplicationFitableRepo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn name_version(&self) -> &str {
        &self.key.name_version
    }

    pub fn extensions(&self) -> BTreeMap<String, String> {
        lock(&self.extensions).clone()
    }

    pub fn set_extensions(&self, extensions: BTreeMap<String, String>) {
        *lock(&self.extensions) = extensions;
    }

    pub fn info(&self) -> ApplicationInfo {
        ApplicationInfo {
            name: self.key.name.clone(),
            name_version: self.key.name_version.clone(),
            extensions: self.extensions(),
        }
    }

    pub fn workers(&self) -> &WorkerRepo {
        &self.workers
    }

    /// Relations to every fitable this application currently serves.
    pub fn fitables(&self) -> &ApplicationFitableRepo {
        &self.fitables
    }

    pub fn get_worker(
        self: &Arc<Self>,
        id: &str,
        environment: &str,
        create_new: bool,
    ) -> Option<Arc<Worker>> {
        let key = WorkerKey::new(id, environment);
        self.workers.get_with(&key, create_new, || {
            Worker::new(key.clone(), Arc::downgrade(self))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Application, ApplicationKey};
    use std::sync::Arc;

    #[test]
    fn workers_are_created_lazily_with_back_reference() {
        let application = Arc::new(Application::new(ApplicationKey::new("app", "1")));

        assert!(application.get_worker("w", "prod", false).is_none());
        let worker = application
            .get_worker("w", "prod", true)
            .expect("worker should be created");

        assert_eq!(application.workers().count(), 1);
        let owner = worker.application().expect("owner should be alive");
        assert!(Arc::ptr_eq(&owner, &application));
    }

    #[test]
    fn application_keys_order_by_name_then_version() {
        let mut keys = vec![
            ApplicationKey::new("b", "1"),
            ApplicationKey::new("a", "2"),
            ApplicationKey::new("a", "1"),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                ApplicationKey::new("a", "1"),
                ApplicationKey::new("a", "2"),
                ApplicationKey::new("b", "1"),
            ]
        );
    }
}
