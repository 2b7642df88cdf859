//! Genericable entity: a versioned service contract owning its fitables.

use std::sync::Arc;

use crate::domain::Fitable;
use crate::fitable_instance::FitableInfo;
use crate::repository::{FitableRepo, Keyed};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GenericableKey {
    pub id: String,
    pub version: String,
}

impl From<&FitableInfo> for GenericableKey {
    fn from(info: &FitableInfo) -> Self {
        Self {
            id: info.genericable_id.clone(),
            version: info.genericable_version.clone(),
        }
    }
}

pub struct Genericable {
    key: GenericableKey,
    fitables: FitableRepo,
}

impl Keyed for Genericable {
    type Key = GenericableKey;

    fn key(&self) -> &GenericableKey {
        &self.key
    }
}

impl Genericable {
    pub(crate) fn new(key: GenericableKey) -> Self {
        Self {
            key,
            fitables: FitableRepo::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn version(&self) -> &str {
        &self.key.version
    }

    pub fn fitables(&self) -> &FitableRepo {
        &self.fitables
    }

    pub fn get_fitable(&self, info: &FitableInfo) -> Option<Arc<Fitable>> {
        self.fitables.get(info)
    }

    /// Returns the fitable for `info`, creating it with a back-reference to `self` when absent.
    pub(crate) fn get_or_create_fitable(self: &Arc<Self>, info: &FitableInfo) -> (Arc<Fitable>, bool) {
        self.fitables
            .get_or_create(info, || Fitable::new(info.clone(), Arc::downgrade(self)))
    }
}
