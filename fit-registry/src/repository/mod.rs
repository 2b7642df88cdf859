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

//! Sorted, mutex-guarded entity repositories.
//!
//! Every repository keeps its entries in strictly increasing key order. Lookups and inserts
//! use binary search, and an insert always lands on the lower-bound position of its key, so
//! re-inserting an existing identity is a no-op rather than a duplicate.
//!
//! Each repository owns its own lock. There is no lock spanning several repositories, and
//! no lock is held while entity constructors run code outside the repository itself.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{
    Application, ApplicationFitable, Fitable, FitableUnavailableEndpoint, Genericable, Worker,
    WorkerEndpoint,
};

/// Entity stored in a [`Repository`], ordered by its identity key.
pub trait Keyed {
    type Key: Ord + Clone + Debug;

    fn key(&self) -> &Self::Key;
}

pub type GenericableRepo = Repository<Genericable>;
pub type FitableRepo = Repository<Fitable>;
pub type ApplicationRepo = Repository<Application>;
pub type ApplicationFitableRepo = Repository<ApplicationFitable>;
pub type WorkerRepo = Repository<Worker>;
pub type WorkerEndpointRepo = Repository<WorkerEndpoint>;
pub type FitableUnavailableEndpointRepo = Repository<FitableUnavailableEndpoint>;

pub struct Repository<T: Keyed> {
    entries: Mutex<Vec<Arc<T>>>,
}

impl<T: Keyed> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> Repository<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    // Every mutation restores sorted order before the guard drops, so a poisoned
    // vector is still valid.
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn search(entries: &[Arc<T>], key: &T::Key) -> Result<usize, usize> {
        entries.binary_search_by(|entry| entry.key().cmp(key))
    }

    /// Returns the entry for `key`, or `None` when absent.
    pub fn get(&self, key: &T::Key) -> Option<Arc<T>> {
        let entries = self.lock();
        Self::search(&entries, key)
            .ok()
            .map(|index| entries[index].clone())
    }

    /// Returns the entry for `key`; when absent and `create_new` is set, inserts the value
    /// built by `create` at its sorted position and returns it.
    pub fn get_with(
        &self,
        key: &T::Key,
        create_new: bool,
        create: impl FnOnce() -> T,
    ) -> Option<Arc<T>> {
        if create_new {
            Some(self.get_or_create(key, create).0)
        } else {
            self.get(key)
        }
    }

    /// Returns the entry for `key`, creating it when absent. The flag reports creation.
    pub fn get_or_create(&self, key: &T::Key, create: impl FnOnce() -> T) -> (Arc<T>, bool) {
        let mut entries = self.lock();
        match Self::search(&entries, key) {
            Ok(index) => (entries[index].clone(), false),
            Err(index) => {
                let entry = Arc::new(create());
                debug_assert!(entry.key() == key);
                entries.insert(index, entry.clone());
                (entry, true)
            }
        }
    }

    /// Inserts an already-built entry. When an entry with the same key exists it is kept and
    /// returned instead.
    pub fn attach(&self, entry: Arc<T>) -> Arc<T> {
        let mut entries = self.lock();
        match Self::search(&entries, entry.key()) {
            Ok(index) => entries[index].clone(),
            Err(index) => {
                entries.insert(index, entry.clone());
                entry
            }
        }
    }

    /// Removes and returns the entry for `key`.
    pub fn remove(&self, key: &T::Key) -> Option<Arc<T>> {
        let mut entries = self.lock();
        Self::search(&entries, key)
            .ok()
            .map(|index| entries.remove(index))
    }

    /// Removes the entry for `key` only when `predicate` holds for it, checked under the lock.
    pub fn remove_if(&self, key: &T::Key, predicate: impl FnOnce(&T) -> bool) -> Option<Arc<T>> {
        let mut entries = self.lock();
        match Self::search(&entries, key) {
            Ok(index) if predicate(&entries[index]) => Some(entries.remove(index)),
            _ => None,
        }
    }

    /// Drops every entry for which `keep` is false and returns the dropped entries in order.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> Vec<Arc<T>> {
        let mut entries = self.lock();
        let mut removed = Vec::new();
        entries.retain(|entry| {
            if keep(entry) {
                true
            } else {
                removed.push(entry.clone());
                false
            }
        });
        removed
    }

    /// Drops every entry and returns them in order.
    pub fn clear(&self) -> Vec<Arc<T>> {
        std::mem::take(&mut *self.lock())
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        Self::search(&self.lock(), key).is_ok()
    }

    /// Ordered copy of the current entries; safe to iterate while the repository mutates.
    pub fn list(&self) -> Vec<Arc<T>> {
        self.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Keyed, Repository};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[derive(Debug)]
    struct Entry {
        key: u32,
        label: &'static str,
    }

    impl Keyed for Entry {
        type Key = u32;

        fn key(&self) -> &u32 {
            &self.key
        }
    }

    fn entry(key: u32) -> Entry {
        Entry { key, label: "" }
    }

    fn keys(repository: &Repository<Entry>) -> Vec<u32> {
        repository.list().iter().map(|entry| entry.key).collect()
    }

    #[test]
    fn get_without_create_new_returns_none() {
        let repository = Repository::<Entry>::new();

        assert!(repository.get_with(&7, false, || entry(7)).is_none());
        assert_eq!(repository.count(), 0);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let repository = Repository::new();

        let (first, created) = repository.get_or_create(&7, || Entry { key: 7, label: "first" });
        assert!(created);
        let (second, created) =
            repository.get_or_create(&7, || Entry { key: 7, label: "second" });
        assert!(!created);

        assert_eq!(second.label, "first");
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(repository.count(), 1);
    }

    #[test]
    fn attach_keeps_existing_entry() {
        let repository = Repository::new();
        repository.attach(std::sync::Arc::new(Entry { key: 1, label: "kept" }));

        let attached = repository.attach(std::sync::Arc::new(Entry {
            key: 1,
            label: "dropped",
        }));

        assert_eq!(attached.label, "kept");
        assert_eq!(repository.count(), 1);
    }

    #[test]
    fn remove_if_checks_predicate_under_lock() {
        let repository = Repository::new();
        repository.get_or_create(&3, || entry(3));

        assert!(repository.remove_if(&3, |_| false).is_none());
        assert!(repository.remove_if(&3, |_| true).is_some());
        assert!(repository.remove(&3).is_none());
    }

    #[test]
    fn retain_returns_removed_entries_in_order() {
        let repository = Repository::new();
        for key in [5, 1, 4, 2, 3] {
            repository.get_or_create(&key, || entry(key));
        }

        let removed: Vec<u32> = repository
            .retain(|entry| entry.key % 2 == 1)
            .iter()
            .map(|entry| entry.key)
            .collect();

        assert_eq!(removed, vec![2, 4]);
        assert_eq!(keys(&repository), vec![1, 3, 5]);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(u32),
        Remove(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            2 => (0u32..64).prop_map(Op::Insert),
            1 => (0u32..64).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn list_stays_strictly_increasing_under_random_churn(
            ops in proptest::collection::vec(op(), 0..400)
        ) {
            let repository = Repository::new();
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Insert(key) => {
                        let (_, created) = repository.get_or_create(&key, || entry(key));
                        prop_assert_eq!(created, model.insert(key));
                    }
                    Op::Remove(key) => {
                        prop_assert_eq!(repository.remove(&key).is_some(), model.remove(&key));
                    }
                }

                let keys = keys(&repository);
                prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
                prop_assert_eq!(keys, model.iter().copied().collect::<Vec<_>>());
            }
        }
    }
}
