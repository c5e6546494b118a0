// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Registry of resource references
//!
//! References are registered explicitly, discovered through registered scopes or, if a default
//! reference factory is configured, created on first request. The latter are kept in a bounded
//! queue, the oldest ones are removed from the registry once the capacity is exceeded.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;

use crate::configuration::{ResourceSettings, DEFAULT_AUTO_ADDED_CAPACITY};
use crate::reference::{release_interned, Key, PackageResourceReference, ResourceReference};
use crate::resources::PackageResource;

/// Creates references for keys that aren’t registered
pub trait DefaultReferenceFactory: Debug + Send + Sync {
    /// Creates a reference for the key, `None` if there is no such resource.
    fn create_default_reference(&self, key: &Key) -> Option<Arc<dyn ResourceReference>>;
}

/// Creates [`PackageResourceReference`] instances for package resources that exist
#[derive(Debug, Clone)]
pub struct PackageReferenceFactory {
    settings: Arc<ResourceSettings>,
}

impl PackageReferenceFactory {
    /// Creates a factory checking resource existence with the given settings.
    pub fn new(settings: Arc<ResourceSettings>) -> Self {
        Self { settings }
    }
}

impl DefaultReferenceFactory for PackageReferenceFactory {
    fn create_default_reference(&self, key: &Key) -> Option<Arc<dyn ResourceReference>> {
        if PackageResource::exists(&self.settings, key) {
            Some(Arc::new(PackageResourceReference::new(key.clone())))
        } else {
            None
        }
    }
}

/// A scope listing the references declared in it
///
/// Scopes are registered with the registry up front, their references are only registered when a
/// lookup in the scope fails for the first time.
pub trait ResourceScope: Debug + Send + Sync {
    /// Scope name as used in keys
    fn name(&self) -> &str;

    /// Enclosing scope whose references are registered along with this scope’s
    fn parent(&self) -> Option<Arc<dyn ResourceScope>> {
        None
    }

    /// References declared in this scope
    fn resource_references(&self) -> Vec<Arc<dyn ResourceReference>>;
}

#[derive(Debug)]
struct AutoAddedQueue {
    capacity: usize,
    keys: VecDeque<Key>,
}

/// Registry mapping keys to resource references
#[derive(Debug)]
pub struct ResourceReferenceRegistry {
    map: DashMap<Key, Arc<dyn ResourceReference>>,
    auto_added: Mutex<Option<AutoAddedQueue>>,
    scopes: DashMap<Arc<str>, Arc<dyn ResourceScope>>,
    scanned: DashSet<Arc<str>>,
    factory: Option<Arc<dyn DefaultReferenceFactory>>,
}

impl ResourceReferenceRegistry {
    /// Creates a registry. Without a factory, lookups never create references.
    pub fn new(factory: Option<Arc<dyn DefaultReferenceFactory>>) -> Self {
        let registry = Self {
            map: DashMap::new(),
            auto_added: Mutex::new(None),
            scopes: DashMap::new(),
            scanned: DashSet::new(),
            factory,
        };
        registry.set_auto_added_capacity(DEFAULT_AUTO_ADDED_CAPACITY);
        registry
    }

    /// Creates a registry creating package resource references on demand, with the auto-added
    /// capacity from the settings.
    pub fn from_settings(settings: Arc<ResourceSettings>) -> Self {
        let capacity = settings.auto_added_capacity();
        let registry = Self::new(Some(Arc::new(PackageReferenceFactory::new(settings))));
        registry.set_auto_added_capacity(capacity);
        registry
    }

    /// Registers a reference unless another reference is registered for the same key already.
    ///
    /// Returns `false` if the reference refuses registration.
    pub fn register(&self, reference: Arc<dyn ResourceReference>) -> bool {
        if !reference.can_be_registered() {
            warn!("{} cannot be added to the registry", reference.key());
            return false;
        }

        let key = reference.key().clone();
        match self.map.entry(key) {
            Entry::Occupied(entry) => {
                debug!("A reference for {} is registered already", entry.key());
            }
            Entry::Vacant(entry) => {
                entry.insert(reference);
            }
        }
        true
    }

    /// Removes the reference for a key.
    pub fn unregister(&self, key: &Key) -> Option<Arc<dyn ResourceReference>> {
        let mut guard = self.auto_added.lock();
        let removed = self.map.remove(key).map(|(_, reference)| reference);
        if removed.is_some() {
            if let Some(queue) = guard.as_mut() {
                queue.keys.retain(|queued| queued != key);
            }
        }
        removed
    }

    /// Makes the references of a scope available for discovery.
    pub fn register_scope(&self, scope: Arc<dyn ResourceScope>) {
        self.scopes.insert(Arc::from(scope.name()), scope);
    }

    /// Looks up the reference for a key.
    ///
    /// Unless `strict` is set, less specific keys are tried if the exact one isn’t registered:
    /// without variation, without style, without both, then the same three again without locale
    /// followed by the key without any variant attributes. If nothing is found the key’s scope is
    /// scanned for references once. As a last resort and if `create_if_missing` is set, the
    /// default reference factory is asked to create a reference for the key.
    pub fn get_resource_reference(
        &self,
        key: &Key,
        strict: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn ResourceReference>> {
        if let Some(reference) = self.lookup(key, strict) {
            return Some(reference);
        }

        if self.scan_scope(key.scope()) > 0 {
            if let Some(reference) = self.get(key) {
                return Some(reference);
            }
        }

        if create_if_missing {
            self.add_default_reference(key)
        } else {
            None
        }
    }

    fn get(&self, key: &Key) -> Option<Arc<dyn ResourceReference>> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    fn lookup(&self, key: &Key, strict: bool) -> Option<Arc<dyn ResourceReference>> {
        if let Some(reference) = self.get(key) {
            return Some(reference);
        }
        if strict {
            return None;
        }

        let has_locale = key.locale().is_some();
        let has_style = key.style().is_some();
        let has_variation = key.variation().is_some();

        // (locale, style, variation) to drop
        let candidates = [
            (false, false, true, has_variation),
            (false, true, false, has_style),
            (false, true, true, has_style && has_variation),
            (true, false, false, has_locale),
            (true, true, false, has_locale && has_style),
            (true, false, true, has_locale && has_variation),
            (true, true, true, has_locale && has_style && has_variation),
        ];
        candidates
            .into_iter()
            .filter(|(_, _, _, applicable)| *applicable)
            .find_map(|(locale, style, variation, _)| {
                self.get(&key.without(locale, style, variation))
            })
    }

    /// Registers the references of a scope and its parents, each scope is only scanned once.
    /// Returns the number of references found.
    fn scan_scope(&self, name: &str) -> usize {
        let mut found = 0;
        let mut current = self.scopes.get(name).map(|entry| entry.value().clone());
        while let Some(scope) = current {
            if !self.scanned.insert(Arc::from(scope.name())) {
                break;
            }

            for reference in scope.resource_references() {
                if self.register(reference) {
                    found += 1;
                }
            }
            debug!("Scanned scope {}, {found} references found", scope.name());
            current = scope.parent();
        }
        found
    }

    fn add_default_reference(&self, key: &Key) -> Option<Arc<dyn ResourceReference>> {
        let reference = self.factory.as_ref()?.create_default_reference(key)?;
        if !reference.can_be_registered() {
            return Some(reference);
        }

        // Map and queue only change together while the queue is locked
        let mut guard = self.auto_added.lock();
        match self.map.entry(key.clone()) {
            Entry::Occupied(entry) => return Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(reference.clone());
            }
        }

        if let Some(queue) = guard.as_mut() {
            queue.keys.push_back(key.clone());
            let capacity = queue.capacity;
            self.enforce_capacity(queue, capacity);
        }
        Some(reference)
    }

    fn enforce_capacity(&self, queue: &mut AutoAddedQueue, capacity: usize) {
        while queue.keys.len() > capacity {
            if let Some(key) = queue.keys.pop_front() {
                debug!("Removing auto-added reference {key} from the registry");
                self.map.remove(&key);
            }
        }
    }

    /// Sets the number of auto-added references to keep.
    ///
    /// A negative capacity unregisters the auto-added references tracked so far and stops
    /// tracking. References added automatically afterwards stay registered until unregistered
    /// explicitly.
    pub fn set_auto_added_capacity(&self, capacity: i64) {
        let mut guard = self.auto_added.lock();
        match usize::try_from(capacity) {
            Ok(capacity) => {
                let queue = guard.get_or_insert_with(|| AutoAddedQueue {
                    capacity,
                    keys: VecDeque::new(),
                });
                queue.capacity = capacity;
                self.enforce_capacity(queue, capacity);
            }
            Err(_) => {
                if let Some(mut queue) = guard.take() {
                    self.enforce_capacity(&mut queue, 0);
                }
                release_interned();
            }
        }
    }

    /// Capacity for auto-added references, `None` if they aren’t tracked.
    pub fn auto_added_capacity(&self) -> Option<usize> {
        self.auto_added.lock().as_ref().map(|queue| queue.capacity)
    }

    /// Removes all auto-added references from the registry.
    pub fn clear_auto_added_entries(&self) {
        if let Some(queue) = self.auto_added.lock().as_mut() {
            self.enforce_capacity(queue, 0);
        }
        release_interned();
    }

    /// Number of auto-added references currently tracked, `None` if they aren’t tracked.
    pub fn auto_added_cache_size(&self) -> Option<usize> {
        self.auto_added.lock().as_ref().map(|queue| queue.keys.len())
    }

    /// Number of registered references
    pub fn size(&self) -> usize {
        self.map.len()
    }
}

impl Default for ResourceReferenceRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
