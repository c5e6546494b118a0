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

//! Resource references: stable, registrable identities that produce resources on demand

use dashmap::{DashMap, DashSet};
use log::debug;
use once_cell::sync::Lazy;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::configuration::ResourceSettings;
use crate::locale::Locale;
use crate::resource::Resource;
use crate::resources::PackageResource;

static INTERNED: Lazy<DashSet<Arc<str>>> = Lazy::new(DashSet::new);

/// Interned strings are swept once the set grows to this size, the threshold adapts to the number
/// of strings still in use afterwards.
const MIN_SWEEP_THRESHOLD: usize = 1024;
static SWEEP_THRESHOLD: AtomicUsize = AtomicUsize::new(MIN_SWEEP_THRESHOLD);

/// Returns the shared instance of a string, so that keys repeating the same scopes and names
/// don’t keep copies of them.
fn intern(value: &str) -> Arc<str> {
    if let Some(interned) = INTERNED.get(value) {
        return interned.key().clone();
    }

    let interned: Arc<str> = Arc::from(value);
    INTERNED.insert(interned.clone());
    if INTERNED.len() >= SWEEP_THRESHOLD.load(Ordering::Relaxed) {
        release_interned();
    }
    interned
}

/// Drops interned strings no key refers to any more.
pub(crate) fn release_interned() {
    INTERNED.retain(|value| Arc::strong_count(value) > 1);
    let remaining = INTERNED.len();
    debug!("{remaining} interned key strings left in use");
    SWEEP_THRESHOLD.store(
        remaining.saturating_mul(2).max(MIN_SWEEP_THRESHOLD),
        Ordering::Relaxed,
    );
}

/// Identifies a resource: scope, name and the variant attributes locale, style and variation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    scope: Arc<str>,
    name: Arc<str>,
    locale: Option<Locale>,
    style: Option<Arc<str>>,
    variation: Option<Arc<str>>,
}

impl Key {
    /// Creates a key.
    pub fn new(
        scope: &str,
        name: &str,
        locale: Option<Locale>,
        style: Option<&str>,
        variation: Option<&str>,
    ) -> Self {
        Self {
            scope: intern(scope),
            name: intern(name),
            locale,
            style: style.map(intern),
            variation: variation.map(intern),
        }
    }

    /// Creates a key without variant attributes.
    pub fn simple(scope: &str, name: &str) -> Self {
        Self::new(scope, name, None, None, None)
    }

    /// Scope the resource belongs to
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Resource name within the scope
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locale if any
    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    /// Style if any
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Variation if any
    pub fn variation(&self) -> Option<&str> {
        self.variation.as_deref()
    }

    /// Copy of the key with some of the variant attributes removed.
    pub(crate) fn without(&self, locale: bool, style: bool, variation: bool) -> Self {
        Self {
            scope: self.scope.clone(),
            name: self.name.clone(),
            locale: if locale { None } else { self.locale.clone() },
            style: if style { None } else { self.style.clone() },
            variation: if variation {
                None
            } else {
                self.variation.clone()
            },
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)?;
        if let Some(locale) = &self.locale {
            write!(f, " locale={locale}")?;
        }
        if let Some(style) = &self.style {
            write!(f, " style={style}")?;
        }
        if let Some(variation) = &self.variation {
            write!(f, " variation={variation}")?;
        }
        Ok(())
    }
}

/// Variant attributes used when generating resource URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UrlAttributes {
    /// Locale
    pub locale: Option<Locale>,
    /// Style
    pub style: Option<String>,
    /// Variation
    pub variation: Option<String>,
}

impl From<&Key> for UrlAttributes {
    fn from(key: &Key) -> Self {
        Self {
            locale: key.locale().cloned(),
            style: key.style().map(ToOwned::to_owned),
            variation: key.variation().map(ToOwned::to_owned),
        }
    }
}

/// A named handle producing a [`Resource`] on demand
pub trait ResourceReference: Debug + Send + Sync {
    /// The key identifying this reference
    fn key(&self) -> &Key;

    /// Produces the resource.
    fn resource(&self) -> Arc<dyn Resource>;

    /// Whether the reference may be added to the registry.
    fn can_be_registered(&self) -> bool {
        true
    }

    /// Variant attributes to put into URLs pointing to this reference. `requested` holds the
    /// attributes of the current request, e.g. the user’s locale and style.
    fn url_attributes(
        &self,
        _requested: &UrlAttributes,
        _settings: &ResourceSettings,
    ) -> UrlAttributes {
        UrlAttributes::from(self.key())
    }
}

impl PartialEq for dyn ResourceReference {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for dyn ResourceReference {}

/// Reference to a resource located through the configured locator
#[derive(Debug)]
pub struct PackageResourceReference {
    key: Key,
    text_encoding: Option<String>,
    url_attributes: DashMap<UrlAttributes, UrlAttributes>,
}

impl PackageResourceReference {
    /// Creates a reference for the key.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            text_encoding: None,
            url_attributes: DashMap::new(),
        }
    }

    /// Sets the character set of the text data served.
    pub fn with_text_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.text_encoding = Some(encoding.into());
        self
    }
}

impl ResourceReference for PackageResourceReference {
    fn key(&self) -> &Key {
        &self.key
    }

    fn resource(&self) -> Arc<dyn Resource> {
        let resource = PackageResource::new(self.key.clone());
        match &self.text_encoding {
            Some(encoding) => Arc::new(resource.with_text_encoding(encoding)),
            None => Arc::new(resource),
        }
    }

    /// Reports the variant attributes of the file actually found, e.g. no style if the requested
    /// style doesn’t exist. Attributes of the key take precedence over the requested ones.
    /// Results are cached per combination.
    fn url_attributes(
        &self,
        requested: &UrlAttributes,
        settings: &ResourceSettings,
    ) -> UrlAttributes {
        let wanted = UrlAttributes {
            locale: self.key.locale().or(requested.locale.as_ref()).cloned(),
            style: self
                .key
                .style()
                .or(requested.style.as_deref())
                .map(ToOwned::to_owned),
            variation: self
                .key
                .variation()
                .or(requested.variation.as_deref())
                .map(ToOwned::to_owned),
        };
        if let Some(attributes) = self.url_attributes.get(&wanted) {
            return attributes.value().clone();
        }

        let attributes = settings
            .locator()
            .locate(
                self.key.scope(),
                self.key.name(),
                wanted.style.as_deref(),
                wanted.variation.as_deref(),
                wanted.locale.as_ref(),
                false,
            )
            .map_or_else(
                || wanted.clone(),
                |stream| UrlAttributes {
                    locale: stream.locale().cloned(),
                    style: stream.style().map(ToOwned::to_owned),
                    variation: stream.variation().map(ToOwned::to_owned),
                },
            );
        self.url_attributes.insert(wanted, attributes.clone());
        attributes
    }
}

/// Reference to a fixed resource instance, e.g. an application-wide shared resource
#[derive(Debug, Clone)]
pub struct SharedResourceReference {
    key: Key,
    resource: Arc<dyn Resource>,
}

impl SharedResourceReference {
    /// Creates a reference to the resource.
    pub fn new(key: Key, resource: Arc<dyn Resource>) -> Self {
        Self { key, resource }
    }
}

impl ResourceReference for SharedResourceReference {
    fn key(&self) -> &Key {
        &self.key
    }

    fn resource(&self) -> Arc<dyn Resource> {
        self.resource.clone()
    }
}

/// Makes another reference available under a different key
///
/// Aliases are resolved by whoever creates them and are never registered.
#[derive(Debug, Clone)]
pub struct AliasResourceReference {
    key: Key,
    target: Arc<dyn ResourceReference>,
}

impl AliasResourceReference {
    /// Creates an alias for the target reference.
    pub fn new(key: Key, target: Arc<dyn ResourceReference>) -> Self {
        Self { key, target }
    }

    /// The reference this alias points to
    pub fn target(&self) -> &Arc<dyn ResourceReference> {
        &self.target
    }
}

impl ResourceReference for AliasResourceReference {
    fn key(&self) -> &Key {
        &self.key
    }

    fn resource(&self) -> Arc<dyn Resource> {
        self.target.resource()
    }

    fn can_be_registered(&self) -> bool {
        false
    }

    fn url_attributes(
        &self,
        requested: &UrlAttributes,
        settings: &ResourceSettings,
    ) -> UrlAttributes {
        self.target.url_attributes(requested, settings)
    }
}
