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

//! Locating resource data for a scope, name and variant attributes

use log::{debug, warn};
use std::fmt::Debug;
use std::fs::File;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::locale::Locale;

/// Resource data found by a [`ResourceStreamLocator`]
///
/// Records the variant attributes that actually matched, these can be less specific than the
/// requested ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStream {
    path: PathBuf,
    locale: Option<Locale>,
    style: Option<String>,
    variation: Option<String>,
    content_type: Option<String>,
    length: u64,
    last_modified: Option<SystemTime>,
}

impl ResourceStream {
    /// Collects the metadata for a file.
    ///
    /// This method will return any errors produced by [`std::fs::metadata()`]. It will also result
    /// in a [`ErrorKind::InvalidInput`] error if the path given doesn’t point to a regular file.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let meta = path.metadata()?;

        if !meta.is_file() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .map(ToOwned::to_owned);

        Ok(Self {
            content_type,
            length: meta.len(),
            last_modified: meta.modified().ok(),
            path,
            locale: None,
            style: None,
            variation: None,
        })
    }

    fn with_attributes(
        mut self,
        locale: Option<Locale>,
        style: Option<&str>,
        variation: Option<&str>,
    ) -> Self {
        self.locale = locale;
        self.style = style.map(ToOwned::to_owned);
        self.variation = variation.map(ToOwned::to_owned);
        self
    }

    /// Opens the resource data for reading.
    pub fn open(&self) -> Result<File, Error> {
        File::open(&self.path)
    }

    /// File system path of the resource
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locale of the variant found
    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    /// Style of the variant found
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Variation of the variant found
    pub fn variation(&self) -> Option<&str> {
        self.variation.as_deref()
    }

    /// MIME type guessed from the file name
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Size of the data in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Last modification time if known
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }
}

/// Finds resource data
pub trait ResourceStreamLocator: Debug + Send + Sync {
    /// Locates the resource `path` within `scope`.
    ///
    /// In `strict` mode only the exact combination of `locale`, `style` and `variation` is
    /// accepted. Otherwise less specific variants are tried as well, the first existing one wins.
    fn locate(
        &self,
        scope: &str,
        path: &str,
        style: Option<&str>,
        variation: Option<&str>,
        locale: Option<&Locale>,
        strict: bool,
    ) -> Option<ResourceStream>;
}

/// Locates resources as files below a root directory
///
/// A scope like `app::components` maps to the directory `app/components`. Variant attributes are
/// added to the file name before its extension: `name[_variation][_style][_locale].ext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemLocator {
    root: Option<PathBuf>,
}

impl FileSystemLocator {
    /// Creates a locator for the given root directory. Without a root directory no resources
    /// will be found.
    pub fn new(root: Option<PathBuf>) -> Self {
        let root = root.map(|root| root.canonicalize().unwrap_or(root));
        Self { root }
    }

    /// The root directory
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

fn candidate(
    path: &Path,
    root: &Path,
    locale: Option<Locale>,
    style: Option<&str>,
    variation: Option<&str>,
) -> Option<ResourceStream> {
    let canonical = path.canonicalize().ok()?;
    if !canonical.starts_with(root) {
        warn!("Resource path {path:?} resolves to a location outside of the root directory");
        return None;
    }

    match ResourceStream::from_path(canonical) {
        Ok(stream) => Some(stream.with_attributes(locale, style, variation)),
        Err(err) => {
            debug!("Skipping resource candidate {path:?}: {err}");
            None
        }
    }
}

fn variant_file_name(
    base: &str,
    extension: &str,
    locale: Option<&Locale>,
    style: Option<&str>,
    variation: Option<&str>,
) -> String {
    let mut name = String::from(base);
    for attribute in [variation, style].into_iter().flatten() {
        name.push('_');
        name.push_str(attribute);
    }
    if let Some(locale) = locale {
        name.push('_');
        name.push_str(&locale.to_string());
    }
    name.push_str(extension);
    name
}

impl ResourceStreamLocator for FileSystemLocator {
    fn locate(
        &self,
        scope: &str,
        path: &str,
        style: Option<&str>,
        variation: Option<&str>,
        locale: Option<&Locale>,
        strict: bool,
    ) -> Option<ResourceStream> {
        let root = self.root.as_deref()?;

        let mut dir = root.to_path_buf();
        for component in scope.split("::").filter(|component| !component.is_empty()) {
            dir.push(component);
        }

        let (parent, file) = path.rsplit_once('/').unwrap_or(("", path));
        if !parent.is_empty() {
            dir.push(parent);
        }
        let (base, extension) = match file.rfind('.') {
            Some(pos) if pos > 0 => file.split_at(pos),
            _ => (file, ""),
        };

        let mut variants = vec![(style, variation)];
        let mut locales = vec![locale.cloned()];
        if !strict {
            for variant in [(style, None), (None, variation), (None, None)] {
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }

            if let Some(locale) = locale {
                locales = locale.fallbacks().into_iter().map(Some).collect();
                locales.push(None);
            }
        }

        for (style, variation) in variants {
            for locale in &locales {
                let name = variant_file_name(base, extension, locale.as_ref(), style, variation);
                if let Some(stream) =
                    candidate(&dir.join(&name), root, locale.clone(), style, variation)
                {
                    debug!("Located resource {path} in scope {scope} at {:?}", stream.path());
                    return Some(stream);
                }
            }
        }

        None
    }
}
