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

//! Caching strategies for resources that can be cached long-term

use http::{request, Extensions};
use log::debug;
use std::fmt::Debug;
use std::time::UNIX_EPOCH;

use crate::configuration::ResourceSettings;
use crate::resource::StaticCacheableResource;
use crate::response::{CacheScope, ResourceResponse};

/// The resource version requested by the client through a decorated URL
///
/// Stored in the request extensions by [`CachingStrategy::undecorate_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedVersion(pub String);

/// Adds version information to resource URLs so that responses can be cached indefinitely
pub trait CachingStrategy: Debug + Send + Sync {
    /// Adds version information to the file name in a resource URL.
    fn decorate_url(
        &self,
        file_name: &str,
        resource: &dyn StaticCacheableResource,
        settings: &ResourceSettings,
    ) -> String;

    /// Removes version information from the file name in a resource URL. The version found is
    /// stored as [`RequestedVersion`] in the request extensions.
    fn undecorate_url(&self, file_name: &str, extensions: &mut Extensions) -> String;

    /// Adjusts caching of the response to the version requested.
    fn decorate_response(
        &self,
        response: &mut ResourceResponse,
        resource: &dyn StaticCacheableResource,
        settings: &ResourceSettings,
        request: &request::Parts,
    );
}

/// Leaves resource URLs and responses unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpCachingStrategy;

impl CachingStrategy for NoOpCachingStrategy {
    fn decorate_url(
        &self,
        file_name: &str,
        _resource: &dyn StaticCacheableResource,
        _settings: &ResourceSettings,
    ) -> String {
        file_name.to_owned()
    }

    fn undecorate_url(&self, file_name: &str, _extensions: &mut Extensions) -> String {
        file_name.to_owned()
    }

    fn decorate_response(
        &self,
        _response: &mut ResourceResponse,
        _resource: &dyn StaticCacheableResource,
        _settings: &ResourceSettings,
        _request: &request::Parts,
    ) {
    }
}

/// Inserts the resource version into the file name, e.g. `style-ver-1431704061000.css`
///
/// The version is the resource’s last modification time in milliseconds. Requests for the current
/// version may be cached by anyone for the maximal duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameWithVersionStrategy {
    version_prefix: String,
}

impl FilenameWithVersionStrategy {
    /// Prefix used unless configured otherwise
    pub const DEFAULT_VERSION_PREFIX: &'static str = "-ver-";

    /// Creates a strategy with a custom version prefix.
    pub fn new(version_prefix: impl Into<String>) -> Self {
        Self {
            version_prefix: version_prefix.into(),
        }
    }

    /// Calculates the current version of a resource.
    pub fn version(
        &self,
        resource: &dyn StaticCacheableResource,
        settings: &ResourceSettings,
    ) -> Option<String> {
        let last_modified = resource.last_modified(settings)?;
        let millis = last_modified.duration_since(UNIX_EPOCH).ok()?.as_millis();
        Some(millis.to_string())
    }
}

impl Default for FilenameWithVersionStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VERSION_PREFIX)
    }
}

fn split_extension(file_name: &str) -> (&str, &str) {
    let name_start = file_name.rfind('/').map_or(0, |pos| pos + 1);
    match file_name[name_start..].rfind('.') {
        Some(pos) if pos > 0 => file_name.split_at(name_start + pos),
        _ => (file_name, ""),
    }
}

impl CachingStrategy for FilenameWithVersionStrategy {
    fn decorate_url(
        &self,
        file_name: &str,
        resource: &dyn StaticCacheableResource,
        settings: &ResourceSettings,
    ) -> String {
        let Some(version) = self.version(resource, settings) else {
            return file_name.to_owned();
        };

        let (base, extension) = split_extension(file_name);
        format!("{base}{}{version}{extension}", self.version_prefix)
    }

    fn undecorate_url(&self, file_name: &str, extensions: &mut Extensions) -> String {
        let (base, extension) = split_extension(file_name);
        let name_start = base.rfind('/').map_or(0, |pos| pos + 1);
        if let Some(pos) = base[name_start..].rfind(&self.version_prefix) {
            let pos = name_start + pos;
            let version = &base[pos + self.version_prefix.len()..];
            if !version.is_empty() {
                extensions.insert(RequestedVersion(version.to_owned()));
                return format!("{}{extension}", &base[..pos]);
            }
        }
        file_name.to_owned()
    }

    fn decorate_response(
        &self,
        response: &mut ResourceResponse,
        resource: &dyn StaticCacheableResource,
        settings: &ResourceSettings,
        request: &request::Parts,
    ) {
        let Some(RequestedVersion(requested)) = request.extensions.get::<RequestedVersion>()
        else {
            return;
        };

        if self.version(resource, settings).as_ref() == Some(requested) {
            debug!("Current resource version {requested} requested, caching for maximal duration");
            response.set_cache_duration_to_maximum();
            response.set_cache_scope(CacheScope::Public);
        }
    }
}
