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

use http::StatusCode;
use log::warn;
use std::time::{Duration, SystemTime};

use crate::configuration::ResourceSettings;
use crate::error::ResourceError;
use crate::locator::ResourceStream;
use crate::part_writer::PartWriterCallback;
use crate::reference::Key;
use crate::resource::{Attributes, Resource, StaticCacheableResource};
use crate::response::{if_modified_since, ContentRangeType, ResourceResponse};

/// A resource located by scope, name and variant attributes
///
/// The [`PackageResourceGuard`](crate::guard::PackageResourceGuard) is consulted before any
/// lookup, refused paths result in [`ResourceError::Blocked`].
#[derive(Debug, Clone)]
pub struct PackageResource {
    key: Key,
    text_encoding: Option<String>,
    caching_enabled: bool,
    cache_duration: Option<Duration>,
}

impl PackageResource {
    /// Creates a resource for the key.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            text_encoding: None,
            caching_enabled: true,
            cache_duration: None,
        }
    }

    /// Sets the character set of text data.
    pub fn with_text_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.text_encoding = Some(encoding.into());
        self
    }

    /// Enables or disables caching strategy support for this resource.
    pub fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Overrides the default cache duration.
    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }

    /// The key identifying this resource
    pub fn key(&self) -> &Key {
        &self.key
    }

    fn check_access(settings: &ResourceSettings, key: &Key) -> Result<(), ResourceError> {
        if settings.guard().accept(key.scope(), key.name()) {
            Ok(())
        } else {
            Err(ResourceError::Blocked(format!(
                "{}/{}",
                key.scope(),
                key.name()
            )))
        }
    }

    fn locate(settings: &ResourceSettings, key: &Key) -> Option<ResourceStream> {
        settings.locator().locate(
            key.scope(),
            key.name(),
            key.style(),
            key.variation(),
            key.locale(),
            false,
        )
    }

    /// Locates the resource data, the most specific variant available wins.
    pub fn resource_stream(
        &self,
        settings: &ResourceSettings,
    ) -> Result<Option<ResourceStream>, ResourceError> {
        Self::check_access(settings, &self.key)?;
        Ok(Self::locate(settings, &self.key))
    }

    /// Checks whether a resource exists for the key and may be served.
    pub fn exists(settings: &ResourceSettings, key: &Key) -> bool {
        Self::check_access(settings, key).is_ok() && Self::locate(settings, key).is_some()
    }
}

impl Resource for PackageResource {
    fn new_resource_response(
        &self,
        attributes: &mut Attributes<'_>,
    ) -> Result<ResourceResponse, ResourceError> {
        let settings = attributes.settings();
        let mut response = ResourceResponse::new();

        let Some(stream) = self.resource_stream(settings)? else {
            warn!("Unable to find package resource {}", self.key);
            response.set_error(StatusCode::NOT_FOUND, Some("Unable to find resource"));
            return Ok(response);
        };

        match stream.content_type() {
            Some(content_type) => response.set_content_type(content_type),
            None => {
                if let Some(content_type) = settings.mime_type(self.key.name()) {
                    response.set_content_type(content_type);
                }
            }
        }
        if let Some(encoding) = &self.text_encoding {
            response.set_text_encoding(encoding);
        }
        if let Some(last_modified) = stream.last_modified() {
            response.set_last_modified(last_modified);
        }
        if let Some(duration) = self.cache_duration {
            response.set_cache_duration(duration);
        }

        if response.needs_data_written(if_modified_since(attributes.request()), settings) {
            let file = match stream.open() {
                Ok(file) => file,
                Err(err) => {
                    warn!("Failed opening package resource {}: {err}", self.key);
                    response.set_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Some("Unable to open resource stream"),
                    );
                    return Ok(response);
                }
            };

            let length = stream.length();
            response.set_content_length(length);
            response.set_accept_range(ContentRangeType::Bytes);
            response.set_write_callback(PartWriterCallback::new(file, Some(length)));
        }

        Ok(response)
    }

    fn as_cacheable(&self) -> Option<&dyn StaticCacheableResource> {
        Some(self)
    }
}

impl StaticCacheableResource for PackageResource {
    fn caching_enabled(&self) -> bool {
        self.caching_enabled
    }

    fn last_modified(&self, settings: &ResourceSettings) -> Option<SystemTime> {
        self.resource_stream(settings).ok()??.last_modified()
    }
}
