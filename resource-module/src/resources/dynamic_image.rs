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

use bytes::Bytes;
use http::StatusCode;
use log::warn;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::bytes_body;
use crate::error::ResourceError;
use crate::resource::{Attributes, Resource};
use crate::response::{if_modified_since, ResourceResponse};

type ImageGenerator = dyn Fn(&Attributes<'_>) -> Option<Vec<u8>> + Send + Sync;

/// A resource serving image data generated per request
pub struct DynamicImageResource {
    format: String,
    last_modified: Option<SystemTime>,
    cache_duration: Option<Duration>,
    generator: Arc<ImageGenerator>,
}

impl DynamicImageResource {
    /// Creates a resource for images in the given format (e.g. `png`), produced by `generator`.
    /// The generator returning `None` results in a `404 Not Found` response.
    pub fn new<F>(format: &str, generator: F) -> Self
    where
        F: Fn(&Attributes<'_>) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            format: format.to_ascii_lowercase(),
            last_modified: None,
            cache_duration: None,
            generator: Arc::new(generator),
        }
    }

    /// Sets the last modification time, allowing clients to reuse cached images.
    pub fn with_last_modified(mut self, last_modified: SystemTime) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Overrides the default cache duration.
    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }

    /// Image format
    pub fn format(&self) -> &str {
        &self.format
    }
}

impl Debug for DynamicImageResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicImageResource")
            .field("format", &self.format)
            .field("last_modified", &self.last_modified)
            .field("cache_duration", &self.cache_duration)
            .finish()
    }
}

impl Resource for DynamicImageResource {
    fn new_resource_response(
        &self,
        attributes: &mut Attributes<'_>,
    ) -> Result<ResourceResponse, ResourceError> {
        let mut response = ResourceResponse::new();
        response.set_content_type(format!("image/{}", self.format));
        if let Some(last_modified) = self.last_modified {
            response.set_last_modified(last_modified);
        }
        if let Some(duration) = self.cache_duration {
            response.set_cache_duration(duration);
        }

        let settings = attributes.settings();
        if response.needs_data_written(if_modified_since(attributes.request()), settings) {
            match (self.generator)(attributes) {
                Some(data) => bytes_body(&mut response, Bytes::from(data)),
                None => {
                    warn!("Image generator produced no {} data", self.format);
                    response.set_error(StatusCode::NOT_FOUND, Some("Unable to generate image"));
                }
            }
        }

        Ok(response)
    }
}
