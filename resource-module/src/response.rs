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

//! The response description produced by resources

use http::{header, request, HeaderMap, HeaderName, HeaderValue, StatusCode};
use httpdate::parse_http_date;
use once_cell::unsync::OnceCell;
use std::fmt::{Debug, Formatter};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::configuration::ResourceSettings;
use crate::error::ResourceError;
use crate::headers::check_header_access;
use crate::resource::{Attributes, FnWriteCallback, WriteCallback};

/// Maximal cache duration, one year as allowed by RFC 2616
pub const MAX_CACHE_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How the client should present the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentDisposition {
    /// Display the content in the browser
    #[default]
    Inline,
    /// Offer the content as download
    Attachment,
}

impl ContentDisposition {
    /// Disposition type as used in the `Content-Disposition` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// Range units announced in the `Accept-Ranges` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRangeType {
    /// Byte ranges are supported
    Bytes,
    /// Range requests are not supported
    None,
}

impl ContentRangeType {
    /// Value of the `Accept-Ranges` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::None => "none",
        }
    }
}

/// Who may cache the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheScope {
    /// Only the client itself
    #[default]
    Private,
    /// The client and any proxies
    Public,
}

impl CacheScope {
    /// `Cache-Control` directive for this scope
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

/// Reads the `If-Modified-Since` request header, invalid dates are ignored.
pub fn if_modified_since(request: &request::Parts) -> Option<SystemTime> {
    request
        .headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_http_date(value).ok())
}

fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => UNIX_EPOCH + Duration::from_secs(duration.as_secs()),
        Err(_) => time,
    }
}

/// Describes the response a resource wants to produce
///
/// Resources fill it in, the header writer turns it into response headers and the write callback
/// produces the body. An error status suppresses the body altogether.
#[derive(Default)]
pub struct ResourceResponse {
    error: Option<(StatusCode, Option<String>)>,
    status_code: Option<StatusCode>,
    file_name: Option<String>,
    content_disposition: ContentDisposition,
    content_type: Option<String>,
    derived_content_type: OnceCell<Option<String>>,
    content_range: Option<String>,
    accept_range: Option<ContentRangeType>,
    text_encoding: Option<String>,
    content_length: Option<u64>,
    last_modified: Option<SystemTime>,
    cache_duration: Option<Duration>,
    cache_scope: CacheScope,
    write_callback: Option<Box<dyn WriteCallback>>,
    headers: HeaderMap,
}

impl ResourceResponse {
    /// Creates an empty response description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Error status and message if any
    pub fn error(&self) -> Option<(StatusCode, Option<&str>)> {
        self.error
            .as_ref()
            .map(|(status, message)| (*status, message.as_deref()))
    }

    /// Marks the response as failed. The message is only logged, never sent to the client.
    pub fn set_error(&mut self, status: StatusCode, message: Option<&str>) {
        self.error = Some((status, message.map(ToOwned::to_owned)));
    }

    /// Explicit response status if any
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status_code
    }

    /// Sets an explicit response status.
    pub fn set_status_code(&mut self, status: StatusCode) {
        self.status_code = Some(status);
    }

    /// File name presented to the client
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Sets the file name presented to the client, also used to derive the content type.
    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = Some(file_name.into());
        self.derived_content_type = OnceCell::new();
    }

    /// Content disposition
    pub fn content_disposition(&self) -> ContentDisposition {
        self.content_disposition
    }

    /// Sets the content disposition.
    pub fn set_content_disposition(&mut self, disposition: ContentDisposition) {
        self.content_disposition = disposition;
    }

    /// Returns the content type. Without an explicit value it is derived from the file name, the
    /// lookup happens once.
    pub fn content_type(&self, settings: &ResourceSettings) -> Option<&str> {
        if let Some(content_type) = &self.content_type {
            return Some(content_type);
        }

        self.derived_content_type
            .get_or_init(|| {
                self.file_name
                    .as_deref()
                    .and_then(|file_name| settings.mime_type(file_name))
            })
            .as_deref()
    }

    /// Sets an explicit content type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    /// Explicit `Content-Range` header value if any
    pub fn content_range(&self) -> Option<&str> {
        self.content_range.as_deref()
    }

    /// Sets the `Content-Range` header value, this disables automatic range processing.
    pub fn set_content_range(&mut self, content_range: impl Into<String>) {
        self.content_range = Some(content_range.into());
    }

    /// Supported range units if announced
    pub fn accept_range(&self) -> Option<ContentRangeType> {
        self.accept_range
    }

    /// Announces supported range units.
    pub fn set_accept_range(&mut self, accept_range: ContentRangeType) {
        self.accept_range = Some(accept_range);
    }

    /// Character set of text content
    pub fn text_encoding(&self) -> Option<&str> {
        self.text_encoding.as_deref()
    }

    /// Sets the character set of text content.
    pub fn set_text_encoding(&mut self, encoding: impl Into<String>) {
        self.text_encoding = Some(encoding.into());
    }

    /// Content length if known
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Sets the content length.
    pub fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    /// Last modification time if known
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Sets the last modification time.
    pub fn set_last_modified(&mut self, last_modified: SystemTime) {
        self.last_modified = Some(last_modified);
    }

    /// Returns the cache duration, falling back to the default from the settings.
    pub fn cache_duration(&self, settings: &ResourceSettings) -> Duration {
        self.cache_duration
            .unwrap_or_else(|| settings.default_cache_duration())
    }

    /// Sets the cache duration, capped at [`MAX_CACHE_DURATION`].
    pub fn set_cache_duration(&mut self, duration: Duration) {
        self.cache_duration = Some(duration.min(MAX_CACHE_DURATION));
    }

    /// Allows caching for as long as possible.
    pub fn set_cache_duration_to_maximum(&mut self) {
        self.cache_duration = Some(MAX_CACHE_DURATION);
    }

    /// Disallows caching.
    pub fn disable_caching(&mut self) {
        self.cache_duration = Some(Duration::ZERO);
    }

    /// Cache scope
    pub fn cache_scope(&self) -> CacheScope {
        self.cache_scope
    }

    /// Sets the cache scope.
    pub fn set_cache_scope(&mut self, scope: CacheScope) {
        self.cache_scope = scope;
    }

    /// Checks whether a write callback is present.
    pub fn has_write_callback(&self) -> bool {
        self.write_callback.is_some()
    }

    /// Sets the callback producing the response body.
    pub fn set_write_callback(&mut self, callback: impl WriteCallback + 'static) {
        self.write_callback = Some(Box::new(callback));
    }

    /// Sets a closure producing the response body.
    pub fn set_write_callback_fn<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Attributes<'_>) -> Result<(), ResourceError> + Send + 'static,
    {
        self.set_write_callback(FnWriteCallback(callback));
    }

    pub(crate) fn take_write_callback(&mut self) -> Option<Box<dyn WriteCallback>> {
        self.write_callback.take()
    }

    /// Custom response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Adds a custom response header. Headers managed through dedicated settings are refused.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), ResourceError> {
        check_header_access(name)?;

        let invalid = || ResourceError::InvalidHeaderValue {
            name: name.to_owned(),
            value: value.to_owned(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Decides whether the response body has to be produced or the client’s copy is still
    /// current.
    ///
    /// Data needs to be written unless caching is enabled and the last modification time is not
    /// after `If-Modified-Since`. HTTP dates have a resolution of seconds, so the last modification
    /// time is truncated to seconds before comparing.
    pub fn needs_data_written(
        &self,
        if_modified_since: Option<SystemTime>,
        settings: &ResourceSettings,
    ) -> bool {
        if self.cache_duration(settings).is_zero() {
            return true;
        }

        match (if_modified_since, self.last_modified) {
            (Some(if_modified_since), Some(last_modified)) => {
                if_modified_since < truncate_to_seconds(last_modified)
            }
            _ => true,
        }
    }
}

impl Debug for ResourceResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResponse")
            .field("error", &self.error)
            .field("status_code", &self.status_code)
            .field("file_name", &self.file_name)
            .field("content_disposition", &self.content_disposition)
            .field("content_type", &self.content_type)
            .field("content_range", &self.content_range)
            .field("accept_range", &self.accept_range)
            .field("text_encoding", &self.text_encoding)
            .field("content_length", &self.content_length)
            .field("last_modified", &self.last_modified)
            .field("cache_duration", &self.cache_duration)
            .field("cache_scope", &self.cache_scope)
            .field("write_callback", &self.write_callback.is_some())
            .field("headers", &self.headers)
            .finish()
    }
}
