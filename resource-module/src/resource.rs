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

//! The resource abstraction and the request processing shared by all resources

use http::{request, StatusCode};
use log::debug;
use resource_utils::session::SessionWrapper;
use std::fmt::{Debug, Formatter};
use std::time::SystemTime;

use crate::configuration::ResourceSettings;
use crate::error::ResourceError;
use crate::headers::set_response_headers;
use crate::range::extract_range;
use crate::response::{if_modified_since, ResourceResponse};

/// Everything a resource gets to see while responding to a request
pub struct Attributes<'a> {
    session: &'a mut dyn SessionWrapper,
    settings: &'a ResourceSettings,
}

impl<'a> Attributes<'a> {
    /// Creates the attributes for a request.
    pub fn new(session: &'a mut dyn SessionWrapper, settings: &'a ResourceSettings) -> Self {
        Self { session, settings }
    }

    /// The session the response is written to
    pub fn session(&self) -> &(dyn SessionWrapper + 'a) {
        &*self.session
    }

    /// The session the response is written to
    pub fn session_mut(&mut self) -> &mut (dyn SessionWrapper + 'a) {
        &mut *self.session
    }

    /// The request header
    pub fn request(&self) -> &request::Parts {
        self.session.req_header()
    }

    /// Application-wide resource settings
    pub fn settings(&self) -> &'a ResourceSettings {
        self.settings
    }
}

impl Debug for Attributes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attributes")
            .field("request", self.request())
            .field("settings", self.settings)
            .finish()
    }
}

/// Produces the response body once the headers have been written
pub trait WriteCallback: Send {
    /// Writes the data to the response. Called at most once.
    fn write_data(self: Box<Self>, attributes: &mut Attributes<'_>) -> Result<(), ResourceError>;
}

pub(crate) struct FnWriteCallback<F>(pub(crate) F);

impl<F> WriteCallback for FnWriteCallback<F>
where
    F: FnOnce(&mut Attributes<'_>) -> Result<(), ResourceError> + Send,
{
    fn write_data(self: Box<Self>, attributes: &mut Attributes<'_>) -> Result<(), ResourceError> {
        (self.0)(attributes)
    }
}

/// A resource that can be cached long-term, e.g. with a versioned URL
pub trait StaticCacheableResource {
    /// Whether caching is enabled for this resource.
    fn caching_enabled(&self) -> bool {
        true
    }

    /// Last modification time of the data, used to derive a version.
    fn last_modified(&self, settings: &ResourceSettings) -> Option<SystemTime>;
}

/// Something that can respond to a request
pub trait Resource: Debug + Send + Sync {
    /// Describes the response for the current request. Called once per request, the description
    /// is discarded afterwards.
    fn new_resource_response(
        &self,
        attributes: &mut Attributes<'_>,
    ) -> Result<ResourceResponse, ResourceError>;

    /// Returns the resource’s caching capabilities if it supports long-term caching.
    fn as_cacheable(&self) -> Option<&dyn StaticCacheableResource> {
        None
    }

    /// Responds to the request, see [`respond`].
    fn respond(&self, attributes: &mut Attributes<'_>) -> Result<(), ResourceError> {
        respond(self, attributes)
    }
}

fn needs_body(
    response: &ResourceResponse,
    if_modified_since: Option<SystemTime>,
    settings: &ResourceSettings,
) -> bool {
    if !response.needs_data_written(if_modified_since, settings) || response.error().is_some() {
        return false;
    }

    match response.status_code() {
        None => true,
        Some(status) => {
            status.as_u16() < 300
                && status != StatusCode::NO_CONTENT
                && status != StatusCode::RESET_CONTENT
        }
    }
}

/// Responds to a request with the given resource.
///
/// The `Range` header is processed first, then the resource describes its response. Cacheable
/// resources are decorated by the configured caching strategy before status and headers are
/// written. The write callback produces the body, unless the response is an error, not modified,
/// or has a status without body.
pub fn respond<R>(resource: &R, attributes: &mut Attributes<'_>) -> Result<(), ResourceError>
where
    R: Resource + ?Sized,
{
    extract_range(attributes.session_mut())?;

    let mut response = resource.new_resource_response(attributes)?;

    let settings = attributes.settings();
    if let Some(cacheable) = resource.as_cacheable() {
        if cacheable.caching_enabled() {
            settings.caching_strategy().decorate_response(
                &mut response,
                cacheable,
                settings,
                attributes.request(),
            );
        }
    }

    set_response_headers(&response, attributes)?;

    let if_modified_since = if_modified_since(attributes.request());
    if !needs_body(&response, if_modified_since, settings)
        || attributes.session().resp_header().status == StatusCode::RANGE_NOT_SATISFIABLE
    {
        debug!("No response body required");
        return Ok(());
    }

    let callback = response
        .take_write_callback()
        .ok_or(ResourceError::MissingWriteCallback)?;
    callback.write_data(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::header;
    use http::HeaderValue;
    use resource_utils::session::TestSession;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use test_log::test;

    #[derive(Debug, Default)]
    struct Counting {
        status: Option<StatusCode>,
        with_callback: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Resource for Counting {
        fn new_resource_response(
            &self,
            _attributes: &mut Attributes<'_>,
        ) -> Result<ResourceResponse, ResourceError> {
            let mut response = ResourceResponse::new();
            response.set_content_type("text/plain");
            response.set_content_length(5);
            if let Some(status) = self.status {
                response.set_status_code(status);
            }
            if self.with_callback {
                let calls = self.calls.clone();
                response.set_write_callback_fn(move |attributes| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    attributes.session_mut().write_response_body(b"hello")?;
                    Ok(())
                });
            }
            Ok(response)
        }
    }

    fn run(resource: &Counting, session: &mut TestSession) -> Result<(), ResourceError> {
        let settings = ResourceSettings::default();
        let mut attributes = Attributes::new(session, &settings);
        resource.respond(&mut attributes)
    }

    #[test]
    fn body_written() {
        let resource = Counting {
            with_callback: true,
            ..Default::default()
        };
        let mut session = TestSession::get("/");
        run(&resource, &mut session).unwrap();
        assert_eq!(session.status(), StatusCode::OK);
        assert_eq!(session.body_str(), "hello");
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_callback() {
        let resource = Counting::default();
        let mut session = TestSession::get("/");
        assert!(matches!(
            run(&resource, &mut session),
            Err(ResourceError::MissingWriteCallback)
        ));
    }

    #[test]
    fn statuses_without_body() {
        for status in [
            StatusCode::NO_CONTENT,
            StatusCode::RESET_CONTENT,
            StatusCode::MOVED_PERMANENTLY,
        ] {
            let resource = Counting {
                status: Some(status),
                with_callback: true,
                ..Default::default()
            };
            let mut session = TestSession::get("/");
            run(&resource, &mut session).unwrap();
            assert_eq!(session.status(), status);
            assert!(session.body().is_empty());
            assert_eq!(resource.calls.load(Ordering::SeqCst), 0);
        }

        // No callback is fine if no body is needed
        let resource = Counting {
            status: Some(StatusCode::NO_CONTENT),
            ..Default::default()
        };
        let mut session = TestSession::get("/");
        run(&resource, &mut session).unwrap();
    }

    #[test]
    fn malformed_range() {
        let resource = Counting {
            with_callback: true,
            ..Default::default()
        };
        let mut session = TestSession::get("/")
            .with_header(header::RANGE, HeaderValue::from_static("bytes=x-1"));
        assert!(matches!(
            run(&resource, &mut session),
            Err(ResourceError::MalformedRange { .. })
        ));
        assert_eq!(resource.calls.load(Ordering::SeqCst), 0);
    }
}
