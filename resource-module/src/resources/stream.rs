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
use std::io::ErrorKind;
use std::time::Duration;

use crate::error::ResourceError;
use crate::locator::ResourceStream;
use crate::part_writer::PartWriterCallback;
use crate::resource::{Attributes, Resource};
use crate::response::{if_modified_since, ContentDisposition, ContentRangeType, ResourceResponse};

/// A resource serving a located resource stream
#[derive(Debug, Clone)]
pub struct ResourceStreamResource {
    stream: ResourceStream,
    file_name: Option<String>,
    content_disposition: ContentDisposition,
    text_encoding: Option<String>,
    cache_duration: Option<Duration>,
}

impl ResourceStreamResource {
    /// Creates a resource for the stream.
    pub fn new(stream: ResourceStream) -> Self {
        Self {
            stream,
            file_name: None,
            content_disposition: ContentDisposition::Inline,
            text_encoding: None,
            cache_duration: None,
        }
    }

    /// Sets the file name presented to the client, the name of the file by default.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the content disposition.
    pub fn with_content_disposition(mut self, disposition: ContentDisposition) -> Self {
        self.content_disposition = disposition;
        self
    }

    /// Sets the character set of text data.
    pub fn with_text_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.text_encoding = Some(encoding.into());
        self
    }

    /// Overrides the default cache duration.
    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }
}

impl Resource for ResourceStreamResource {
    fn new_resource_response(
        &self,
        attributes: &mut Attributes<'_>,
    ) -> Result<ResourceResponse, ResourceError> {
        let mut response = ResourceResponse::new();
        if let Some(last_modified) = self.stream.last_modified() {
            response.set_last_modified(last_modified);
        }
        if let Some(duration) = self.cache_duration {
            response.set_cache_duration(duration);
        }

        let settings = attributes.settings();
        if !response.needs_data_written(if_modified_since(attributes.request()), settings) {
            return Ok(response);
        }

        let file = match self.stream.open() {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("Resource stream {:?} is gone", self.stream.path());
                response.set_error(StatusCode::NOT_FOUND, Some("Unable to find resource"));
                return Ok(response);
            }
            Err(err) => {
                warn!("Failed opening resource stream {:?}: {err}", self.stream.path());
                response.set_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some("Unable to open resource stream"),
                );
                return Ok(response);
            }
        };

        let file_name = self.file_name.clone().or_else(|| {
            self.stream
                .path()
                .file_name()
                .and_then(|name| name.to_str())
                .map(ToOwned::to_owned)
        });
        if let Some(file_name) = file_name {
            response.set_file_name(file_name);
        }
        response.set_content_disposition(self.content_disposition);
        if let Some(content_type) = self.stream.content_type() {
            response.set_content_type(content_type);
        }
        if let Some(encoding) = &self.text_encoding {
            response.set_text_encoding(encoding);
        }

        let length = self.stream.length();
        response.set_content_length(length);
        response.set_accept_range(ContentRangeType::Bytes);
        response.set_write_callback(PartWriterCallback::new(file, Some(length)));

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::{header, HeaderValue};
    use httpdate::fmt_http_date;
    use resource_utils::session::TestSession;
    use std::path::PathBuf;
    use test_log::test;

    use crate::configuration::ResourceSettings;

    fn stream() -> ResourceStream {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("testdata");
        path.push("root");
        path.push("app");
        path.push("components");
        path.push("text.txt");
        ResourceStream::from_path(path).unwrap()
    }

    fn serve(resource: &ResourceStreamResource, session: &mut TestSession) {
        let settings = ResourceSettings::default();
        let mut attributes = Attributes::new(session, &settings);
        resource.respond(&mut attributes).unwrap();
    }

    #[test]
    fn full_content() {
        let resource = ResourceStreamResource::new(stream()).with_text_encoding("UTF-8");
        let mut session = TestSession::get("/");
        serve(&resource, &mut session);

        assert_eq!(session.status(), StatusCode::OK);
        assert_eq!(session.body_str(), "Hello world!");
        let headers = session.response_headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=UTF-8");
        assert_eq!(headers[header::CONTENT_LENGTH], "12");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("inline; filename=\"text.txt\""));
    }

    #[test]
    fn not_modified() {
        let modified = stream().last_modified().unwrap();
        let resource = ResourceStreamResource::new(stream());
        let mut session = TestSession::get("/").with_header(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_str(&fmt_http_date(modified)).unwrap(),
        );
        serve(&resource, &mut session);

        assert_eq!(session.status(), StatusCode::NOT_MODIFIED);
        assert!(session.body().is_empty());
        assert!(!session
            .response_headers()
            .contains_key(header::CONTENT_LENGTH));
    }

    #[test]
    fn no_caching() {
        let modified = stream().last_modified().unwrap();
        let resource = ResourceStreamResource::new(stream()).with_cache_duration(Duration::ZERO);
        let mut session = TestSession::get("/").with_header(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_str(&fmt_http_date(modified)).unwrap(),
        );
        serve(&resource, &mut session);

        assert_eq!(session.status(), StatusCode::OK);
        assert_eq!(session.body_str(), "Hello world!");
        assert_eq!(
            session.response_headers()[header::CACHE_CONTROL],
            "no-cache, no-store"
        );
    }

    #[test]
    fn partial() {
        let resource = ResourceStreamResource::new(stream());
        let mut session = TestSession::get("/")
            .with_header(header::RANGE, HeaderValue::from_static("bytes=6-"));
        serve(&resource, &mut session);

        assert_eq!(session.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(session.body_str(), "world!");
        assert_eq!(
            session.response_headers()[header::CONTENT_RANGE],
            "bytes 6-11/12"
        );
    }
}
