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
use std::time::{Duration, SystemTime};

use super::bytes_body;
use crate::error::ResourceError;
use crate::resource::{Attributes, Resource};
use crate::response::{if_modified_since, ContentDisposition, ResourceResponse};

/// A resource serving a fixed byte buffer
///
/// With a file name set the data is offered as download.
#[derive(Debug, Clone)]
pub struct ByteArrayResource {
    content_type: Option<String>,
    data: Bytes,
    file_name: Option<String>,
    text_encoding: Option<String>,
    last_modified: SystemTime,
    cache_duration: Option<Duration>,
}

impl ByteArrayResource {
    /// Creates a resource for the data. Without a content type it is derived from the file name.
    pub fn new(content_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.map(ToOwned::to_owned),
            data: data.into(),
            file_name: None,
            text_encoding: None,
            last_modified: SystemTime::now(),
            cache_duration: None,
        }
    }

    /// Sets the file name the data is downloaded as.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the character set of text data.
    pub fn with_text_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.text_encoding = Some(encoding.into());
        self
    }

    /// Overrides the last modification time, creation time of the resource by default.
    pub fn with_last_modified(mut self, last_modified: SystemTime) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Overrides the default cache duration.
    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }

    /// The data served
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Resource for ByteArrayResource {
    fn new_resource_response(
        &self,
        attributes: &mut Attributes<'_>,
    ) -> Result<ResourceResponse, ResourceError> {
        let mut response = ResourceResponse::new();
        if let Some(content_type) = &self.content_type {
            response.set_content_type(content_type);
        }
        response.set_last_modified(self.last_modified);
        if let Some(duration) = self.cache_duration {
            response.set_cache_duration(duration);
        }

        let settings = attributes.settings();
        if response.needs_data_written(if_modified_since(attributes.request()), settings) {
            if let Some(file_name) = &self.file_name {
                response.set_file_name(file_name);
                response.set_content_disposition(ContentDisposition::Attachment);
            }
            if let Some(encoding) = &self.text_encoding {
                response.set_text_encoding(encoding);
            }
            bytes_body(&mut response, self.data.clone());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::{header, HeaderValue, StatusCode};
    use resource_utils::session::TestSession;
    use test_log::test;

    use crate::configuration::ResourceSettings;

    fn serve(resource: &ByteArrayResource, session: &mut TestSession) {
        let settings = ResourceSettings::default();
        let mut attributes = Attributes::new(session, &settings);
        resource.respond(&mut attributes).unwrap();
    }

    #[test]
    fn download() {
        let resource = ByteArrayResource::new(None, &b"1,2,3\n"[..]).with_file_name("data.csv");
        let mut session = TestSession::get("/");
        serve(&resource, &mut session);

        assert_eq!(session.status(), StatusCode::OK);
        assert_eq!(session.body_str(), "1,2,3\n");
        let headers = session.response_headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
        assert_eq!(headers[header::CONTENT_LENGTH], "6");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"data.csv\""));
    }

    #[test]
    fn range() {
        let resource = ByteArrayResource::new(Some("application/octet-stream"), vec![7u8; 1000]);
        let mut session = TestSession::get("/").with_header(
            header::RANGE,
            HeaderValue::from_static("bytes=200-299"),
        );
        serve(&resource, &mut session);

        assert_eq!(session.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(session.body().len(), 100);
        assert_eq!(
            session.response_headers()[header::CONTENT_RANGE],
            "bytes 200-299/1000"
        );
    }
}
