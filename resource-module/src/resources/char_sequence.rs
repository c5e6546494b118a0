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
use log::warn;
use std::time::{Duration, SystemTime};

use super::bytes_body;
use crate::error::ResourceError;
use crate::resource::{Attributes, Resource};
use crate::response::{if_modified_since, ContentDisposition, ResourceResponse};

const DEFAULT_CHARSET: &str = "UTF-8";

/// Encodes text with the given character set, `None` for unsupported character sets.
///
/// Characters that cannot be represented are replaced by `?`.
fn encode(text: &str, charset: &str) -> Option<Bytes> {
    let limit = match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => return Some(Bytes::copy_from_slice(text.as_bytes())),
        "iso-8859-1" | "latin1" | "latin-1" => 0xff,
        "us-ascii" | "ascii" => 0x7f,
        _ => return None,
    };

    Some(
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).ok().filter(|b| *b <= limit).unwrap_or(b'?'))
            .collect::<Vec<_>>()
            .into(),
    )
}

/// A resource serving a text
#[derive(Debug, Clone)]
pub struct CharSequenceResource {
    content_type: String,
    text: String,
    file_name: Option<String>,
    charset: String,
    last_modified: SystemTime,
    cache_duration: Option<Duration>,
}

impl CharSequenceResource {
    /// Creates a resource for the text, `text/plain` unless a content type is given.
    pub fn new(content_type: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            content_type: content_type.unwrap_or("text/plain").to_owned(),
            text: text.into(),
            file_name: None,
            charset: DEFAULT_CHARSET.to_owned(),
            last_modified: SystemTime::now(),
            cache_duration: None,
        }
    }

    /// Sets the file name the text is downloaded as.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the character set used to encode the text. Supported are UTF-8, ISO-8859-1 and
    /// US-ASCII.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
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

    /// The text served
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Resource for CharSequenceResource {
    fn new_resource_response(
        &self,
        attributes: &mut Attributes<'_>,
    ) -> Result<ResourceResponse, ResourceError> {
        let mut response = ResourceResponse::new();
        response.set_content_type(&self.content_type);
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

            let data = match encode(&self.text, &self.charset) {
                Some(data) => {
                    response.set_text_encoding(&self.charset);
                    data
                }
                None => {
                    warn!(
                        "Unsupported character set {}, encoding text as {DEFAULT_CHARSET}",
                        self.charset
                    );
                    response.set_text_encoding(DEFAULT_CHARSET);
                    Bytes::copy_from_slice(self.text.as_bytes())
                }
            };
            bytes_body(&mut response, data);
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::{header, StatusCode};
    use resource_utils::session::TestSession;
    use test_log::test;

    use crate::configuration::ResourceSettings;

    fn serve(resource: &CharSequenceResource) -> TestSession {
        let settings = ResourceSettings::default();
        let mut session = TestSession::get("/");
        let mut attributes = Attributes::new(&mut session, &settings);
        resource.respond(&mut attributes).unwrap();
        session
    }

    #[test]
    fn utf8() {
        let session = serve(&CharSequenceResource::new(None, "Grüße"));
        assert_eq!(session.status(), StatusCode::OK);
        assert_eq!(session.body_str(), "Grüße");
        let headers = session.response_headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=UTF-8");
        assert_eq!(headers[header::CONTENT_LENGTH], "7");
    }

    #[test]
    fn latin1() {
        let session = serve(
            &CharSequenceResource::new(Some("text/csv"), "Grüße €").with_charset("ISO-8859-1"),
        );
        assert_eq!(session.body(), b"Gr\xfc\xdfe ?");
        assert_eq!(
            session.response_headers()[header::CONTENT_TYPE],
            "text/csv; charset=ISO-8859-1"
        );
    }

    #[test]
    fn unsupported_charset() {
        let session = serve(&CharSequenceResource::new(None, "abc").with_charset("EBCDIC"));
        assert_eq!(session.body_str(), "abc");
        assert_eq!(
            session.response_headers()[header::CONTENT_TYPE],
            "text/plain; charset=UTF-8"
        );
    }
}
