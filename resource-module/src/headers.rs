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

//! Turns a [`ResourceResponse`] into response status and headers

use http::{header, HeaderName, HeaderValue, StatusCode};
use httpdate::fmt_http_date;
use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use resource_utils::session::SessionWrapper;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ResourceError;
use crate::range::{extract_range, ContentRange};
use crate::resource::Attributes;
use crate::response::{
    if_modified_since, CacheScope, ContentDisposition, ContentRangeType, ResourceResponse,
    MAX_CACHE_DURATION,
};

/// Headers managed by [`ResourceResponse`] settings, these cannot be set as custom headers.
pub const INTERNAL_HEADERS: &[&str] = &[
    "server",
    "date",
    "expires",
    "last-modified",
    "content-type",
    "content-length",
    "content-disposition",
    "transfer-encoding",
    "connection",
    "content-range",
    "accept-range",
    "accept-ranges",
];

// RFC 5987 attr-char
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Refuses header names that are managed through dedicated [`ResourceResponse`] settings.
pub fn check_header_access(name: &str) -> Result<(), ResourceError> {
    let normalized = name.trim().to_ascii_lowercase();
    if INTERNAL_HEADERS.contains(&normalized.as_str()) {
        Err(ResourceError::ReservedHeader(name.to_owned()))
    } else {
        Ok(())
    }
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue, ResourceError> {
    HeaderValue::from_str(value).map_err(|_| ResourceError::InvalidHeaderValue {
        name: name.to_string(),
        value: value.to_owned(),
    })
}

fn date_value(time: SystemTime) -> Result<HeaderValue, ResourceError> {
    header_value(&header::DATE, &fmt_http_date(time))
}

/// Produces the `Content-Disposition` header value, the file name is added both as quoted ASCII
/// approximation and RFC 5987 encoded.
pub fn content_disposition(disposition: ContentDisposition, file_name: Option<&str>) -> String {
    let mut value = disposition.as_str().to_owned();
    if let Some(file_name) = file_name.filter(|file_name| !file_name.is_empty()) {
        let quoted: String = file_name
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                c if c.is_ascii() && !c.is_ascii_control() => c,
                _ => '_',
            })
            .collect();
        value.push_str("; filename=\"");
        value.push_str(&quoted);
        value.push_str("\"; filename*=UTF-8''");
        value.extend(utf8_percent_encode(file_name, FILENAME_ENCODE_SET));
    }
    value
}

/// Allows the client to cache the response for the given duration.
pub fn enable_caching<S>(
    session: &mut S,
    duration: Duration,
    scope: CacheScope,
) -> Result<(), ResourceError>
where
    S: SessionWrapper + ?Sized,
{
    let duration = duration.min(MAX_CACHE_DURATION);
    let now = SystemTime::now();

    session.set_header(header::DATE, date_value(now)?);
    session.set_header(header::EXPIRES, date_value(now + duration)?);
    session.set_header(
        header::CACHE_CONTROL,
        header_value(
            &header::CACHE_CONTROL,
            &format!("{}, max-age={}", scope.as_str(), duration.as_secs()),
        )?,
    );
    session.resp_header_mut().headers.remove(header::PRAGMA);
    Ok(())
}

/// Tells the client and any proxies not to cache the response.
pub fn disable_caching<S>(session: &mut S) -> Result<(), ResourceError>
where
    S: SessionWrapper + ?Sized,
{
    session.set_header(header::DATE, date_value(SystemTime::now())?);
    session.set_header(header::EXPIRES, date_value(UNIX_EPOCH)?);
    session.set_header(header::PRAGMA, HeaderValue::from_static("no-cache"));
    session.set_header(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store"),
    );
    Ok(())
}

/// Writes status and headers for a resource response, then flushes the session.
///
/// Headers are replaced rather than appended, so that applying the same response twice produces
/// the same result. Errors short-circuit after the caching headers, so do responses where the
/// client’s copy is still current (`304 Not Modified`).
pub fn set_response_headers(
    response: &ResourceResponse,
    attributes: &mut Attributes<'_>,
) -> Result<(), ResourceError> {
    let settings = attributes.settings();
    let session = attributes.session_mut();

    if let Some(last_modified) = response.last_modified() {
        session.set_header(header::LAST_MODIFIED, date_value(last_modified)?);
    }

    let duration = response.cache_duration(settings);
    if duration.is_zero() {
        disable_caching(session)?;
    } else {
        enable_caching(session, duration, response.cache_scope())?;
    }

    if let Some((status, message)) = response.error() {
        session.send_error(status, message)?;
        return Ok(());
    }

    if let Some(status) = response.status_code() {
        session.set_status(status);
    }

    if !response.needs_data_written(if_modified_since(session.req_header()), settings) {
        debug!("Resource not modified since the client’s copy, responding with 304");
        session.set_status(StatusCode::NOT_MODIFIED);
        return Ok(());
    }

    session.set_header(
        header::CONTENT_DISPOSITION,
        header_value(
            &header::CONTENT_DISPOSITION,
            &content_disposition(response.content_disposition(), response.file_name()),
        )?,
    );

    if let Some(content_type) = response.content_type(settings) {
        let value = match response.text_encoding() {
            Some(encoding) => format!("{content_type}; charset={encoding}"),
            None => content_type.to_owned(),
        };
        session.set_header(
            header::CONTENT_TYPE,
            header_value(&header::CONTENT_TYPE, &value)?,
        );
    }

    if let Some(accept_range) = response.accept_range() {
        session.set_header(
            header::ACCEPT_RANGES,
            HeaderValue::from_static(accept_range.as_str()),
        );
    }

    let mut content_length = response.content_length();
    if let Some(content_range) = response.content_range() {
        session.set_header(
            header::CONTENT_RANGE,
            header_value(&header::CONTENT_RANGE, content_range)?,
        );
        // The declared range decides the body length, not the full content length
        content_length = None;
    } else if let (Some(total), Some(ContentRangeType::Bytes)) =
        (content_length, response.accept_range())
    {
        if let Some(requested) = extract_range(session)? {
            if let Some(range) = ContentRange::resolve(requested, total) {
                debug!("Serving partial content {}", range.header_value());
                session.set_status(StatusCode::PARTIAL_CONTENT);
                session.set_header(
                    header::CONTENT_RANGE,
                    header_value(&header::CONTENT_RANGE, &range.header_value())?,
                );
                content_length = Some(range.length());
                session.extensions_mut().insert(range);
            } else {
                debug!("Requested range {requested:?} cannot be satisfied for length {total}");
                session.set_status(StatusCode::RANGE_NOT_SATISFIABLE);
                session.set_header(
                    header::CONTENT_RANGE,
                    header_value(&header::CONTENT_RANGE, &format!("bytes */{total}"))?,
                );
                content_length = Some(0);
            }
        }
    }

    if let Some(length) = content_length {
        session.set_header(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    let headers = response.headers();
    for name in headers.keys() {
        check_header_access(name.as_str())?;

        let mut values = headers.get_all(name).iter();
        if let Some(first) = values.next() {
            session.set_header(name.clone(), first.clone());
        }
        for value in values {
            session.add_header(name.clone(), value.clone());
        }
    }

    session.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use resource_utils::session::TestSession;
    use test_log::test;

    use crate::configuration::ResourceSettings;

    fn apply(session: &mut TestSession, response: &ResourceResponse) {
        let settings = ResourceSettings::default();
        let mut attributes = Attributes::new(session, &settings);
        set_response_headers(response, &mut attributes).unwrap();
    }

    #[test]
    fn reserved_headers() {
        assert!(check_header_access("X-Custom").is_ok());
        for name in ["Content-Length", "date", "ACCEPT-RANGE", "Accept-Ranges", "Server"] {
            assert!(matches!(
                check_header_access(name),
                Err(ResourceError::ReservedHeader(_))
            ));
        }
    }

    #[test]
    fn disposition() {
        assert_eq!(content_disposition(ContentDisposition::Inline, None), "inline");
        assert_eq!(
            content_disposition(ContentDisposition::Attachment, Some("report.pdf")),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
        assert_eq!(
            content_disposition(ContentDisposition::Attachment, Some("Übersicht 1.txt")),
            "attachment; filename=\"_bersicht 1.txt\"; filename*=UTF-8''%C3%9Cbersicht%201.txt"
        );
    }

    #[test]
    fn caching_headers() {
        let mut session = TestSession::get("/");
        enable_caching(&mut session, Duration::from_secs(3600), CacheScope::Public).unwrap();
        let headers = session.response_headers();
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
        assert!(headers.contains_key(header::DATE));
        assert!(headers.contains_key(header::EXPIRES));
        assert!(!headers.contains_key(header::PRAGMA));

        disable_caching(&mut session).unwrap();
        let headers = session.response_headers();
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store");
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "Thu, 01 Jan 1970 00:00:00 GMT");

        enable_caching(
            &mut session,
            Duration::from_secs(10 * 365 * 24 * 60 * 60),
            CacheScope::Private,
        )
        .unwrap();
        let headers = session.response_headers();
        assert_eq!(headers[header::CACHE_CONTROL], "private, max-age=31536000");
        assert!(!headers.contains_key(header::PRAGMA));
    }

    #[test]
    fn regular_headers() {
        let mut response = ResourceResponse::new();
        response.set_file_name("notes.txt");
        response.set_text_encoding("UTF-8");
        response.set_content_length(12);
        response.set_accept_range(ContentRangeType::Bytes);
        response.set_last_modified(UNIX_EPOCH + Duration::from_secs(1_431_704_061));
        response.add_header("X-Custom", "a").unwrap();
        response.add_header("X-Custom", "b").unwrap();

        let mut session = TestSession::get("/");
        apply(&mut session, &response);

        assert_eq!(session.status(), StatusCode::OK);
        assert_eq!(session.flush_count(), 1);
        let headers = session.response_headers();
        assert_eq!(headers[header::LAST_MODIFIED], "Fri, 15 May 2015 15:34:21 GMT");
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=UTF-8");
        assert_eq!(headers[header::CONTENT_LENGTH], "12");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "inline; filename=\"notes.txt\"; filename*=UTF-8''notes.txt"
        );
        let values: Vec<_> = headers.get_all("x-custom").iter().collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn idempotent() {
        let mut response = ResourceResponse::new();
        response.set_content_type("text/plain");
        response.set_content_length(1000);
        response.set_accept_range(ContentRangeType::Bytes);
        response.add_header("X-Custom", "a").unwrap();
        response.add_header("X-Custom", "b").unwrap();

        let mut session = TestSession::get("/").with_header(
            header::RANGE,
            HeaderValue::from_static("bytes=200-299"),
        );
        apply(&mut session, &response);
        let first: Vec<_> = session
            .response_headers()
            .iter()
            .filter(|(name, _)| *name != header::DATE && *name != header::EXPIRES)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        apply(&mut session, &response);
        let second: Vec<_> = session
            .response_headers()
            .iter()
            .filter(|(name, _)| *name != header::DATE && *name != header::EXPIRES)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        assert_eq!(first, second);
        assert_eq!(session.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[test]
    fn partial_content() {
        let mut response = ResourceResponse::new();
        response.set_content_length(1000);
        response.set_accept_range(ContentRangeType::Bytes);

        let mut session = TestSession::get("/").with_header(
            header::RANGE,
            HeaderValue::from_static("bytes=200-299"),
        );
        apply(&mut session, &response);
        assert_eq!(session.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            session.response_headers()[header::CONTENT_RANGE],
            "bytes 200-299/1000"
        );
        assert_eq!(session.response_headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(
            session.extensions().get::<ContentRange>(),
            Some(&ContentRange {
                start: 200,
                end: 299,
                total: 1000
            })
        );
    }

    #[test]
    fn range_requires_byte_ranges() {
        let mut response = ResourceResponse::new();
        response.set_content_length(1000);

        let mut session = TestSession::get("/").with_header(
            header::RANGE,
            HeaderValue::from_static("bytes=200-299"),
        );
        apply(&mut session, &response);
        assert_eq!(session.status(), StatusCode::OK);
        assert_eq!(session.response_headers()[header::CONTENT_LENGTH], "1000");
        assert!(!session.response_headers().contains_key(header::CONTENT_RANGE));
    }

    #[test]
    fn unsatisfiable_range() {
        let mut response = ResourceResponse::new();
        response.set_content_length(1000);
        response.set_accept_range(ContentRangeType::Bytes);

        let mut session = TestSession::get("/").with_header(
            header::RANGE,
            HeaderValue::from_static("bytes=1000-"),
        );
        apply(&mut session, &response);
        assert_eq!(session.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(session.response_headers()[header::CONTENT_RANGE], "bytes */1000");
        assert_eq!(session.response_headers()[header::CONTENT_LENGTH], "0");
    }

    #[test]
    fn explicit_content_range() {
        let mut response = ResourceResponse::new();
        response.set_content_length(20);
        response.set_accept_range(ContentRangeType::Bytes);
        response.set_content_range("bytes 0-9/20");
        response.set_status_code(StatusCode::PARTIAL_CONTENT);

        let mut session = TestSession::get("/").with_header(
            header::RANGE,
            HeaderValue::from_static("bytes=5-9"),
        );
        apply(&mut session, &response);
        assert_eq!(session.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(session.response_headers()[header::CONTENT_RANGE], "bytes 0-9/20");
        assert!(session.response_headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn not_modified() {
        let mut response = ResourceResponse::new();
        response.set_content_length(12);
        response.set_content_type("text/plain");
        response.set_last_modified(UNIX_EPOCH + Duration::from_secs(1_431_704_061));

        let mut session = TestSession::get("/").with_header(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Fri, 15 May 2015 15:34:21 GMT"),
        );
        apply(&mut session, &response);
        assert_eq!(session.status(), StatusCode::NOT_MODIFIED);
        let headers = session.response_headers();
        assert!(headers.contains_key(header::LAST_MODIFIED));
        assert!(headers.contains_key(header::CACHE_CONTROL));
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
        assert!(!headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn error() {
        let mut response = ResourceResponse::new();
        response.set_error(StatusCode::NOT_FOUND, Some("Unable to find resource"));
        response.set_content_type("text/css");
        response.disable_caching();

        let mut session = TestSession::get("/");
        apply(&mut session, &response);
        assert_eq!(session.status(), StatusCode::NOT_FOUND);
        assert_eq!(session.error_message(), Some("Unable to find resource"));
        let headers = session.response_headers();
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store");
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    }
}
