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

//! Byte range processing (`Range` HTTP header)

use http::{header, Extensions};
use log::debug;
use resource_utils::session::SessionWrapper;
use std::str::FromStr;

use crate::error::ResourceError;

/// Represents the result of parsing the `Range` HTTP header.
///
/// `end` is `None` for open ranges like `bytes=500-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedRange {
    /// First byte requested
    pub start: u64,
    /// Last byte requested, inclusive
    pub end: Option<u64>,
}

impl RequestedRange {
    /// Parses the value of a `Range` HTTP header. Unsupported units and multiple ranges result in
    /// `None`, numbers that cannot be parsed result in an error.
    ///
    /// Note: Suffix ranges are not supported, `bytes=-500` is read as the first 501 bytes.
    pub fn parse(value: &str) -> Result<Option<Self>, ResourceError> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();

        let Some((units, range)) = compact.split_once('=') else {
            return Ok(None);
        };
        if !units.eq_ignore_ascii_case("bytes") {
            return Ok(None);
        }

        if range.contains(',') {
            debug!("Multiple ranges requested, ignoring Range header {value:?}");
            return Ok(None);
        }

        let malformed = |source| ResourceError::MalformedRange {
            value: value.to_owned(),
            source,
        };

        let mut parts = range.split('-');
        let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed(None));
        };

        let start = if start.is_empty() {
            0
        } else {
            u64::from_str(start).map_err(|err| malformed(Some(err)))?
        };
        let end = if end.is_empty() {
            None
        } else {
            Some(u64::from_str(end).map_err(|err| malformed(Some(err)))?)
        };

        Ok(Some(Self { start, end }))
    }
}

/// The parsed `Range` header, cached in the request extensions
#[derive(Debug, Clone, Copy)]
struct ParsedRange(Option<RequestedRange>);

/// Produces the byte range requested by the `Range` header if any.
///
/// The header is parsed on first call, the result is stored with the request so that subsequent
/// calls during the same request don’t parse it again.
pub fn extract_range<S>(session: &mut S) -> Result<Option<RequestedRange>, ResourceError>
where
    S: SessionWrapper + ?Sized,
{
    if let Some(ParsedRange(range)) = session.extensions().get::<ParsedRange>() {
        return Ok(*range);
    }

    let range = match session.req_header().headers.get(header::RANGE) {
        Some(value) => match value.to_str() {
            Ok(value) => RequestedRange::parse(value)?,
            Err(_) => {
                return Err(ResourceError::MalformedRange {
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    source: None,
                })
            }
        },
        None => None,
    };

    session.extensions_mut().insert(ParsedRange(range));
    Ok(range)
}

/// Returns the requested range if the `Range` header has been processed for this request already.
pub fn requested_range(extensions: &Extensions) -> Option<RequestedRange> {
    extensions
        .get::<ParsedRange>()
        .and_then(|ParsedRange(range)| *range)
}

/// The range actually served, resolved against the content length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte served
    pub start: u64,
    /// Last byte served, inclusive
    pub end: u64,
    /// Total content length
    pub total: u64,
}

impl ContentRange {
    /// Resolves a requested range against the content length. Returns `None` if the range cannot
    /// be satisfied, an end beyond the content is clamped to the last byte.
    pub fn resolve(range: RequestedRange, total: u64) -> Option<Self> {
        if range.start >= total {
            return None;
        }

        let end = range.end.map_or(total - 1, |end| end.min(total - 1));
        if end < range.start {
            return None;
        }

        Some(Self {
            start: range.start,
            end,
            total,
        })
    }

    /// Number of bytes in the range
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Content-Range` header for this range
    pub fn header_value(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}
