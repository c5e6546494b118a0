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

//! Writing resource data to the session, optionally limited to a byte range.

use bytes::BytesMut;
use log::{debug, error};
use resource_utils::session::{is_client_disconnect, BodyWriter, SessionWrapper};
use std::cmp::min;
use std::fmt::{Debug, Formatter};
use std::io::{copy, sink, Error, ErrorKind, Read};

use crate::error::ResourceError;
use crate::range::ContentRange;
use crate::resource::{Attributes, WriteCallback};

/// Buffer size used unless configured otherwise
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Write callback copying a stream to the response
///
/// Without explicit bounds the range resolved while writing the response headers is used, if
/// there is none the entire stream is copied.
pub struct PartWriterCallback<R> {
    stream: R,
    content_length: Option<u64>,
    start: Option<u64>,
    end: Option<u64>,
    buffer_size: Option<usize>,
}

impl<R: Read + Send> PartWriterCallback<R> {
    /// Creates a callback for a stream of the given length if known.
    pub fn new(stream: R, content_length: Option<u64>) -> Self {
        Self {
            stream,
            content_length,
            start: None,
            end: None,
            buffer_size: None,
        }
    }

    /// Limits the data written to a range, `end` being the inclusive last byte.
    pub fn with_range(mut self, start: Option<u64>, end: Option<u64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Overrides the buffer size from the settings.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    fn write_range<S>(
        &mut self,
        session: &mut S,
        start: u64,
        end: Option<u64>,
        buffer_size: usize,
    ) -> Result<(), Error>
    where
        S: SessionWrapper + ?Sized,
    {
        if start > 0 {
            let skipped = copy(&mut (&mut self.stream).take(start), &mut sink())?;
            if skipped < start {
                error!("stream ended after {skipped} bytes, cannot skip to byte {start}");
                return Ok(());
            }
        }

        let end = end.or_else(|| self.content_length.map(|length| length.saturating_sub(1)));
        let mut remaining = end.map(|end| end.saturating_add(1).saturating_sub(start));
        let mut buf = BytesMut::zeroed(buffer_size);
        loop {
            let chunk = match remaining {
                Some(0) => break,
                Some(remaining) => min(remaining, buf.len() as u64) as usize,
                None => buf.len(),
            };

            let len = match self.stream.read(&mut buf[..chunk]) {
                Ok(len) => len,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };

            if len == 0 {
                if let Some(remaining) = remaining {
                    error!("stream ended with {remaining} bytes left to be written");
                }
                break;
            }

            session.write_response_body(&buf[..len])?;
            if let Some(remaining) = remaining.as_mut() {
                *remaining -= len as u64;
            }
        }

        Ok(())
    }
}

impl<R: Read + Send> WriteCallback for PartWriterCallback<R> {
    fn write_data(
        mut self: Box<Self>,
        attributes: &mut Attributes<'_>,
    ) -> Result<(), ResourceError> {
        let buffer_size = self
            .buffer_size
            .unwrap_or_else(|| attributes.settings().buffer_size());

        let (start, end) = if self.start.is_none() && self.end.is_none() {
            match attributes.session().extensions().get::<ContentRange>() {
                Some(range) => (Some(range.start), Some(range.end)),
                None => (None, None),
            }
        } else {
            (self.start, self.end)
        };

        let session = attributes.session_mut();
        let result = match (start, end) {
            (None, None) => copy(&mut self.stream, &mut BodyWriter::new(session)).map(|_| ()),
            (start, end) => self.write_range(session, start.unwrap_or(0), end, buffer_size),
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) if is_client_disconnect(&err) => {
                debug!("client went away while the resource was being written: {err}");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<R> Debug for PartWriterCallback<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartWriterCallback")
            .field("content_length", &self.content_length)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use resource_utils::session::TestSession;
    use std::io::Cursor;
    use test_log::test;

    use crate::configuration::ResourceSettings;

    fn data() -> Vec<u8> {
        (0..1000u32).map(|i| (i % 251) as u8).collect()
    }

    fn write(callback: PartWriterCallback<Cursor<Vec<u8>>>, session: &mut TestSession) {
        let settings = ResourceSettings::default();
        let mut attributes = Attributes::new(session, &settings);
        Box::new(callback).write_data(&mut attributes).unwrap();
    }

    #[test]
    fn full_copy() {
        let mut session = TestSession::get("/");
        write(
            PartWriterCallback::new(Cursor::new(data()), Some(1000)),
            &mut session,
        );
        assert_eq!(session.body(), &data()[..]);
    }

    #[test]
    fn explicit_range() {
        let mut session = TestSession::get("/");
        write(
            PartWriterCallback::new(Cursor::new(data()), Some(1000))
                .with_range(Some(200), Some(299))
                .with_buffer_size(7),
            &mut session,
        );
        assert_eq!(session.body(), &data()[200..300]);
    }

    #[test]
    fn open_end() {
        let mut session = TestSession::get("/");
        write(
            PartWriterCallback::new(Cursor::new(data()), Some(1000)).with_range(Some(990), None),
            &mut session,
        );
        assert_eq!(session.body(), &data()[990..]);

        let mut session = TestSession::get("/");
        write(
            PartWriterCallback::new(Cursor::new(data()), None).with_range(None, Some(9)),
            &mut session,
        );
        assert_eq!(session.body(), &data()[..10]);
    }

    #[test]
    fn end_at_maximum() {
        let mut session = TestSession::get("/");
        write(
            PartWriterCallback::new(Cursor::new(data()), None)
                .with_range(Some(995), Some(u64::MAX)),
            &mut session,
        );
        assert_eq!(session.body(), &data()[995..]);
    }

    #[test]
    fn range_from_request() {
        let mut session = TestSession::get("/");
        session.extensions_mut().insert(ContentRange {
            start: 10,
            end: 19,
            total: 1000,
        });
        write(
            PartWriterCallback::new(Cursor::new(data()), Some(1000)),
            &mut session,
        );
        assert_eq!(session.body(), &data()[10..20]);
    }

    #[test]
    fn short_stream() {
        let mut session = TestSession::get("/");
        write(
            PartWriterCallback::new(Cursor::new(data()), Some(2000)).with_range(Some(1500), None),
            &mut session,
        );
        assert!(session.body().is_empty());
    }

    #[test]
    fn client_disconnect() {
        let mut session = TestSession::get("/").disconnect_after(100);
        write(
            PartWriterCallback::new(Cursor::new(data()), Some(1000)).with_range(Some(0), None),
            &mut session,
        );
        assert_eq!(session.body(), &data()[..100]);

        let mut session = TestSession::get("/").disconnect_after(100);
        write(
            PartWriterCallback::new(Cursor::new(data()), Some(1000)),
            &mut session,
        );
        assert_eq!(session.body(), &data()[..100]);
    }
}
