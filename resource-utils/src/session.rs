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

//! Abstraction of the HTTP request/response pair a resource is served to.

use bytes::BytesMut;
use http::{request, response, Extensions, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use log::debug;
use std::borrow::Cow;
use std::io::{Error, ErrorKind, Write};

use crate::standard_response::error_response;

/// A trait implemented by wrappers around a server’s request/response state
///
/// The request header is read-only for most purposes, its extensions however hold request-scoped
/// state that is computed once and read again later while the same request is being processed.
/// Response headers are collected until the first body write, servers are expected to send them
/// out at that point or when the session is flushed.
pub trait SessionWrapper: Send {
    /// Returns the request header.
    fn req_header(&self) -> &request::Parts;

    /// Returns the request header for modification.
    fn req_header_mut(&mut self) -> &mut request::Parts;

    /// Returns a reference to the request-scoped extensions.
    fn extensions(&self) -> &Extensions {
        &self.req_header().extensions
    }

    /// Returns a mutable reference to the request-scoped extensions.
    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.req_header_mut().extensions
    }

    /// Returns the response header collected so far.
    fn resp_header(&self) -> &response::Parts;

    /// Returns the response header for modification.
    fn resp_header_mut(&mut self) -> &mut response::Parts;

    /// Sets the response status.
    fn set_status(&mut self, status: StatusCode) {
        self.resp_header_mut().status = status;
    }

    /// Sets a response header, replacing any previous values.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.resp_header_mut().headers.insert(name, value);
    }

    /// Adds a value to a response header, keeping any previous values.
    fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.resp_header_mut().headers.append(name, value);
    }

    /// Responds with an error status. The message is meant for logging, only the standard status
    /// page is sent to the client.
    fn send_error(&mut self, status: StatusCode, message: Option<&str>) -> Result<(), Error> {
        if let Some(message) = message {
            debug!("responding with status {status}: {message}");
        }
        error_response(self, status)
    }

    /// Writes a chunk of the response body.
    fn write_response_body(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Flushes the response header and any buffered body data.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Adapts a session to [`std::io::Write`] so that generic stream copying can target the response
/// body.
#[derive(Debug)]
pub struct BodyWriter<'a, S: SessionWrapper + ?Sized> {
    session: &'a mut S,
}

impl<'a, S: SessionWrapper + ?Sized> BodyWriter<'a, S> {
    /// Creates a writer for the session’s response body.
    pub fn new(session: &'a mut S) -> Self {
        Self { session }
    }
}

impl<S: SessionWrapper + ?Sized> Write for BodyWriter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.session.write_response_body(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.session.flush()
    }
}

/// Checks whether an I/O error means that the client went away while the response was written.
pub fn is_client_disconnect(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

/// An in-memory session recording the response
///
/// Used by tests, also suitable for rendering resources into a buffer.
#[derive(Debug)]
pub struct TestSession {
    request: request::Parts,
    response: response::Parts,
    body: BytesMut,
    error_message: Option<String>,
    flush_count: usize,
    disconnect_after: Option<usize>,
}

impl TestSession {
    /// Creates a session for a request with given method and URI. Invalid URIs are replaced by
    /// `/`.
    pub fn new(method: Method, uri: &str) -> Self {
        let (mut request, ()) = Request::new(()).into_parts();
        request.method = method;
        request.uri = Uri::try_from(uri).unwrap_or_default();
        Self::from_request(request)
    }

    /// Creates a session for a `GET` request to the given URI.
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Creates a session for the given request header.
    pub fn from_request(request: request::Parts) -> Self {
        let (response, ()) = Response::new(()).into_parts();
        Self {
            request,
            response,
            body: BytesMut::new(),
            error_message: None,
            flush_count: 0,
            disconnect_after: None,
        }
    }

    /// Adds a request header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.request.headers.append(name, value);
        self
    }

    /// Simulates a client going away once the given number of body bytes has been written.
    /// Further writes fail with [`ErrorKind::BrokenPipe`].
    pub fn disconnect_after(mut self, bytes: usize) -> Self {
        self.disconnect_after = Some(bytes);
        self
    }

    /// Response status
    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    /// Response headers
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    /// Response body written so far
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Response body written so far, as text
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Message passed along with the last error status if any
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Number of times the session has been flushed
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }
}

impl SessionWrapper for TestSession {
    fn req_header(&self) -> &request::Parts {
        &self.request
    }

    fn req_header_mut(&mut self) -> &mut request::Parts {
        &mut self.request
    }

    fn resp_header(&self) -> &response::Parts {
        &self.response
    }

    fn resp_header_mut(&mut self) -> &mut response::Parts {
        &mut self.response
    }

    fn send_error(&mut self, status: StatusCode, message: Option<&str>) -> Result<(), Error> {
        self.error_message = message.map(ToOwned::to_owned);
        error_response(self, status)
    }

    fn write_response_body(&mut self, data: &[u8]) -> Result<(), Error> {
        if let Some(limit) = self.disconnect_after {
            let available = limit.saturating_sub(self.body.len());
            if data.len() > available {
                self.body.extend_from_slice(&data[..available]);
                return Err(ErrorKind::BrokenPipe.into());
            }
        }

        self.body.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.flush_count += 1;
        Ok(())
    }
}
