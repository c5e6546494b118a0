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

//! Standard responses for various conditions

use http::{header, method::Method, status::StatusCode, HeaderValue};
use maud::{html, DOCTYPE};
use std::io::Error;

use crate::session::SessionWrapper;

/// Produces the text of a standard response page for the given status code.
pub fn response_text(status: StatusCode) -> String {
    let status_str = status.as_str();
    let reason = status.canonical_reason().unwrap_or("");
    html! {
        (DOCTYPE)
        html {
            head {
                title {
                    (status_str) " " (reason)
                }
            }

            body {
                center {
                    h1 {
                        (status_str) " " (reason)
                    }
                }
            }
        }
    }
    .into()
}

/// Responds with a standard error page for the given status code. No body is written for `HEAD`
/// requests.
pub fn error_response<S>(session: &mut S, status: StatusCode) -> Result<(), Error>
where
    S: SessionWrapper + ?Sized,
{
    let text = response_text(status);

    let header = session.resp_header_mut();
    header.status = status;
    header.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    header
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(text.len()));

    if session.req_header().method != Method::HEAD {
        session.write_response_body(text.as_bytes())?;
    }

    Ok(())
}
