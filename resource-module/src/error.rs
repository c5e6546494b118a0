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

//! Errors produced while serving resources

use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

/// Failures of the resource serving pipeline
///
/// Missing resources are not errors, resources report them by setting an error status on their
/// [`ResourceResponse`](crate::response::ResourceResponse).
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The `Range` request header could not be parsed.
    #[error("malformed Range header {value:?}")]
    MalformedRange {
        /// The raw header value
        value: String,
        /// Parse failure of a numeric component if any
        #[source]
        source: Option<ParseIntError>,
    },

    /// A response body is required but the resource didn’t provide a write callback.
    #[error("a write callback has to be set on the resource response when data needs to be written")]
    MissingWriteCallback,

    /// A custom header would overwrite a header managed by the resource response.
    #[error("header {0:?} cannot be set directly, use the corresponding resource response setting")]
    ReservedHeader(String),

    /// A header name or value isn’t valid.
    #[error("invalid header {name:?}: {value:?}")]
    InvalidHeaderValue {
        /// Header name
        name: String,
        /// Header value
        value: String,
    },

    /// The package resource guard denied access to a resource path.
    #[error("access denied to package resource {0}")]
    Blocked(String),

    /// The configured resource root isn’t accessible.
    #[error("failed accessing root path {path:?}")]
    Configuration {
        /// Configured root directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing the response failed.
    #[error("failed writing resource data")]
    Io(#[from] io::Error),
}
