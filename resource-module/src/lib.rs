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

//! # Resource Module
//!
//! This crate serves resources: static files located by scope and name, byte buffers, texts,
//! generated images and streams. It turns them into HTTP responses written to a
//! [`SessionWrapper`](resource_utils::session::SessionWrapper).
//!
//! ## Supported functionality
//!
//! * Variant selection by locale, style and variation, falling back to less specific variants
//! * Conditional requests via `If-Modified-Since`
//! * Byte range requests via `Range` HTTP header
//! * `Cache-Control`, `Expires` and `Date` headers derived from the cache duration, with caching
//!   strategies adding version information to resource URLs
//! * A registry of resource references, with references created on demand for existing package
//!   resources and evicted again once too many accumulate
//!
//! ## Known limitations
//!
//! * Requests with multiple byte ranges are not supported and will result in the full content
//!   being returned.
//! * Suffix ranges (`bytes=-500`) are read as ranges starting at the first byte.
//!
//! ## Code example
//!
//! ```rust
//! use http::{header, HeaderValue, StatusCode};
//! use resource_module::{Attributes, ByteArrayResource, Resource, ResourceSettings};
//! use resource_utils::session::TestSession;
//!
//! let settings = ResourceSettings::default();
//! let resource = ByteArrayResource::new(Some("text/plain"), &b"Hello world!"[..]);
//!
//! let mut session = TestSession::get("/hello")
//!     .with_header(header::RANGE, HeaderValue::from_static("bytes=6-"));
//! let mut attributes = Attributes::new(&mut session, &settings);
//! resource.respond(&mut attributes).unwrap();
//!
//! assert_eq!(session.status(), StatusCode::PARTIAL_CONTENT);
//! assert_eq!(session.body_str(), "world!");
//! ```
//!
//! Settings are usually loaded from a configuration file and merged with command line options:
//!
//! ```rust
//! use resource_module::{ResourceSettings, ResourceSettingsConf, ResourceSettingsOpt};
//! use resource_utils::FromYaml;
//!
//! let mut conf = ResourceSettingsConf::from_yaml("default_cache_duration: 3600").unwrap();
//! conf.merge_with_opt(ResourceSettingsOpt::default());
//! let settings = ResourceSettings::try_from(conf).unwrap();
//! ```

pub mod caching;
pub mod configuration;
mod error;
pub mod guard;
pub mod headers;
mod locale;
pub mod locator;
pub mod part_writer;
pub mod range;
pub mod reference;
pub mod registry;
pub mod resource;
pub mod resources;
pub mod response;

pub use caching::{CachingStrategy, FilenameWithVersionStrategy, NoOpCachingStrategy};
pub use configuration::{ResourceSettings, ResourceSettingsConf, ResourceSettingsOpt};
pub use error::ResourceError;
pub use locale::{EmptyLocale, Locale};
pub use reference::{Key, ResourceReference};
pub use registry::ResourceReferenceRegistry;
pub use resource::{respond, Attributes, Resource, WriteCallback};
pub use resources::{
    ByteArrayResource, CharSequenceResource, DynamicImageResource, PackageResource,
    ResourceStreamResource,
};
pub use response::ResourceResponse;
