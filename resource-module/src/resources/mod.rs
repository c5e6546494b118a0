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

//! Resource implementations

mod byte_array;
mod char_sequence;
mod dynamic_image;
mod package;
mod stream;

pub use byte_array::ByteArrayResource;
pub use char_sequence::CharSequenceResource;
pub use dynamic_image::DynamicImageResource;
pub use package::PackageResource;
pub use stream::ResourceStreamResource;

use bytes::Bytes;
use std::io::Cursor;

use crate::part_writer::PartWriterCallback;
use crate::response::{ContentRangeType, ResourceResponse};

/// Makes the response write an in-memory buffer, range requests included.
fn bytes_body(response: &mut ResourceResponse, data: Bytes) {
    let length = data.len() as u64;
    response.set_content_length(length);
    response.set_accept_range(ContentRangeType::Bytes);
    response.set_write_callback(PartWriterCallback::new(Cursor::new(data), Some(length)));
}
