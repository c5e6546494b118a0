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

//! # Resource Utils
//!
//! Helpers shared by the resource serving crates:
//!
//! * [`session::SessionWrapper`] abstracts the HTTP request/response pair a resource is served
//!   to. Request headers and request-scoped state (`http::Extensions`) are read from it, response
//!   status, headers and body are written to it.
//! * [`session::TestSession`] is an in-memory session recording everything written, meant for
//!   tests and for embedding into other servers.
//! * [`standard_response`] produces the standard status pages sent along with error codes.
//! * [`FromYaml`] loads configuration structures from YAML files.

pub mod session;
pub mod standard_response;

use log::trace;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Errors produced while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The configuration file could not be opened.
    #[error("failed opening configuration file {path:?}")]
    Open {
        /// Path of the configuration file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration data could not be parsed.
    #[error("failed parsing configuration data")]
    Parse(#[from] serde_yaml::Error),
}

/// Trait for configuration structures that can be loaded from YAML files. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML file.
    fn load_from_yaml<P>(path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
        Self: Sized;

    /// Loads configuration from a YAML string.
    fn from_yaml(yaml_conf: impl AsRef<str>) -> Result<Self, ConfigurationError>
    where
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug + ?Sized,
{
    fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let file = File::open(path.as_ref()).map_err(|source| ConfigurationError::Open {
            path: path.as_ref().to_owned(),
            source,
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader)?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    fn from_yaml(yaml_conf: impl AsRef<str>) -> Result<Self, ConfigurationError> {
        let conf = serde_yaml::from_str(yaml_conf.as_ref())?;
        trace!("Loaded configuration: {conf:#?}");
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;
    use test_log::test;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Conf {
        name: String,
        size: u32,
    }

    #[test]
    fn from_yaml_string() {
        let conf = Conf::from_yaml("name: test\nsize: 12").unwrap();
        assert_eq!(
            conf,
            Conf {
                name: "test".into(),
                size: 12
            }
        );

        let conf = Conf::from_yaml("size: 3").unwrap();
        assert_eq!(conf.name, "");
        assert_eq!(conf.size, 3);
    }

    #[test]
    fn from_yaml_errors() {
        assert!(matches!(
            Conf::from_yaml("size: many"),
            Err(ConfigurationError::Parse(_))
        ));
        assert!(matches!(
            Conf::load_from_yaml("/nonexistent/configuration.yaml"),
            Err(ConfigurationError::Open { .. })
        ));
    }
}
