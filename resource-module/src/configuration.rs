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

//! Data structures required for resource settings

use clap::Parser;
use log::trace;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::caching::{CachingStrategy, FilenameWithVersionStrategy, NoOpCachingStrategy};
use crate::error::ResourceError;
use crate::guard::PackageResourceGuard;
use crate::locator::{FileSystemLocator, ResourceStreamLocator};
use crate::part_writer::DEFAULT_BUFFER_SIZE;
use crate::response::MAX_CACHE_DURATION;

/// Default number of auto-added registry entries kept before the oldest are evicted
pub const DEFAULT_AUTO_ADDED_CAPACITY: i64 = 1000;

/// Caching strategies selectable in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CachingStrategyKind {
    /// Resource URLs aren’t versioned.
    None,
    /// A version derived from the last modification time is added to resource file names.
    #[default]
    FilenameVersion,
}

/// Command line options of the resource module
#[derive(Debug, Default, Parser)]
pub struct ResourceSettingsOpt {
    /// The directory package resources are located in.
    #[clap(long)]
    pub resource_root: Option<PathBuf>,

    /// Default time in seconds resources may be cached by the client, 0 to disable caching.
    #[clap(long)]
    pub default_cache_duration: Option<u64>,

    /// Caching strategy applied to cacheable resources.
    #[clap(long, value_enum)]
    pub caching_strategy: Option<CachingStrategyKind>,

    /// Number of automatically registered resource references to keep, negative to keep all.
    #[clap(long, allow_negative_numbers = true)]
    pub auto_added_capacity: Option<i64>,

    /// Size of the buffer used when writing resource data.
    #[clap(long)]
    pub buffer_size: Option<usize>,
}

/// Configuration file settings of the resource module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceSettingsConf {
    /// The directory package resources are located in.
    pub root: Option<PathBuf>,

    /// Default time in seconds resources may be cached by the client, 0 to disable caching.
    pub default_cache_duration: u64,

    /// Caching strategy applied to cacheable resources.
    pub caching_strategy: CachingStrategyKind,

    /// Number of automatically registered resource references to keep, negative to keep all.
    pub auto_added_capacity: i64,

    /// Size of the buffer used when writing resource data.
    pub buffer_size: usize,

    /// MIME types by file extension, overriding the built-in list.
    pub mime_types: HashMap<String, String>,

    /// File extensions of package resources that must never be served.
    pub blocked_extensions: Vec<String>,
}

impl ResourceSettingsConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: ResourceSettingsOpt) {
        if opt.resource_root.is_some() {
            self.root = opt.resource_root;
        }

        if let Some(default_cache_duration) = opt.default_cache_duration {
            self.default_cache_duration = default_cache_duration;
        }

        if let Some(caching_strategy) = opt.caching_strategy {
            self.caching_strategy = caching_strategy;
        }

        if let Some(auto_added_capacity) = opt.auto_added_capacity {
            self.auto_added_capacity = auto_added_capacity;
        }

        if let Some(buffer_size) = opt.buffer_size {
            self.buffer_size = buffer_size;
        }
    }
}

impl Default for ResourceSettingsConf {
    fn default() -> Self {
        Self {
            root: None,
            default_cache_duration: MAX_CACHE_DURATION.as_secs(),
            caching_strategy: Default::default(),
            auto_added_capacity: DEFAULT_AUTO_ADDED_CAPACITY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            mime_types: HashMap::new(),
            blocked_extensions: PackageResourceGuard::DEFAULT_BLOCKED_EXTENSIONS
                .iter()
                .map(|extension| (*extension).to_owned())
                .collect(),
        }
    }
}

/// Application-wide settings consulted while serving resources
#[derive(Debug, Clone)]
pub struct ResourceSettings {
    default_cache_duration: Duration,
    caching_strategy: Arc<dyn CachingStrategy>,
    locator: Arc<dyn ResourceStreamLocator>,
    guard: PackageResourceGuard,
    mime_types: HashMap<String, String>,
    buffer_size: usize,
    auto_added_capacity: i64,
}

impl ResourceSettings {
    /// Default cache duration for resources that don’t set one explicitly
    pub fn default_cache_duration(&self) -> Duration {
        self.default_cache_duration
    }

    /// Changes the default cache duration, capped at the maximal cache duration.
    pub fn set_default_cache_duration(&mut self, duration: Duration) {
        self.default_cache_duration = duration.min(MAX_CACHE_DURATION);
    }

    /// Caching strategy for cacheable resources
    pub fn caching_strategy(&self) -> &dyn CachingStrategy {
        self.caching_strategy.as_ref()
    }

    /// Replaces the caching strategy.
    pub fn set_caching_strategy(&mut self, strategy: Arc<dyn CachingStrategy>) {
        self.caching_strategy = strategy;
    }

    /// Locator used to find package resources
    pub fn locator(&self) -> &dyn ResourceStreamLocator {
        self.locator.as_ref()
    }

    /// Replaces the resource locator.
    pub fn set_locator(&mut self, locator: Arc<dyn ResourceStreamLocator>) {
        self.locator = locator;
    }

    /// Guard deciding which package resources may be served
    pub fn guard(&self) -> &PackageResourceGuard {
        &self.guard
    }

    /// Buffer size for writing resource data
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Configured capacity of the registry’s auto-added entries
    pub fn auto_added_capacity(&self) -> i64 {
        self.auto_added_capacity
    }

    /// Looks up the MIME type for a file name, configured overrides take precedence over the
    /// built-in list.
    pub fn mime_type(&self, file_name: &str) -> Option<String> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        if let Some(mime) = extension.and_then(|extension| self.mime_types.get(&extension)) {
            return Some(mime.clone());
        }

        mime_guess::from_path(file_name)
            .first_raw()
            .map(ToOwned::to_owned)
    }
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            default_cache_duration: MAX_CACHE_DURATION,
            caching_strategy: Arc::new(FilenameWithVersionStrategy::default()),
            locator: Arc::new(FileSystemLocator::new(None)),
            guard: PackageResourceGuard::default(),
            mime_types: HashMap::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            auto_added_capacity: DEFAULT_AUTO_ADDED_CAPACITY,
        }
    }
}

impl TryFrom<ResourceSettingsConf> for ResourceSettings {
    type Error = ResourceError;

    fn try_from(conf: ResourceSettingsConf) -> Result<Self, Self::Error> {
        trace!("Resource settings configuration: {conf:#?}");

        let root = if let Some(root) = conf.root {
            Some(
                root.canonicalize()
                    .map_err(|source| ResourceError::Configuration { path: root, source })?,
            )
        } else {
            None
        };

        let caching_strategy: Arc<dyn CachingStrategy> = match conf.caching_strategy {
            CachingStrategyKind::None => Arc::new(NoOpCachingStrategy),
            CachingStrategyKind::FilenameVersion => {
                Arc::new(FilenameWithVersionStrategy::default())
            }
        };

        let mime_types = conf
            .mime_types
            .into_iter()
            .map(|(extension, mime)| {
                (
                    extension.trim_start_matches('.').to_ascii_lowercase(),
                    mime,
                )
            })
            .collect();

        Ok(Self {
            default_cache_duration: Duration::from_secs(conf.default_cache_duration)
                .min(MAX_CACHE_DURATION),
            caching_strategy,
            locator: Arc::new(FileSystemLocator::new(root)),
            guard: PackageResourceGuard::new(conf.blocked_extensions),
            mime_types,
            buffer_size: conf.buffer_size.max(1),
            auto_added_capacity: conf.auto_added_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use resource_utils::FromYaml;
    use test_log::test;

    fn root_path() -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("testdata");
        path.push("root");
        path
    }

    #[test]
    fn defaults() {
        let conf = ResourceSettingsConf::default();
        assert_eq!(conf.default_cache_duration, 365 * 24 * 60 * 60);
        assert_eq!(conf.auto_added_capacity, 1000);
        assert_eq!(conf.buffer_size, 4096);
        assert_eq!(conf.caching_strategy, CachingStrategyKind::FilenameVersion);

        let settings = ResourceSettings::try_from(conf).unwrap();
        assert_eq!(settings.default_cache_duration(), MAX_CACHE_DURATION);
        assert!(!settings.guard().accept("app", "secret.properties"));
    }

    #[test]
    fn yaml() {
        let conf = ResourceSettingsConf::from_yaml(
            r#"
                root: .
                default_cache_duration: 60
                caching_strategy: none
                auto_added_capacity: -1
                mime_types:
                  .tmpl: text/x-template
            "#,
        )
        .unwrap();
        assert_eq!(conf.root, Some(PathBuf::from(".")));
        assert_eq!(conf.default_cache_duration, 60);
        assert_eq!(conf.caching_strategy, CachingStrategyKind::None);
        assert_eq!(conf.auto_added_capacity, -1);
        assert_eq!(conf.buffer_size, 4096);

        let settings = ResourceSettings::try_from(conf).unwrap();
        assert_eq!(settings.default_cache_duration(), Duration::from_secs(60));
        assert_eq!(
            settings.mime_type("page.TMPL").as_deref(),
            Some("text/x-template")
        );
        assert_eq!(settings.mime_type("style.css").as_deref(), Some("text/css"));
        assert_eq!(settings.mime_type("unknown.xyz123"), None);
    }

    #[test]
    fn command_line() {
        let mut conf = ResourceSettingsConf::default();
        conf.merge_with_opt(ResourceSettingsOpt::parse_from([
            "test",
            "--resource-root",
            root_path().to_str().unwrap(),
            "--caching-strategy",
            "none",
            "--auto-added-capacity",
            "-1",
            "--buffer-size",
            "16",
        ]));
        assert_eq!(conf.root, Some(root_path()));
        assert_eq!(conf.caching_strategy, CachingStrategyKind::None);
        assert_eq!(conf.auto_added_capacity, -1);
        assert_eq!(conf.buffer_size, 16);
        assert_eq!(conf.default_cache_duration, MAX_CACHE_DURATION.as_secs());
    }

    #[test]
    fn missing_root() {
        let conf = ResourceSettingsConf {
            root: Some(root_path().join("does-not-exist")),
            ..Default::default()
        };
        assert!(matches!(
            ResourceSettings::try_from(conf),
            Err(ResourceError::Configuration { .. })
        ));
    }
}
