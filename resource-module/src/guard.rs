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

//! Access checks for package resources

use log::warn;
use std::collections::HashSet;

/// Decides which package resource paths may be served
///
/// Paths are checked relative to their scope. Absolute paths, paths leaving the scope through
/// `..` segments, hidden files and files with a blocked extension are refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResourceGuard {
    blocked_extensions: HashSet<String>,
}

impl PackageResourceGuard {
    /// Extensions blocked unless configured otherwise
    pub const DEFAULT_BLOCKED_EXTENSIONS: &'static [&'static str] =
        &["class", "java", "properties", "rs"];

    /// Creates a guard blocking the given file extensions. Extensions are matched
    /// case-insensitively, a leading dot is ignored.
    pub fn new<I, S>(blocked_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked_extensions: blocked_extensions
                .into_iter()
                .map(|extension| {
                    extension
                        .as_ref()
                        .trim_start_matches('.')
                        .to_ascii_lowercase()
                })
                .collect(),
        }
    }

    /// Checks whether the resource `path` within `scope` may be served.
    pub fn accept(&self, scope: &str, path: &str) -> bool {
        if path.is_empty() || path.starts_with(['/', '\\']) || path.contains(':') {
            warn!("Access denied to absolute resource path {path:?} in scope {scope}");
            return false;
        }

        let mut depth = 0usize;
        let mut file_name = "";
        for segment in path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if depth == 0 {
                        warn!("Access denied to resource path {path:?} outside of scope {scope}");
                        return false;
                    }
                    depth -= 1;
                }
                _ => depth += 1,
            }
            file_name = segment;
        }

        if file_name.starts_with('.') {
            warn!("Access denied to hidden resource {path:?} in scope {scope}");
            return false;
        }

        if let Some((_, extension)) = file_name.rsplit_once('.') {
            if self
                .blocked_extensions
                .contains(&extension.to_ascii_lowercase())
            {
                warn!("Access denied to resource {path:?} in scope {scope}: extension is blocked");
                return false;
            }
        }

        true
    }
}

impl Default for PackageResourceGuard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BLOCKED_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn accepted_paths() {
        let guard = PackageResourceGuard::default();
        assert!(guard.accept("app", "style.css"));
        assert!(guard.accept("app", "css/../style.css"));
        assert!(guard.accept("app", "./images/logo.png"));
        assert!(guard.accept("app", "Makefile"));
    }

    #[test]
    fn blocked_paths() {
        let guard = PackageResourceGuard::default();
        assert!(!guard.accept("app", ""));
        assert!(!guard.accept("app", "/etc/passwd"));
        assert!(!guard.accept("app", "C:/windows"));
        assert!(!guard.accept("app", "../secret.txt"));
        assert!(!guard.accept("app", "css/../../secret.txt"));
        assert!(!guard.accept("app", ".htaccess"));
        assert!(!guard.accept("app", "messages.properties"));
        assert!(!guard.accept("app", "Main.JAVA"));
        assert!(!guard.accept("app", "lib.rs"));
    }

    #[test]
    fn custom_extensions() {
        let guard = PackageResourceGuard::new([".TMPL"]);
        assert!(!guard.accept("app", "page.tmpl"));
        assert!(guard.accept("app", "messages.properties"));
    }
}
