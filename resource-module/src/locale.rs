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

//! Locale value used to select resource variants

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A locale consisting of a language, an optional country and an optional variant
///
/// The textual form is `language[_COUNTRY[_variant]]`, `-` is accepted as separator as well when
/// parsing. Language is normalized to lower case and country to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale {
    language: String,
    country: Option<String>,
    variant: Option<String>,
}

impl Locale {
    /// Creates a locale from a language code.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            country: None,
            variant: None,
        }
    }

    /// Returns a copy of this locale with the given country.
    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_ascii_uppercase());
        self
    }

    /// Returns a copy of this locale with the given variant.
    pub fn with_variant(mut self, variant: &str) -> Self {
        self.variant = Some(variant.to_owned());
        self
    }

    /// Language code
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Country code if any
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// Variant if any
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Lists this locale followed by its less specific forms, e.g. `de_CH_x`, `de_CH`, `de`.
    pub fn fallbacks(&self) -> Vec<Locale> {
        let mut result = vec![self.clone()];
        if self.variant.is_some() && self.country.is_some() {
            result.push(Self {
                language: self.language.clone(),
                country: self.country.clone(),
                variant: None,
            });
        }
        if self.country.is_some() || self.variant.is_some() {
            result.push(Self::new(&self.language));
        }
        result
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.language)?;
        if let Some(country) = &self.country {
            write!(f, "_{country}")?;
        }
        if let Some(variant) = &self.variant {
            if self.country.is_none() {
                f.write_str("_")?;
            }
            write!(f, "_{variant}")?;
        }
        Ok(())
    }
}

/// Error returned when parsing an empty locale string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("locale string is empty")]
pub struct EmptyLocale;

impl FromStr for Locale {
    type Err = EmptyLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(['_', '-']);
        let language = parts.next().filter(|l| !l.is_empty()).ok_or(EmptyLocale)?;
        let mut locale = Self::new(language);
        if let Some(country) = parts.next().filter(|c| !c.is_empty()) {
            locale = locale.with_country(country);
        }
        let variant = parts.collect::<Vec<_>>().join("_");
        if !variant.is_empty() {
            locale = locale.with_variant(&variant);
        }
        Ok(locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn parse_and_display() {
        let locale: Locale = "de-ch".parse().unwrap();
        assert_eq!(locale.language(), "de");
        assert_eq!(locale.country(), Some("CH"));
        assert_eq!(locale.to_string(), "de_CH");

        let locale: Locale = "en_US_posix".parse().unwrap();
        assert_eq!(locale.variant(), Some("posix"));
        assert_eq!(locale.to_string(), "en_US_posix");

        assert_eq!("".parse::<Locale>(), Err(EmptyLocale));
    }

    #[test]
    fn fallbacks() {
        let locale: Locale = "en_US_posix".parse().unwrap();
        let fallbacks: Vec<_> = locale.fallbacks().iter().map(Locale::to_string).collect();
        assert_eq!(fallbacks, vec!["en_US_posix", "en_US", "en"]);

        let fallbacks: Vec<_> = Locale::new("fr")
            .fallbacks()
            .iter()
            .map(Locale::to_string)
            .collect();
        assert_eq!(fallbacks, vec!["fr"]);
    }
}
