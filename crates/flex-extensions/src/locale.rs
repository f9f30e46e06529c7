//! Locale tags as used by language pack components.
//!
//! Tags look like `zh`, `zh_CN`, `zh-CN` or `zh_CN_zhengma`: a language, an
//! optional country and an optional free-form variant.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocaleTag {
    pub language: String,
    pub country: Option<String>,
    pub variant: Option<String>,
}

impl LocaleTag {
    /// Whether this tag satisfies a query: the language must match and every
    /// part the query specifies must match too.
    pub fn matches(&self, query: &LocaleTag) -> bool {
        self.language == query.language
            && query
                .country
                .as_ref()
                .is_none_or(|c| self.country.as_ref() == Some(c))
            && query
                .variant
                .as_ref()
                .is_none_or(|v| self.variant.as_ref() == Some(v))
    }
}

impl FromStr for LocaleTag {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        let mut parts = tag.splitn(3, ['_', '-']);
        let language = parts.next().unwrap_or_default();
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::malformed(
                "locale",
                format!("invalid language in locale tag '{tag}'"),
            ));
        }

        let country = parts.next().filter(|s| !s.is_empty());
        if let Some(country) = country {
            if !country.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(Error::malformed(
                    "locale",
                    format!("invalid country in locale tag '{tag}'"),
                ));
            }
        }
        let variant = parts.next().filter(|s| !s.is_empty());

        Ok(Self {
            language: language.to_ascii_lowercase(),
            country: country.map(|c| c.to_ascii_uppercase()),
            variant: variant.map(str::to_string),
        })
    }
}

impl fmt::Display for LocaleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.language)?;
        if let Some(country) = &self.country {
            write!(f, "_{country}")?;
        }
        if let Some(variant) = &self.variant {
            if self.country.is_none() {
                write!(f, "_")?;
            }
            write!(f, "_{variant}")?;
        }
        Ok(())
    }
}
