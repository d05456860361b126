//! URL slug type for categories and products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits, and single hyphens")]
    InvalidFormat,
}

/// A URL-safe identifier such as `face-serums`.
///
/// Lowercase ASCII letters and digits, separated by single hyphens, with no
/// leading or trailing hyphen.
///
/// ```
/// use kaaya_core::Slug;
///
/// assert_eq!(Slug::from_name("Hair & Scalp Care").unwrap().as_str(), "hair-scalp-care");
/// assert!(Slug::parse("Face--Serums").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub const MAX_LENGTH: usize = 120;

    /// Validate an already-formed slug.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if the input is empty, too long, or malformed.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let well_formed = s.split('-').all(|part| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        });
        if !well_formed {
            return Err(SlugError::InvalidFormat);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name.
    ///
    /// Runs of anything other than ASCII letters and digits collapse into a
    /// single hyphen. Overlong results are cut to [`Self::MAX_LENGTH`].
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the name has no ASCII letters or digits.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut slug = String::with_capacity(name.len());
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }

        if slug.len() > Self::MAX_LENGTH {
            slug.truncate(Self::MAX_LENGTH);
        }
        while slug.ends_with('-') {
            slug.pop();
        }

        Self::parse(&slug)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
