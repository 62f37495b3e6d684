//! core::version
//!
//! Module version numbers as they appear in version tags.
//!
//! # Grammar
//!
//! ```text
//! [v] NUM ("." NUM)* ["-" IDENT ("." IDENT)*] ["+" IDENT ("." IDENT)*]
//! ```
//!
//! where `NUM` is a run of ASCII digits and `IDENT` a run of ASCII
//! alphanumerics and `-`. Versions with fewer than three numeric segments
//! are padded with zeros, so `1.2` and `1.2.0` are the same version and
//! both render as `1.2.0`.
//!
//! # Precedence
//!
//! Equality and ordering follow Semantic Versioning precedence: numeric
//! segments compare numerically (missing trailing segments count as zero),
//! a prerelease ranks below the corresponding release, and build metadata
//! is ignored. Two versions are equal exactly when neither precedes the
//! other, which is why `Version` does not implement `Hash`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from parsing a version string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,

    #[error("invalid numeric segment '{segment}' in version '{input}'")]
    InvalidSegment { input: String, segment: String },

    #[error("invalid prerelease '{0}'")]
    InvalidPrerelease(String),

    #[error("invalid build metadata '{0}'")]
    InvalidMetadata(String),
}

/// A parsed module version.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    prerelease: Option<String>,
    metadata: Option<String>,
}

impl Version {
    /// Minimum number of numeric segments; shorter versions are zero-padded.
    const MIN_SEGMENTS: usize = 3;

    /// Create a release version `major.minor.patch`.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            segments: vec![major, minor, patch],
            prerelease: None,
            metadata: None,
        }
    }

    /// Parse a version string.
    ///
    /// # Example
    ///
    /// ```
    /// use modreg::core::version::Version;
    ///
    /// let v = Version::parse("1.2-beta.1+build.7").unwrap();
    /// assert_eq!(v.to_string(), "1.2.0-beta.1+build.7");
    /// assert_eq!(v.prerelease(), Some("beta.1"));
    ///
    /// assert!(Version::parse("one.two").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let s = input.strip_prefix('v').unwrap_or(input);
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let (rest, metadata) = match s.split_once('+') {
            Some((rest, meta)) => {
                if !Self::valid_identifiers(meta) {
                    return Err(VersionError::InvalidMetadata(meta.to_string()));
                }
                (rest, Some(meta.to_string()))
            }
            None => (s, None),
        };

        let (core, prerelease) = match rest.split_once('-') {
            Some((core, pre)) => {
                if !Self::valid_identifiers(pre) {
                    return Err(VersionError::InvalidPrerelease(pre.to_string()));
                }
                (core, Some(pre.to_string()))
            }
            None => (rest, None),
        };

        let mut segments = Vec::with_capacity(Self::MIN_SEGMENTS);
        for segment in core.split('.') {
            let invalid = || VersionError::InvalidSegment {
                input: input.to_string(),
                segment: segment.to_string(),
            };
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            segments.push(segment.parse::<u64>().map_err(|_| invalid())?);
        }
        while segments.len() < Self::MIN_SEGMENTS {
            segments.push(0);
        }

        Ok(Self {
            segments,
            prerelease,
            metadata,
        })
    }

    /// Dot-separated identifiers, each non-empty and `[0-9A-Za-z-]`.
    fn valid_identifiers(s: &str) -> bool {
        s.split('.').all(|ident| {
            !ident.is_empty()
                && ident
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
    }

    /// Numeric segments, padded to at least three.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    fn cmp_segments(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| {
                let a = self.segments.get(i).copied().unwrap_or(0);
                let b = other.segments.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Compare two prerelease strings identifier by identifier.
fn cmp_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord.is_ne() {
                    return ord;
                }
            }
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(meta) = &self.metadata {
            write!(f, "+{meta}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_segments(other)
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => cmp_prerelease(a, b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}
