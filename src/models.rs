// Core identifier types for the directory service

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::Error;

/// Hostnames are restricted to characters that are safe as filenames and
/// cannot traverse paths.
static RE_HOSTNAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-z.-]+$").unwrap());

/// `Type[Title]` where the type follows resource-type grammar and the title
/// is any non-empty text without a closing bracket.
static RE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][0-9a-z_-]*(?:::[A-Z][0-9a-z_-]+)*)\[([^\]]+)\]$").unwrap()
});

/// A bare resource type, optionally namespaced with `::`.
static RE_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][0-9a-z_-]*(?:::[A-Z][0-9a-z_-]+)*$").unwrap());

/// A validated hostname, safe to embed in filesystem paths.
///
/// Construction is the only validation point; everything downstream (store
/// paths, index marker names) relies on it. Dot-prefixed names are rejected
/// on top of the character class so that `.` and `..` can never reach a
/// path join and temp files can use a dot prefix without colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Hostname {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if RE_HOSTNAME.is_match(s) && !s.starts_with('.') {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidHostname(s.to_string()))
        }
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A `Type[Title]` resource reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    kind: String,
    title: String,
}

impl ResourceRef {
    /// Resource type, e.g. `File`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Resource title, e.g. `/etc/passwd`
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl FromStr for ResourceRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let caps = RE_REFERENCE
            .captures(s)
            .ok_or_else(|| Error::InvalidQuery(s.to_string()))?;
        Ok(Self {
            kind: caps[1].to_string(),
            title: caps[2].to_string(),
        })
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.title)
    }
}

/// Parsed form of the `resource` query argument.
///
/// The index stores both full references and bare types as keys, so each
/// variant's [`Display`](fmt::Display) rendering is exactly the string that
/// was hashed at ingest time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKey {
    /// Full `Type[Title]` reference
    Reference(ResourceRef),
    /// Bare type name, matching every title of that type
    Type(String),
}

impl QueryKey {
    /// Resource type of the key
    pub fn kind(&self) -> &str {
        match self {
            Self::Reference(r) => r.kind(),
            Self::Type(kind) => kind,
        }
    }

    /// Title, if the key names one
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Reference(r) => Some(r.title()),
            Self::Type(_) => None,
        }
    }
}

impl FromStr for QueryKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if RE_REFERENCE.is_match(s) {
            Ok(Self::Reference(s.parse()?))
        } else if RE_TYPE.is_match(s) {
            Ok(Self::Type(s.to_string()))
        } else {
            Err(Error::InvalidQuery(s.to_string()))
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(r) => write!(f, "{r}"),
            Self::Type(kind) => f.write_str(kind),
        }
    }
}
