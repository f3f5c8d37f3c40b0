use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease};
use thiserror::Error;

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Version string is empty")]
    Empty,

    #[error("Invalid version number component: {0}")]
    InvalidComponent(String),

    #[error("Wildcard {0} is not allowed")]
    WildcardNotAllowed(String),

    #[error("Invalid pre-release or build string: {0}")]
    InvalidExtra(String),
}

const WILDCARDS: [&str; 3] = ["*", "x", "X"];

/// One dot-separated number of a [`Version`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Number(u64),
    Wildcard,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Number(n) => write!(f, "{}", n),
            Component::Wildcard => f.write_str(WILDCARDS[0]),
        }
    }
}

/// Semver-like version with wildcard support, e.g. `1.2.3`, `1.0.*`,
/// `1.2.3-pre.4+build.5`.
///
/// Any number of components is accepted. A missing trailing component reads
/// as a wildcard if the last present one is a wildcard, and as `0`
/// otherwise. A wildcard matches anything at its position, which is why
/// [`Version`] is only `PartialOrd`: `1.*` equals both `1.2` and `1.3`.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<Component>,
    pre: Option<Prerelease>,
    build: Option<BuildMetadata>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            components: vec![
                Component::Number(major),
                Component::Number(minor),
                Component::Number(patch),
            ],
            pre: None,
            build: None,
        }
    }

    /// Parse a version. With `allow_wildcard == false` any of `*`, `x`, `X`
    /// is rejected, which is what plugin metadata versions use.
    pub fn parse(text: &str, allow_wildcard: bool) -> Result<Self, VersionError> {
        let (text, build) = match text.split_once('+') {
            Some((head, extra)) => {
                let build = BuildMetadata::new(extra).map_err(|_| VersionError::InvalidExtra(extra.to_string()))?;
                (head, Some(build))
            }
            None => (text, None),
        };
        let (text, pre) = match text.split_once('-') {
            Some((head, extra)) => {
                let pre = Prerelease::new(extra).map_err(|_| VersionError::InvalidExtra(extra.to_string()))?;
                (head, Some(pre))
            }
            None => (text, None),
        };
        if text.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut components = Vec::new();
        for part in text.split('.') {
            if WILDCARDS.contains(&part) {
                if !allow_wildcard {
                    return Err(VersionError::WildcardNotAllowed(part.to_string()));
                }
                components.push(Component::Wildcard);
            } else {
                let n = part
                    .parse::<u64>()
                    .map_err(|_| VersionError::InvalidComponent(part.to_string()))?;
                components.push(Component::Number(n));
            }
        }
        Ok(Self { components, pre, build })
    }

    /// Component at `index`, extended past the end as described on [`Version`]
    pub fn component(&self, index: usize) -> Component {
        match self.components.get(index) {
            Some(c) => *c,
            None => match self.components.last() {
                Some(Component::Wildcard) => Component::Wildcard,
                _ => Component::Number(0),
            },
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn has_wildcard(&self) -> bool {
        self.components.contains(&Component::Wildcard)
    }

    pub fn pre(&self) -> Option<&Prerelease> {
        self.pre.as_ref()
    }

    pub fn build(&self) -> Option<&BuildMetadata> {
        self.build.as_ref()
    }

    /// Compare two versions.
    ///
    /// Wildcards skip their position. A pre-release sorts before the release
    /// unless the other side has a wildcard. Build metadata only breaks a
    /// tie when both sides carry it and neither has a wildcard.
    pub fn compare(&self, other: &Version) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            match (self.component(i), other.component(i)) {
                (Component::Number(a), Component::Number(b)) if a != b => return a.cmp(&b),
                _ => {}
            }
        }
        let by_pre = match (&self.pre, &other.pre) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) if !other.has_wildcard() => Ordering::Less,
            (None, Some(_)) if !self.has_wildcard() => Ordering::Greater,
            _ => Ordering::Equal,
        };
        if by_pre != Ordering::Equal || self.has_wildcard() || other.has_wildcard() {
            return by_pre;
        }
        match (&self.build, &other.build) {
            (Some(a), Some(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s, true)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        f.write_str(&numbers.join("."))?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// Comparison operator of a single [`Criterion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Equal,
    /// Same major, not lower
    Caret,
    /// Same major and minor, not lower
    Tilde,
}

impl Operator {
    // Longest prefixes first so `<=` is not read as `<`
    const PREFIXES: [(&'static str, Operator); 8] = [
        ("<=", Operator::LessEqual),
        (">=", Operator::GreaterEqual),
        ("<", Operator::Less),
        (">", Operator::Greater),
        ("==", Operator::Equal),
        ("=", Operator::Equal),
        ("^", Operator::Caret),
        ("~", Operator::Tilde),
    ];

    fn symbol(&self) -> &'static str {
        match self {
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::Equal => "==",
            Operator::Caret => "^",
            Operator::Tilde => "~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    operator: Operator,
    base: Version,
    /// Written without an operator, shown back the same way
    implicit: bool,
}

impl Criterion {
    fn parse(text: &str) -> Result<Self, VersionError> {
        for (prefix, operator) in Operator::PREFIXES {
            if let Some(rest) = text.strip_prefix(prefix) {
                return Ok(Self {
                    operator,
                    base: Version::parse(rest, true)?,
                    implicit: false,
                });
            }
        }
        Ok(Self {
            operator: Operator::Equal,
            base: Version::parse(text, true)?,
            implicit: true,
        })
    }

    pub fn test(&self, version: &Version) -> bool {
        let base = &self.base;
        match self.operator {
            Operator::LessEqual => version <= base,
            Operator::GreaterEqual => version >= base,
            Operator::Less => version < base,
            Operator::Greater => version > base,
            Operator::Equal => version == base,
            Operator::Caret => version >= base && version.component(0) == base.component(0),
            Operator::Tilde => {
                version >= base
                    && version.component(0) == base.component(0)
                    && version.component(1) == base.component(1)
            }
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.implicit {
            write!(f, "{}", self.base)
        } else {
            write!(f, "{}{}", self.operator.symbol(), self.base)
        }
    }
}

/// Space-separated list of criteria that must all hold, e.g. `>=1.2 <2.0`.
/// An empty requirement accepts every version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRequirement {
    criteria: Vec<Criterion>,
}

impl VersionRequirement {
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let criteria = text
            .split(' ')
            .filter(|part| !part.is_empty())
            .map(Criterion::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { criteria })
    }

    /// Requirement that accepts any version
    pub fn any() -> Self {
        Self { criteria: Vec::new() }
    }

    pub fn has_criterion(&self) -> bool {
        !self.criteria.is_empty()
    }

    pub fn accept(&self, version: &Version) -> bool {
        self.criteria.iter().all(|c| c.test(version))
    }
}

impl FromStr for VersionRequirement {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRequirement::parse(s)
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.criteria.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(" "))
    }
}
