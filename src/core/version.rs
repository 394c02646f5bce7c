// src/core/version.rs
//! Ordering for Python package version strings.
//!
//! Follows the public version scheme used by Python packaging: an optional
//! epoch, a numeric release, then pre-, post- and dev-release segments and an
//! optional local label. Strings that do not fit the scheme still order, below
//! every well-formed version.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use regex::Regex;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?ix)
            ^\s*v?
            (?:(?P<epoch>[0-9]+)!)?
            (?P<release>[0-9]+(?:\.[0-9]+)*)
            (?:[-_.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_.]?(?P<pre_n>[0-9]+)?)?
            (?:-(?P<post_n1>[0-9]+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)?
            (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?
            (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
            \s*$",
        )
        .expect("version pattern is valid")
    })
}

/// A non-negative integer of any size, kept as its significant digits
#[derive(Debug, Clone, PartialEq, Eq)]
struct Numeral(String);

impl Numeral {
    fn new(digits: &str) -> Self {
        Numeral(digits.trim_start_matches('0').to_string())
    }

    fn zero() -> Self {
        Numeral(String::new())
    }

    fn is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl Ord for Numeral {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Numeral {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha,
    Beta,
    ReleaseCandidate,
}

/// Where a release sits relative to its pre-releases
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Phase<'a> {
    /// `1.0.dev0`: below every pre-release of 1.0
    DevOnly,
    Pre(PreRelease, &'a Numeral),
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Dev<'a> {
    Dev(&'a Numeral),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LocalSegment {
    Text(String),
    Number(Numeral),
}

/// A parsed version. Equality and ordering ignore spelling, so `1.0` equals `1.0.0`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    epoch: Numeral,
    release: Vec<Numeral>,
    pre: Option<(PreRelease, Numeral)>,
    post: Option<Numeral>,
    dev: Option<Numeral>,
    local: Option<Vec<LocalSegment>>,
}

impl Version {
    pub fn parse(input: &str) -> Option<Self> {
        let captures = version_pattern().captures(input)?;
        let number = |name: &str| captures.name(name).map(|m| Numeral::new(m.as_str()));

        let epoch = number("epoch").unwrap_or_else(Numeral::zero);
        let release = captures["release"].split('.').map(Numeral::new).collect();

        let pre = captures.name("pre_l").map(|label| {
            let kind = match label.as_str().to_ascii_lowercase().as_str() {
                "a" | "alpha" => PreRelease::Alpha,
                "b" | "beta" => PreRelease::Beta,
                _ => PreRelease::ReleaseCandidate,
            };
            (kind, number("pre_n").unwrap_or_else(Numeral::zero))
        });

        let post = match (number("post_n1"), captures.name("post_l")) {
            (Some(n), _) => Some(n),
            (None, Some(_)) => Some(number("post_n2").unwrap_or_else(Numeral::zero)),
            (None, None) => None,
        };

        let dev = captures
            .name("dev_l")
            .map(|_| number("dev_n").unwrap_or_else(Numeral::zero));

        let local = captures.name("local").map(|m| {
            m.as_str()
                .split(['-', '_', '.'])
                .map(|segment| {
                    if segment.bytes().all(|b| b.is_ascii_digit()) {
                        LocalSegment::Number(Numeral::new(segment))
                    } else {
                        LocalSegment::Text(segment.to_ascii_lowercase())
                    }
                })
                .collect()
        });

        Some(Self {
            raw: input.to_string(),
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    fn trimmed_release(&self) -> &[Numeral] {
        let end = self
            .release
            .iter()
            .rposition(|part| !part.is_zero())
            .map_or(0, |i| i + 1);
        &self.release[..end]
    }

    fn phase(&self) -> Phase<'_> {
        match (&self.pre, &self.post, &self.dev) {
            (None, None, Some(_)) => Phase::DevOnly,
            (Some((kind, n)), _, _) => Phase::Pre(*kind, n),
            (None, _, _) => Phase::Final,
        }
    }

    fn dev_key(&self) -> Dev<'_> {
        self.dev.as_ref().map_or(Dev::None, Dev::Dev)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.phase().cmp(&other.phase()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
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

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Sort key for any catalog version string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionKey {
    /// Did not parse; ordered lexicographically, below all parsed versions
    Unparsed(String),
    Parsed(Version),
}

impl VersionKey {
    pub fn new(version: &str) -> Self {
        match Version::parse(version) {
            Some(parsed) => VersionKey::Parsed(parsed),
            None => VersionKey::Unparsed(version.to_string()),
        }
    }
}

/// Total order over version strings. Equal versions spelled differently are
/// tie-broken on the raw text so sorting is deterministic.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::new(a)
        .cmp(&VersionKey::new(b))
        .then_with(|| a.cmp(b))
}

/// The greatest version in the input, if any
pub fn latest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .max_by(|a, b| compare_versions(a, b))
}

/// Sort version strings ascending
pub fn sort_versions(versions: &mut [String]) {
    versions.sort_by(|a, b| compare_versions(a, b));
}
