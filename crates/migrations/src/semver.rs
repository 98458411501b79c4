//! Semantic versions used to identify and order migrations
//!
//! Parsing is lenient by default (missing minor/patch become 0) and strict on
//! request. Ordering follows semver precedence, with build metadata only used
//! as a final tiebreak so that the ordering stays total.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::FormatError;

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<major>\d+)(\.(?P<minor>\d+))?(\.(?P<patch>\d+))?(-(?P<pre>[0-9A-Za-z\-.]+))?(\+(?P<build>[0-9A-Za-z\-.]+))?$",
    )
    .expect("version pattern is valid")
});

/// An immutable semantic version
#[derive(Debug, Clone)]
pub struct SemVersion {
    major: u32,
    minor: u32,
    patch: u32,
    prerelease: String,
    build: String,
}

impl SemVersion {
    /// Create a release version
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: String::new(),
            build: String::new(),
        }
    }

    /// Copy of this version with a different prerelease
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = prerelease.into();
        self
    }

    /// Copy of this version with different build metadata
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = build.into();
        self
    }

    /// Parse a version string.
    ///
    /// With `strict` the minor and patch components must be present,
    /// otherwise they default to 0.
    pub fn parse(text: &str, strict: bool) -> Result<Self, FormatError> {
        let captures = VERSION_PATTERN
            .captures(text)
            .ok_or_else(|| FormatError::InvalidVersion(text.to_string()))?;

        let number = |name: &str| -> Result<Option<u32>, FormatError> {
            captures
                .name(name)
                .map(|m| {
                    m.as_str().parse::<u32>().map_err(|_| FormatError::OutOfRange {
                        version: text.to_string(),
                        component: name.to_string(),
                    })
                })
                .transpose()
        };

        let major = number("major")?.ok_or_else(|| FormatError::InvalidVersion(text.to_string()))?;
        let minor = match number("minor")? {
            Some(minor) => minor,
            None if strict => return Err(FormatError::MissingMinor(text.to_string())),
            None => 0,
        };
        let patch = match number("patch")? {
            Some(patch) => patch,
            None if strict => return Err(FormatError::MissingPatch(text.to_string())),
            None => 0,
        };

        let text_of = |name: &str| captures.name(name).map(|m| m.as_str().to_string()).unwrap_or_default();

        Ok(Self {
            major,
            minor,
            patch,
            prerelease: text_of("pre"),
            build: text_of("build"),
        })
    }

    /// Lenient parse that swallows the error
    pub fn try_parse(text: &str, strict: bool) -> Option<Self> {
        Self::parse(text, strict).ok()
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    /// Whether this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Compare by semver precedence, ignoring build metadata.
    ///
    /// A release outranks its own prereleases.
    pub fn compare_by_precedence(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| compare_component(&self.prerelease, &other.prerelease, true))
    }

    /// Whether both versions have the same precedence
    pub fn precedence_matches(&self, other: &Self) -> bool {
        self.compare_by_precedence(other) == Ordering::Equal
    }

    /// Total order: precedence, then build metadata, then an ordinal
    /// comparison of the text components so that only equal versions tie.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.compare_by_precedence(other)
            .then_with(|| compare_component(&self.build, &other.build, false))
            .then_with(|| self.prerelease.cmp(&other.prerelease))
            .then_with(|| self.build.cmp(&other.build))
    }
}

enum Segment<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl<'a> Segment<'a> {
    fn classify(segment: &'a str) -> Self {
        // Unsigned digits of any width up to u64; a leading sign makes the segment text
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = segment.parse::<u64>() {
                return Segment::Numeric(n);
            }
        }
        Segment::Text(segment)
    }
}

/// Dotted-segment comparison of a prerelease or build component.
///
/// `empty_is_higher` selects the prerelease rule where an empty component
/// sorts above any non-empty one.
fn compare_component(a: &str, b: &str, empty_is_higher: bool) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => {
            return if empty_is_higher { Ordering::Greater } else { Ordering::Less };
        }
        (false, true) => {
            return if empty_is_higher { Ordering::Less } else { Ordering::Greater };
        }
        (false, false) => {}
    }

    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();

    for (ac, bc) in a_parts.iter().zip(b_parts.iter()) {
        let r = match (Segment::classify(ac), Segment::classify(bc)) {
            (Segment::Numeric(x), Segment::Numeric(y)) => x.cmp(&y),
            (Segment::Numeric(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Numeric(_)) => Ordering::Greater,
            (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
        };
        if r != Ordering::Equal {
            return r;
        }
    }

    a_parts.len().cmp(&b_parts.len())
}

impl fmt::Display for SemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

impl FromStr for SemVersion {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, false)
    }
}

impl PartialEq for SemVersion {
    fn eq(&self, other: &Self) -> bool {
        self.major == other.major
            && self.minor == other.minor
            && self.patch == other.patch
            && self.prerelease == other.prerelease
            && self.build == other.build
    }
}

impl Eq for SemVersion {}

impl Hash for SemVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
        self.build.hash(state);
    }
}

impl PartialOrd for SemVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl Serialize for SemVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        SemVersion::parse(&text, false).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SemVersion {
        SemVersion::parse(text, false).unwrap()
    }

    #[test]
    fn test_parse_full_version() {
        let version = v("1.2.3-beta.4+nightly.232");
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.patch(), 3);
        assert_eq!(version.prerelease(), "beta.4");
        assert_eq!(version.build(), "nightly.232");
        assert!(version.is_prerelease());
    }

    #[test]
    fn test_lenient_parse_defaults_minor_and_patch() {
        assert_eq!(v("7"), SemVersion::new(7, 0, 0));
        assert_eq!(v("7.1"), SemVersion::new(7, 1, 0));
        assert_eq!(v("8-rc"), SemVersion::new(8, 0, 0).with_prerelease("rc"));
    }

    #[test]
    fn test_strict_parse_requires_minor_and_patch() {
        assert!(matches!(SemVersion::parse("7", true), Err(FormatError::MissingMinor(_))));
        assert!(matches!(SemVersion::parse("7.1", true), Err(FormatError::MissingPatch(_))));
        assert!(SemVersion::parse("7.1.0", true).is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed_text() {
        for bad in ["", "v1.0.0", ".1.0", "1.0.0-", "1.0.0+", "1.0.0-al pha", "1..0", "abc"] {
            assert!(
                matches!(SemVersion::parse(bad, false), Err(FormatError::InvalidVersion(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
        assert!(matches!(
            SemVersion::parse("99999999999.0.0", false),
            Err(FormatError::OutOfRange { .. })
        ));
        assert!(SemVersion::try_parse("nope", false).is_none());
    }

    #[test]
    fn test_display_round_trips() {
        for text in ["1.0.0", "1.0.0-alpha", "1.0.0+build.5", "10.20.30-rc.1+sha.abc"] {
            let parsed = v(text);
            assert_eq!(parsed.to_string(), text);
            assert_eq!(v(&parsed.to_string()).compare(&parsed), Ordering::Equal);
        }
        assert_eq!(v("2").to_string(), "2.0.0");
    }

    #[test]
    fn test_release_outranks_prerelease() {
        assert_eq!(v("1.0.0").compare_by_precedence(&v("1.0.0-alpha")), Ordering::Greater);
        assert_eq!(v("1.0.0-alpha").compare_by_precedence(&v("1.0.0")), Ordering::Less);
    }

    #[test]
    fn test_prerelease_segment_ordering() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
        ];
        for pair in ordered.windows(2) {
            assert_eq!(
                v(pair[0]).compare_by_precedence(&v(pair[1])),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_wide_numeric_segments_compare_as_numbers() {
        assert_eq!(
            v("1.0.0-rc.3000000000").compare_by_precedence(&v("1.0.0-rc.999")),
            Ordering::Greater
        );
        assert_eq!(
            v("1.0.0-rc.3000000000").compare_by_precedence(&v("1.0.0-rc.next")),
            Ordering::Less
        );
    }

    #[test]
    fn test_precedence_ignores_build() {
        let a = v("1.0.0+build.1");
        let b = v("1.0.0+build.2");
        assert!(a.precedence_matches(&b));
        assert_ne!(a, b);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(v("1.0.0").compare(&a), Ordering::Less);
    }

    #[test]
    fn test_equality_is_exact() {
        assert_eq!(v("1.0.0-alpha+x"), v("1.0.0-alpha+x"));
        assert_ne!(v("1.0.0-01"), v("1.0.0-1"));
        // numerically equal segments still order deterministically
        assert_ne!(v("1.0.0-01").compare(&v("1.0.0-1")), Ordering::Equal);
        assert_eq!(v("1.0.0-01").compare_by_precedence(&v("1.0.0-1")), Ordering::Equal);
    }

    #[test]
    fn test_compare_is_a_total_order() {
        let versions: Vec<SemVersion> = [
            "0.9.0", "1.0.0-alpha", "1.0.0-alpha.1", "1.0.0-1", "1.0.0-01", "1.0.0",
            "1.0.0+b", "1.0.0+a.1", "1.0.1", "2.0.0-rc.1+x", "2.0.0",
        ]
        .iter()
        .map(|s| v(s))
        .collect();

        for a in &versions {
            assert_eq!(a.compare(a), Ordering::Equal);
            assert_eq!(a.compare_by_precedence(a), Ordering::Equal);
            for b in &versions {
                assert_eq!(a.compare(b), b.compare(a).reverse(), "{} vs {}", a, b);
                assert_eq!(a.compare(b) == Ordering::Equal, a == b);
                for c in &versions {
                    if a.compare(b) == Ordering::Less && b.compare(c) == Ordering::Less {
                        assert_eq!(a.compare(c), Ordering::Less, "{} < {} < {}", a, b, c);
                    }
                }
            }
        }

        let mut sorted = versions.clone();
        sorted.reverse();
        sorted.sort();
        assert_eq!(sorted.first(), Some(&v("0.9.0")));
        assert_eq!(sorted.last(), Some(&v("2.0.0")));
    }

    #[test]
    fn test_serde_uses_display_form() {
        let version = v("3.1.0-beta.2");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"3.1.0-beta.2\"");
        let back: SemVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
        assert!(serde_json::from_str::<SemVersion>("\"x.y\"").is_err());
    }
}
