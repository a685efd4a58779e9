//! PEP 440-style version model
//!
//! Supports epoch, dotted release segments, pre-release (`a`/`b`/`rc`),
//! post-release (`.postN`) and dev-release (`.devN`) suffixes. Ordering
//! follows the PEP 440 comparison rules: at an equal release number,
//! dev-only < pre-release < final < post-release, and releases compare
//! with implicit zero padding (`1.0 == 1.0.0`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// A version that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable version '{input}': {reason}")]
pub struct ParseError {
    /// Offending input
    pub input: String,
    /// What went wrong
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    fn tag(&self) -> &'static str {
        match self {
            PreRelease::Alpha => "a",
            PreRelease::Beta => "b",
            PreRelease::Rc => "rc",
        }
    }
}

/// A parsed version.
///
/// Equality and hashing follow the comparison rules, so `1.0` equals
/// `1.0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Version epoch, `0` unless written as `N!...`
    pub epoch: u64,

    /// Dotted release segments
    pub release: Vec<u64>,

    /// Pre-release phase and number
    pub pre: Option<(PreRelease, u64)>,

    /// Post-release number
    pub post: Option<u64>,

    /// Dev-release number
    pub dev: Option<u64>,
}

impl Version {
    /// A plain final release from segments.
    pub fn from_release(release: Vec<u64>) -> Self {
        Self {
            epoch: 0,
            release,
            pre: None,
            post: None,
            dev: None,
        }
    }

    /// Parse a version string.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = input.trim().to_ascii_lowercase();
        if text.is_empty() {
            return Err(ParseError::new(input, "empty version"));
        }

        let mut rest = text.as_str();

        let epoch = match rest.split_once('!') {
            Some((epoch_text, tail)) => {
                let epoch = parse_number(epoch_text)
                    .ok_or_else(|| ParseError::new(input, "bad epoch"))?;
                rest = tail;
                epoch
            }
            None => 0,
        };

        let (release, tail) = parse_release(rest)
            .ok_or_else(|| ParseError::new(input, "bad release segment"))?;
        rest = tail;

        let mut pre = None;
        for phase in [PreRelease::Rc, PreRelease::Beta, PreRelease::Alpha] {
            if let Some(tail) = rest.strip_prefix(phase.tag()) {
                let (num, tail) = split_leading_number(tail)
                    .ok_or_else(|| ParseError::new(input, "pre-release without number"))?;
                pre = Some((phase, num));
                rest = tail;
                break;
            }
        }

        let mut post = None;
        if let Some(tail) = rest.strip_prefix(".post") {
            let (num, tail) = split_leading_number(tail)
                .ok_or_else(|| ParseError::new(input, "post-release without number"))?;
            post = Some(num);
            rest = tail;
        }

        let mut dev = None;
        if let Some(tail) = rest.strip_prefix(".dev") {
            let (num, tail) = split_leading_number(tail)
                .ok_or_else(|| ParseError::new(input, "dev-release without number"))?;
            dev = Some(num);
            rest = tail;
        }

        if !rest.is_empty() {
            return Err(ParseError::new(
                input,
                format!("trailing input '{}'", rest),
            ));
        }

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
        })
    }

    /// Whether this is a plain final release.
    pub fn is_final(&self) -> bool {
        self.pre.is_none() && self.post.is_none() && self.dev.is_none()
    }

    /// Whether `self`'s release starts with `prefix`'s segments, with
    /// zero padding. `1.5.*` matches this way against `1.5`, `1.5.2`,
    /// `1.5.2.post1`.
    pub fn release_starts_with(&self, prefix: &[u64]) -> bool {
        (0..prefix.len()).all(|i| self.release.get(i).copied().unwrap_or(0) == prefix[i])
    }

    /// The exclusive upper bound of the `prefix.*` family: the prefix
    /// with its last segment incremented (`1.5.*` -> `1.6`).
    pub fn wildcard_upper(prefix: &[u64]) -> Version {
        let mut bumped = prefix.to_vec();
        if let Some(last) = bumped.last_mut() {
            *last += 1;
        }
        Version::from_release(bumped)
    }

    /// The exclusive upper bound implied by `~= self`: drop the last
    /// release segment and increment (`~=1.4.2` -> `<1.5`).
    ///
    /// `None` when the release has fewer than two segments, which PEP 440
    /// forbids for compatible-release clauses.
    pub fn compatible_upper(&self) -> Option<Version> {
        if self.release.len() < 2 {
            return None;
        }
        Some(Version::wildcard_upper(&self.release[..self.release.len() - 1]))
    }

    fn cmp_release(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

/// Bound sentinel used to build PEP 440 ordering keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bound<T: Ord> {
    NegInf,
    Value(T),
    PosInf,
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.cmp_release(other))
            .then_with(|| pre_key(self).cmp(&pre_key(other)))
            .then_with(|| post_key(self).cmp(&post_key(other)))
            .then_with(|| dev_key(self).cmp(&dev_key(other)))
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

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        // Trailing zeros are insignificant for comparison, so they must
        // be insignificant for hashing too.
        let significant = self
            .release
            .iter()
            .rposition(|seg| *seg != 0)
            .map(|last| last + 1)
            .unwrap_or(0);
        self.release[..significant].hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
    }
}

// 1.0.dev1 < 1.0a1 < 1.0 < 1.0.post1, with dev sorting below its anchor.
fn pre_key(v: &Version) -> Bound<(PreRelease, u64)> {
    match v.pre {
        Some(pre) => Bound::Value(pre),
        None if v.post.is_none() && v.dev.is_some() => Bound::NegInf,
        None => Bound::PosInf,
    }
}

fn post_key(v: &Version) -> Bound<u64> {
    match v.post {
        Some(post) => Bound::Value(post),
        None => Bound::NegInf,
    }
}

fn dev_key(v: &Version) -> Bound<u64> {
    match v.dev {
        Some(dev) => Bound::Value(dev),
        None => Bound::PosInf,
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release = self
            .release
            .iter()
            .map(|seg| seg.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&release)?;
        if let Some((phase, num)) = self.pre {
            write!(f, "{}{}", phase.tag(), num)?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{}", post)?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{}", dev)?;
        }
        Ok(())
    }
}

fn parse_number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn split_leading_number(text: &str) -> Option<(u64, &str)> {
    let end = text
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    let num = text[..end].parse().ok()?;
    Some((num, &text[end..]))
}

// Consumes `N(.N)*`, stopping before a dot that is not followed by a
// digit (so `.post1` and `.dev1` stay in the tail). Rejects `1..0`.
fn parse_release(text: &str) -> Option<(Vec<u64>, &str)> {
    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        let (num, tail) = split_leading_number(rest)?;
        segments.push(num);
        match tail.strip_prefix('.') {
            Some(after_dot) if after_dot.bytes().next().is_some_and(|b| b.is_ascii_digit()) => {
                rest = after_dot;
            }
            _ => return Some((segments, tail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_release_forms() {
        assert_eq!(v("1.0").release, vec![1, 0]);
        assert_eq!(v("0").release, vec![0]);
        assert_eq!(v("10.20.30").release, vec![10, 20, 30]);
        assert_eq!(v("2!1.0").epoch, 2);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(v("1.0a1").pre, Some((PreRelease::Alpha, 1)));
        assert_eq!(v("1.0b2").pre, Some((PreRelease::Beta, 2)));
        assert_eq!(v("1.0rc3").pre, Some((PreRelease::Rc, 3)));
        assert_eq!(v("1.0.0.post1").post, Some(1));
        assert_eq!(v("1.0.dev4").dev, Some(4));
        assert_eq!(v("1.0rc1.post2.dev3").post, Some(2));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1..0").is_err());
        assert!(Version::parse(">=1").is_err());
        assert!(Version::parse("1.0.x").is_err());
        assert!(Version::parse("1.0post").is_err());
        assert!(Version::parse("a1").is_err());
    }

    #[test]
    fn test_zero_padding_equality() {
        assert_eq!(v("1.0"), v("1.0").clone());
        assert_eq!(v("1.0").cmp(&v("1.0.0")), Ordering::Equal);
        assert_eq!(v("1").cmp(&v("1.0.0.0")), Ordering::Equal);
    }

    #[test]
    fn test_pep440_ordering() {
        let ordered = [
            "1.0.dev1", "1.0a1", "1.0a2", "1.0b1", "1.0rc1", "1.0", "1.0.post1",
            "1.0.1", "1.1", "2!0.1",
        ];
        for pair in ordered.windows(2) {
            assert!(
                v(pair[0]) < v(pair[1]),
                "expected {} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_dev_sorts_below_its_anchor() {
        assert!(v("1.0a1.dev1") < v("1.0a1"));
        assert!(v("1.0.post1.dev1") < v("1.0.post1"));
        assert!(v("1.0.post1.dev1") > v("1.0"));
    }

    #[test]
    fn test_wildcard_upper() {
        assert_eq!(Version::wildcard_upper(&[1, 5]), v("1.6"));
        assert_eq!(Version::wildcard_upper(&[0]), v("1"));
    }

    #[test]
    fn test_compatible_upper() {
        assert_eq!(v("1.4.2").compatible_upper(), Some(v("1.5")));
        assert_eq!(v("2.2").compatible_upper(), Some(v("3")));
        assert_eq!(v("2").compatible_upper(), None);
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["1.0", "2!1.2.3", "1.0a1", "1.0.post2", "1.0rc1.dev3"] {
            assert_eq!(v(text).to_string(), text);
        }
    }

    fn version_strategy() -> impl Strategy<Value = Version> {
        (
            proptest::collection::vec(0u64..50, 1..4),
            proptest::option::of((
                prop_oneof![
                    Just(PreRelease::Alpha),
                    Just(PreRelease::Beta),
                    Just(PreRelease::Rc)
                ],
                0u64..9,
            )),
            proptest::option::of(0u64..9),
            proptest::option::of(0u64..9),
        )
            .prop_map(|(release, pre, post, dev)| Version {
                epoch: 0,
                release,
                pre,
                post,
                dev,
            })
    }

    proptest! {
        #[test]
        fn property_display_parse_roundtrip(version in version_strategy()) {
            let reparsed = Version::parse(&version.to_string()).unwrap();
            prop_assert_eq!(reparsed.cmp(&version), Ordering::Equal);
        }

        #[test]
        fn property_ordering_is_total_and_antisymmetric(
            a in version_strategy(),
            b in version_strategy()
        ) {
            match a.cmp(&b) {
                Ordering::Less => prop_assert_eq!(b.cmp(&a), Ordering::Greater),
                Ordering::Greater => prop_assert_eq!(b.cmp(&a), Ordering::Less),
                Ordering::Equal => prop_assert_eq!(b.cmp(&a), Ordering::Equal),
            }
        }
    }
}
