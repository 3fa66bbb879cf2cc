//! Search patterns and stage matching
//!
//! A search stage is an ordered chain of glob patterns. The chain is written
//! on the command line as a single token with alternatives separated by `>`,
//! e.g. `*.flac>*.ogg>*.mp3`. Matching a set of URLs against a stage returns
//! the URLs selected by the first pattern that selects anything.
//!
//! Patterns are matched against the percent-decoded final path segment of a
//! URL. Query strings and fragments are ignored and matching is
//! case-sensitive.

mod glob;

pub use glob::matches_glob;

use crate::PatternError;
use std::collections::BTreeSet;
use std::fmt;
use url::Url;

/// Separator between alternatives of a fallback chain
pub const FALLBACK_SEPARATOR: char = '>';

/// A single glob pattern applied to a URL's final path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern(String);

impl Pattern {
    /// Parses one glob pattern
    ///
    /// Patterns apply to a single path segment, so `/` is rejected.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if raw.contains('/') {
            return Err(PatternError::InvalidCharacter {
                pattern: raw.to_string(),
                ch: '/',
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the pattern text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the URL's match subject satisfies this pattern
    pub fn matches(&self, url: &Url) -> bool {
        matches_glob(&self.0, &match_subject(url))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One traversal stage: a pattern plus its ordered fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStage {
    patterns: Vec<Pattern>,
}

/// Which pattern of a chain produced a selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Matched URLs
    pub urls: BTreeSet<Url>,
    /// Index into the chain of the pattern that matched, if any did
    pub pattern_index: Option<usize>,
}

impl Selection {
    /// Returns true if a pattern other than the primary one matched
    pub fn used_fallback(&self) -> bool {
        matches!(self.pattern_index, Some(i) if i > 0)
    }
}

impl SearchStage {
    /// Builds a stage from an already-parsed chain
    pub fn new(patterns: Vec<Pattern>) -> Result<Self, PatternError> {
        if patterns.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Self { patterns })
    }

    /// The patterns in priority order
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// The primary pattern of the chain
    pub fn primary(&self) -> &Pattern {
        &self.patterns[0]
    }

    /// Returns true if the stage has fallback alternatives
    pub fn has_fallback(&self) -> bool {
        self.patterns.len() > 1
    }

    /// Selects the URLs matched by the first pattern that matches anything
    ///
    /// Later patterns in the chain are not consulted once one matches. If no
    /// pattern matches, the selection is empty.
    pub fn select_with_pattern<'a, I>(&self, urls: I) -> Selection
    where
        I: IntoIterator<Item = &'a Url>,
    {
        let candidates: Vec<&Url> = urls.into_iter().collect();

        for (index, pattern) in self.patterns.iter().enumerate() {
            let matched: BTreeSet<Url> = candidates
                .iter()
                .filter(|url| pattern.matches(url))
                .map(|url| (*url).clone())
                .collect();

            if !matched.is_empty() {
                return Selection {
                    urls: matched,
                    pattern_index: Some(index),
                };
            }
        }

        Selection {
            urls: BTreeSet::new(),
            pattern_index: None,
        }
    }

    /// Selects matching URLs, discarding which pattern won
    pub fn select<'a, I>(&self, urls: I) -> BTreeSet<Url>
    where
        I: IntoIterator<Item = &'a Url>,
    {
        self.select_with_pattern(urls).urls
    }
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.patterns.iter().map(Pattern::as_str).collect();
        f.write_str(&parts.join(">"))
    }
}

/// Parses one `--search` token into a stage
///
/// # Examples
///
/// ```
/// use recursive_dl::pattern::parse_stage;
///
/// let stage = parse_stage("*.flac > *.mp3").unwrap();
/// assert_eq!(stage.patterns().len(), 2);
/// assert_eq!(stage.to_string(), "*.flac>*.mp3");
///
/// assert!(parse_stage("*.flac>").is_err());
/// ```
pub fn parse_stage(token: &str) -> Result<SearchStage, PatternError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(PatternError::Empty);
    }

    let patterns = token
        .split(FALLBACK_SEPARATOR)
        .map(|alt| {
            if alt.trim().is_empty() {
                Err(PatternError::EmptyAlternative(token.to_string()))
            } else {
                Pattern::parse(alt)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    SearchStage::new(patterns)
}

/// Parses every `--search` token, in order, into stages
pub fn parse_stages<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<SearchStage>, PatternError> {
    if tokens.is_empty() {
        return Err(PatternError::Empty);
    }
    tokens.iter().map(|t| parse_stage(t.as_ref())).collect()
}

/// Returns the string a pattern is matched against
///
/// This is the last segment of the URL path, percent-decoded. A path ending
/// in `/` yields an empty subject.
pub fn match_subject(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
