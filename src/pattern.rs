//! Ant-style path matching over `/`-separated paths.
//!
//! Two pattern families are understood:
//! - globs, where `*` and `?` match within a single segment and `**` matches
//!   any number of segments;
//! - raw regular expressions written as `%regex[...]`, matched against the
//!   whole path.
//!
//! Matching is always case-sensitive, like the classpath.

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use crate::error::RepackError;

pub const REGEX_PREFIX: &str = "%regex[";
const ANT_PREFIX: &str = "%ant[";
const PATTERN_SUFFIX: &str = "]";

#[derive(Debug, Clone)]
pub enum PathPattern {
    Glob {
        source: String,
        rooted: bool,
        matchers: Vec<GlobMatcher>,
    },
    Regex {
        source: String,
        regex: Regex,
    },
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, RepackError> {
        let invalid = |reason: String| RepackError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        if let Some(body) = strip_wrapper(pattern, REGEX_PREFIX) {
            let regex = Regex::new(&format!("^(?:{body})$")).map_err(|e| invalid(e.to_string()))?;
            return Ok(PathPattern::Regex {
                source: pattern.to_string(),
                regex,
            });
        }

        let glob = strip_wrapper(pattern, ANT_PREFIX).unwrap_or(pattern);
        Ok(PathPattern::Glob {
            source: pattern.to_string(),
            rooted: glob.starts_with('/'),
            matchers: ant_matchers(glob).map_err(|e| invalid(e.to_string()))?,
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            PathPattern::Glob { source, .. } | PathPattern::Regex { source, .. } => source,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Regex { regex, .. } => regex.is_match(path),
            PathPattern::Glob {
                rooted, matchers, ..
            } => {
                if *rooted != path.starts_with('/') {
                    return false;
                }
                let path = tokenize(path).collect::<Vec<_>>().join("/");
                matchers.iter().any(|m| m.is_match(&path))
            }
        }
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for PathPattern {}

/// Matches `path` against a glob or `%regex[...]` pattern.
///
/// A regex pattern that does not compile matches nothing.
pub fn matches(pattern: &str, path: &str) -> bool {
    PathPattern::new(pattern).is_ok_and(|p| p.matches(path))
}

fn strip_wrapper<'a>(pattern: &'a str, prefix: &str) -> Option<&'a str> {
    pattern
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(PATTERN_SUFFIX))
}

fn tokenize(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Compiles an Ant pattern into globs over normalized paths.
///
/// Ant only knows `*`, `?` and whole-segment `**`; every other glob
/// metacharacter is literal. A trailing `**` also matches the directory
/// itself, so `org/**` accepts `org`.
fn ant_matchers(pattern: &str) -> Result<Vec<GlobMatcher>, globset::Error> {
    let mut segments: Vec<String> = Vec::new();
    for segment in tokenize(pattern) {
        if segment == "**" {
            if segments.last().is_some_and(|s| s == "**") {
                continue;
            }
            segments.push(segment.to_string());
        } else {
            segments.push(escape_segment(segment));
        }
    }

    let mut globs = vec![segments.join("/")];
    if segments.len() > 1 && segments.last().is_some_and(|s| s == "**") {
        globs.push(segments[..segments.len() - 1].join("/"));
    }

    globs
        .iter()
        .map(|glob| {
            GlobBuilder::new(glob)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map(|g| g.compile_matcher())
        })
        .collect()
}

// Within a segment `**` means the same as `*`.
fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut previous_star = false;
    for c in segment.chars() {
        match c {
            '*' if previous_star => continue,
            '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        previous_star = c == '*';
    }
    out
}

/// Include/exclude pattern set with copy-spec semantics: an element is
/// accepted when it matches some include (or no includes are configured)
/// and matches no exclude.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    includes: Vec<PathPattern>,
    excludes: Vec<PathPattern>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from fixed patterns. A pattern that does not compile is
    /// logged and left out.
    pub fn from_patterns(includes: &[&str], excludes: &[&str]) -> Self {
        Self {
            includes: compile_all(includes),
            excludes: compile_all(excludes),
        }
    }

    pub fn include(&mut self, pattern: &str) -> Result<&mut Self, RepackError> {
        self.includes.push(PathPattern::new(&normalize(pattern))?);
        Ok(self)
    }

    pub fn exclude(&mut self, pattern: &str) -> Result<&mut Self, RepackError> {
        self.excludes.push(PathPattern::new(&normalize(pattern))?);
        Ok(self)
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(PathPattern::as_str)
    }

    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.excludes.iter().map(PathPattern::as_str)
    }

    pub fn is_satisfied_by(&self, path: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|p| p.matches(path));
        included && !self.excludes.iter().any(|p| p.matches(path))
    }
}

fn compile_all(patterns: &[&str]) -> Vec<PathPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match PathPattern::new(&normalize(pattern)) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::error!("{e}");
                None
            }
        })
        .collect()
}

// A trailing slash selects everything below the directory.
fn normalize(pattern: &str) -> String {
    if pattern.ends_with('/') && !pattern.starts_with(REGEX_PREFIX) {
        format!("{pattern}**")
    } else {
        pattern.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_star_stays_in_segment() {
        assert!(matches("org/antlr/*", "org/antlr/Tool"));
        assert!(!matches("org/antlr/*", "org/antlr/v4/Tool"));
        assert!(matches("org/*/v4/Tool", "org/antlr/v4/Tool"));
    }

    #[test]
    fn double_star_crosses_segments() {
        assert!(matches("org/**", "org/antlr/v4/Tool"));
        assert!(matches("org/**/Tool", "org/antlr/v4/Tool"));
        assert!(matches("org/**/Tool", "org/Tool"));
        assert!(matches("**/*.properties", "a/b/c.properties"));
        assert!(!matches("org/**/Tool", "org/antlr/v4/Parser"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        assert!(matches("org/antlr/v?", "org/antlr/v4"));
        assert!(!matches("org/antlr/v?", "org/antlr/v45"));
    }

    #[test]
    fn star_inside_segment() {
        assert!(matches("com/acme/Asm*", "com/acme/AsmAnnotation"));
        assert!(matches("com/acme/*Impl", "com/acme/ToolImpl"));
        assert!(!matches("com/acme/*Impl", "com/acme/ToolImplX"));
        assert!(matches("a*b*c", "aXbYbZc"));
    }

    #[test]
    fn trailing_double_star_matches_the_directory_itself() {
        assert!(matches("org/antlr/**", "org/antlr"));
        assert!(matches("org/antlr/**", "org/antlr/"));
        assert!(!matches("org/antlr/**", "org/antlrx"));
        assert!(matches("**", "anything/at/all"));
    }

    #[test]
    fn glob_metacharacters_outside_ant_are_literal() {
        assert!(matches("lib/[abc].txt", "lib/[abc].txt"));
        assert!(!matches("lib/[abc].txt", "lib/a.txt"));
        assert!(matches("conf/{x,y}.xml", "conf/{x,y}.xml"));
        assert!(!matches("conf/{x,y}.xml", "conf/x.xml"));
    }

    #[test]
    fn double_star_inside_a_segment_acts_as_single_star() {
        assert!(matches("org/a**z", "org/abcz"));
        assert!(!matches("org/a**z", "org/ab/cz"));
        assert!(matches("org/**/**/Tool", "org/Tool"));
    }

    #[test]
    fn ant_wrapper_is_a_plain_glob() {
        assert!(matches("%ant[org/**/Tool]", "org/antlr/Tool"));
        assert!(!matches("%ant[org/*]", "org/antlr/Tool"));
    }

    #[test]
    fn fixed_pattern_sets_skip_invalid_entries() {
        let set = PatternSet::from_patterns(&["META-INF/services/**", "%regex[(]"], &["META-INF/services/x.Y"]);
        assert_eq!(set.includes().collect::<Vec<_>>(), ["META-INF/services/**"]);
        assert!(set.is_satisfied_by("META-INF/services/a.B"));
        assert!(!set.is_satisfied_by("META-INF/services/x.Y"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!matches("org/Antlr/**", "org/antlr/Tool"));
    }

    #[test]
    fn rooted_patterns_only_match_rooted_paths() {
        assert!(!matches("/org/**", "org/antlr"));
        assert!(matches("/org/**", "/org/antlr"));
    }

    #[test]
    fn regex_patterns_match_whole_path() {
        assert!(matches("%regex[org/antlr/v\\d+/.*]", "org/antlr/v4/Tool"));
        assert!(!matches("%regex[antlr]", "org/antlr/v4/Tool"));
    }

    #[test]
    fn invalid_regex_matches_nothing() {
        assert!(!matches("%regex[(]", "("));
        assert!(PathPattern::new("%regex[(]").is_err());
    }

    #[test]
    fn pattern_set_without_includes_accepts_everything_not_excluded() {
        let mut set = PatternSet::new();
        set.exclude("META-INF/maven/**").unwrap();
        assert!(set.is_satisfied_by("META-INF/MANIFEST.MF"));
        assert!(!set.is_satisfied_by("META-INF/maven/org/pom.xml"));
    }

    #[test]
    fn pattern_set_with_includes() {
        let mut set = PatternSet::new();
        set.include("META-INF/services/")
            .unwrap()
            .exclude("META-INF/services/skip.Me")
            .unwrap();
        assert!(set.is_satisfied_by("META-INF/services/a.B"));
        assert!(!set.is_satisfied_by("META-INF/services/skip.Me"));
        assert!(!set.is_satisfied_by("META-INF/MANIFEST.MF"));
        assert_eq!(set.includes().collect::<Vec<_>>(), ["META-INF/services/**"]);
    }
}
