//! Class-name exclusion: dotted patterns such as `com.acme.internal.**`
//! compiled to path regexes matched against entry paths.

use regex::Regex;

use super::split_versions_prefix;

const KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final", "finally",
    "float", "for", "if", "goto", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "null", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "void", "volatile", "while",
];

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// `true` for dotted names like `org.antlr.v4.Tool` whose parts are all
/// identifiers and none is a reserved word.
pub fn is_fully_qualified_classname(name: &str) -> bool {
    name.split('.').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) => {
                !KEYWORDS.contains(&part) && is_identifier_start(first) && chars.all(is_identifier_part)
            }
            None => false,
        }
    })
}

pub fn is_classname_pattern(pattern: &str) -> bool {
    !pattern.contains("***") && is_fully_qualified_classname(&pattern.replace('*', "X"))
}

/// Translates a class-name pattern to an anchored path regex:
/// `**` spans packages, `*` stays within one, `.` becomes `/`.
pub fn classname_pattern_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut regex = String::from(r"\A");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                regex.push_str(r"(.*\??)");
            }
            '*' => regex.push_str("([^/]+)"),
            '$' => regex.push_str(r"\$"),
            '.' => regex.push('/'),
            other => regex.push(other),
        }
    }

    regex.push_str(r"\z");
    Regex::new(&regex)
}

/// The compiled set of class exclusions.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<(String, Regex)>,
}

impl ExcludeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut filter = Self::new();
        for pattern in patterns {
            filter.add(pattern.as_ref());
        }
        filter
    }

    /// Adds a pattern. An implausible pattern is reported and skipped; the
    /// remaining patterns still apply.
    pub fn add(&mut self, pattern: &str) -> bool {
        if !is_classname_pattern(pattern) {
            tracing::error!("exclusion classname pattern '{pattern}' is not valid");
            return false;
        }

        match classname_pattern_regex(pattern) {
            Ok(regex) => {
                self.patterns.push((pattern.to_string(), regex));
                true
            }
            Err(e) => {
                tracing::error!("exclusion classname pattern '{pattern}' is not valid: {e}");
                false
            }
        }
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(p, _)| p.as_str())
    }

    /// Matches an entry path. Any `META-INF/versions/<n>/` prefix and a
    /// `.class` suffix are ignored.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let (_, path) = split_versions_prefix(path);
        let stem = path.strip_suffix(".class").unwrap_or(path);

        self.patterns.iter().any(|(_, regex)| regex.is_match(stem))
    }
}
