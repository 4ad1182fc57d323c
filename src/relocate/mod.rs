pub mod remapper;

use crate::error::RepackError;
use crate::pattern::{PathPattern, REGEX_PREFIX};

pub use remapper::SymbolRemapper;

const CLASS_SUFFIX: &str = ".class";
const DEFAULT_TARGET_PREFIX: &str = "hidden";

/// A single namespace rename rule, e.g. `org.antlr.v4 -> com.acme.antlr4`.
///
/// The dotted and slash forms of both prefixes are derived once at
/// construction and never change afterwards. Includes and excludes match the
/// full slash-separated path (without `.class`), so sub-packages can be carved
/// out of a broader relocation.
#[derive(Debug, Clone)]
pub struct Relocator {
    pattern: String,
    path_pattern: String,
    relocated_pattern: String,
    relocated_path_pattern: String,
    includes: Vec<PathPattern>,
    excludes: Vec<PathPattern>,
}

impl Relocator {
    /// Creates a rule moving `pattern` to `relocated`, or to `hidden.<pattern>`
    /// when no destination is given.
    pub fn new(pattern: &str, relocated: Option<&str>) -> Self {
        let (relocated_pattern, relocated_path_pattern) = match relocated {
            Some(target) => (target.replace('/', "."), target.replace('.', "/")),
            None => (
                format!("{DEFAULT_TARGET_PREFIX}.{}", pattern.replace('/', ".")),
                format!("{DEFAULT_TARGET_PREFIX}/{}", pattern.replace('.', "/")),
            ),
        };

        Self {
            pattern: pattern.replace('/', "."),
            path_pattern: pattern.replace('.', "/"),
            relocated_pattern,
            relocated_path_pattern,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn with_filters<S: AsRef<str>>(
        pattern: &str,
        relocated: Option<&str>,
        includes: &[S],
        excludes: &[S],
    ) -> Result<Self, RepackError> {
        let mut relocator = Self::new(pattern, relocated);
        for include in includes {
            relocator.include(include.as_ref())?;
        }
        for exclude in excludes {
            relocator.exclude(exclude.as_ref())?;
        }
        Ok(relocator)
    }

    pub fn include(&mut self, pattern: &str) -> Result<&mut Self, RepackError> {
        add_normalized(&mut self.includes, pattern)?;
        Ok(self)
    }

    pub fn exclude(&mut self, pattern: &str) -> Result<&mut Self, RepackError> {
        add_normalized(&mut self.excludes, pattern)?;
        Ok(self)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    pub fn relocated_pattern(&self) -> &str {
        &self.relocated_pattern
    }

    pub fn relocated_path_pattern(&self) -> &str {
        &self.relocated_path_pattern
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(PathPattern::as_str)
    }

    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.excludes.iter().map(PathPattern::as_str)
    }

    pub fn can_relocate_path(&self, path: &str) -> bool {
        // cheap length check before any matching
        if path.len() < self.path_pattern.len() {
            return false;
        }

        let path = match path.strip_suffix(CLASS_SUFFIX) {
            Some("") => return false,
            Some(stem) => stem,
            None => path,
        };

        let starts_with_pattern = match path.strip_prefix('/') {
            Some(rest) => rest.starts_with(&self.path_pattern),
            None => path.starts_with(&self.path_pattern),
        };

        starts_with_pattern && self.is_included(path) && !self.is_excluded(path)
    }

    pub fn can_relocate_class(&self, class_name: &str) -> bool {
        !class_name.contains('/') && self.can_relocate_path(&class_name.replace('.', "/"))
    }

    pub fn relocate_path(&self, path: &str) -> String {
        path.replacen(&self.path_pattern, &self.relocated_path_pattern, 1)
    }

    pub fn relocate_class(&self, class_name: &str) -> String {
        class_name.replacen(&self.pattern, &self.relocated_pattern, 1)
    }

    fn is_included(&self, path: &str) -> bool {
        self.includes.is_empty() || self.includes.iter().any(|p| p.matches(path))
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|p| p.matches(path))
    }
}

fn add_normalized(patterns: &mut Vec<PathPattern>, pattern: &str) -> Result<(), RepackError> {
    if pattern.starts_with(REGEX_PREFIX) {
        return push_unique(patterns, pattern);
    }

    let class_pattern = pattern.replace('.', "/");
    push_unique(patterns, &class_pattern)?;

    // `a/b/*` also covers the package directory `a/b` itself
    if class_pattern.ends_with("/*") {
        if let Some(slash) = class_pattern.rfind('/') {
            push_unique(patterns, &class_pattern[..slash])?;
        }
    }
    Ok(())
}

fn push_unique(patterns: &mut Vec<PathPattern>, pattern: &str) -> Result<(), RepackError> {
    if !patterns.iter().any(|p| p.as_str() == pattern) {
        patterns.push(PathPattern::new(pattern)?);
    }
    Ok(())
}
