use std::collections::BTreeMap;

use super::{OutputSink, ResourceTransformer, TransformContext};
use crate::error::RepackError;
use crate::pattern::PatternSet;

const SERVICES_PATTERN: &str = "META-INF/services/**";
const GROOVY_EXTENSION_MODULE: &str = "META-INF/services/org.codehaus.groovy.runtime.ExtensionModule";

/// Merges `META-INF/services` provider files from all inputs and relocates
/// both the service names and the provider class names they list.
///
/// Output files are written in sorted key order; within a file, lines keep
/// the order in which inputs were visited.
#[derive(Debug, Clone)]
pub struct ServiceMergeTransformer {
    entries: BTreeMap<String, Vec<String>>,
    services: PatternSet,
    strip_comments: bool,
}

impl Default for ServiceMergeTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMergeTransformer {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            services: PatternSet::from_patterns(&[SERVICES_PATTERN], &[GROOVY_EXTENSION_MODULE]),
            strip_comments: false,
        }
    }

    /// Drops comments and blank lines instead of carrying comments over to
    /// the relocated lines.
    pub fn strip_comments(mut self, strip_comments: bool) -> Self {
        self.strip_comments = strip_comments;
        self
    }

    pub fn include(&mut self, pattern: &str) -> Result<&mut Self, RepackError> {
        self.services.include(pattern)?;
        Ok(self)
    }

    pub fn exclude(&mut self, pattern: &str) -> Result<&mut Self, RepackError> {
        self.services.exclude(pattern)?;
        Ok(self)
    }

    fn read_lines(&self, content: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(content);
        let lines = text.lines().map(str::to_string);

        if !self.strip_comments {
            return lines.collect();
        }

        lines
            .map(|line| match line.find('#') {
                Some(hash) if hash > 0 => line[..hash].trim().to_string(),
                _ => line,
            })
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .collect()
    }
}

impl ResourceTransformer for ServiceMergeTransformer {
    fn name(&self) -> &str {
        "ServiceMergeTransformer"
    }

    fn can_transform_resource(&self, path: &str) -> bool {
        self.services.is_satisfied_by(path)
    }

    fn transform(&mut self, context: TransformContext<'_>) -> Result<(), RepackError> {
        let mut lines = self.read_lines(context.content);
        let mut target_path = context.path.to_string();

        for relocator in context.relocators {
            let service_name = target_path.rsplit('/').next().unwrap_or_default();
            if relocator.can_relocate_class(service_name) {
                target_path = relocator.relocate_class(&target_path);
            }

            for line in lines.iter_mut() {
                let (code, comment) = match line.find('#') {
                    Some(0) => continue,
                    Some(hash) => (
                        line[..hash].trim().to_string(),
                        format!("  # {}", line[hash + 1..].trim()),
                    ),
                    None => (line.clone(), String::new()),
                };

                if relocator.can_relocate_class(&code) {
                    *line = format!("{}{comment}", relocator.relocate_class(&code));
                }
            }
        }

        tracing::debug!("merging service file {} as {target_path}", context.path);
        self.entries.entry(target_path).or_default().extend(lines);
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        !self.entries.is_empty()
    }

    fn flush(&mut self, sink: &mut dyn OutputSink) -> Result<(), RepackError> {
        for (path, lines) in &self.entries {
            if !lines.is_empty() {
                sink.write_entry(path, lines.join("\n").as_bytes())?;
            }
        }
        Ok(())
    }
}
