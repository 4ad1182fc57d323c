use super::{OutputSink, ResourceTransformer, TransformContext};
use crate::error::RepackError;
use crate::pattern::PatternSet;

/// Drops resources rejected by its pattern set.
///
/// The transformer claims exactly the resources the set does *not* accept
/// and then discards them, so they never reach the output.
#[derive(Debug, Clone, Default)]
pub struct FilterTransformer {
    filter: PatternSet,
}

impl FilterTransformer {
    pub fn new(filter: PatternSet) -> Self {
        Self { filter }
    }

    pub fn filter_mut(&mut self) -> &mut PatternSet {
        &mut self.filter
    }
}

impl ResourceTransformer for FilterTransformer {
    fn name(&self) -> &str {
        "FilterTransformer"
    }

    fn can_transform_resource(&self, path: &str) -> bool {
        !self.filter.is_satisfied_by(path)
    }

    fn transform(&mut self, context: TransformContext<'_>) -> Result<(), RepackError> {
        tracing::debug!("dropping filtered resource {}", context.path);
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        false
    }

    fn flush(&mut self, _sink: &mut dyn OutputSink) -> Result<(), RepackError> {
        Ok(())
    }
}
