//! Resource transformers: plug-ins that claim non-class resources, buffer or
//! discard them during the pass and write their accumulated output once all
//! inputs have been read.

pub mod filter;
pub mod service;

use crate::error::RepackError;
use crate::relocate::Relocator;

pub use filter::FilterTransformer;
pub use service::ServiceMergeTransformer;

/// What a transformer gets to see of a claimed resource.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Resource path after relocation.
    pub path: &'a str,
    pub content: &'a [u8],
    pub relocators: &'a [Relocator],
}

/// Destination for entries written by [`ResourceTransformer::flush`].
pub trait OutputSink {
    fn write_entry(&mut self, path: &str, content: &[u8]) -> Result<(), RepackError>;
}

/// Collects flushed entries in memory, in write order.
impl OutputSink for Vec<(String, Vec<u8>)> {
    fn write_entry(&mut self, path: &str, content: &[u8]) -> Result<(), RepackError> {
        self.push((path.to_string(), content.to_vec()));
        Ok(())
    }
}

pub trait ResourceTransformer {
    fn name(&self) -> &str;

    /// Whether this transformer claims the resource at `path` (the path as
    /// found in the input, before relocation).
    fn can_transform_resource(&self, path: &str) -> bool;

    fn transform(&mut self, context: TransformContext<'_>) -> Result<(), RepackError>;

    fn has_transformed_resource(&self) -> bool;

    /// Called once, after every input has been consumed, when
    /// [`has_transformed_resource`](Self::has_transformed_resource) is true.
    fn flush(&mut self, sink: &mut dyn OutputSink) -> Result<(), RepackError>;
}

impl std::fmt::Debug for dyn ResourceTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResourceTransformer").field(&self.name()).finish()
    }
}
