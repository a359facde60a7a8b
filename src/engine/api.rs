use std::sync::Arc;

use crate::foundation::{
    core::{ProcessId, TileGeometry},
    error::CompositeResult,
};

/// Handle to the cooperating process group a context composites with.
pub trait ProcessGroup: Send + Sync {
    /// Rank of the calling process.
    fn rank(&self) -> ProcessId;

    /// Number of processes in the group.
    fn size(&self) -> u32;

    /// Rank that receives the composited image.
    fn root(&self) -> ProcessId {
        ProcessId::ROOT
    }
}

/// Supplies the process group at `setup` time; `None` when no group is available yet.
pub trait GroupProvider {
    fn group(&mut self) -> Option<Arc<dyn ProcessGroup>>;
}

/// Creates composition engine sessions bound to a process group.
pub trait EngineFactory {
    fn create_session(
        &mut self,
        group: Arc<dyn ProcessGroup>,
    ) -> CompositeResult<Box<dyn CompositeEngine>>;
}

/// External image composition engine session.
///
/// `merge_flat` and `merge_layered` are collective: every rank of the group must call the same
/// merge the same number of times, and none returns before the whole group has merged.
/// Dropping the session releases it.
pub trait CompositeEngine {
    fn set_diagnostics(&mut self, level: DiagnosticLevel);

    fn configure_tile(&mut self, tile: TileGeometry) -> CompositeResult<()>;

    fn configure_pipeline(&mut self, config: &PipelineConfig) -> CompositeResult<()>;

    /// Explicit front-to-back merge order, used by ordered blend merges.
    fn set_merge_order(&mut self, order: &[ProcessId]) -> CompositeResult<()>;

    fn merge_flat(&mut self, color: &[u8]) -> CompositeResult<()>;

    fn merge_layered(&mut self, color: &[u8], depth: &[f32], layers: u32) -> CompositeResult<()>;

    /// Composited RGBA8 color of the last merge; only ever `Some` on the root rank.
    fn root_result(&self) -> Option<&[u8]>;
}

/// How the engine combines per-process images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Alpha blending in an explicit visibility order; color only.
    Blend,
    /// Per-pixel nearest-depth selection; color plus float depth.
    ZBuffer,
}

/// Multi-tile strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Sequential,
    Reduce,
    Tree,
}

/// Algorithm used to composite a single tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleImageStrategy {
    #[default]
    RadixK,
    BinaryTree,
    Direct,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    None,
    Errors,
    Warnings,
    Debug,
}

/// Engine diagnostic verbosity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticLevel {
    pub severity: DiagnosticSeverity,
    /// Report from every rank rather than the root only.
    pub all_ranks: bool,
}

impl Default for DiagnosticLevel {
    fn default() -> Self {
        Self {
            severity: DiagnosticSeverity::Warnings,
            all_ranks: true,
        }
    }
}

impl DiagnosticLevel {
    /// Whether `rank` should report a message of `severity`.
    pub fn reports(self, severity: DiagnosticSeverity, rank: ProcessId) -> bool {
        severity != DiagnosticSeverity::None
            && severity <= self.severity
            && (self.all_ranks || rank.is_root())
    }
}

/// Per-merge engine configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    pub mode: MergeMode,
    /// Honor the order passed to [`CompositeEngine::set_merge_order`].
    pub ordered: bool,
    pub strategy: Strategy,
    pub single_image_strategy: SingleImageStrategy,
    /// Straight RGBA in `[0, 1]` for pixels no process covers.
    pub background: [f32; 4],
}

impl PipelineConfig {
    /// Whether merges carry a depth buffer.
    pub fn uses_depth(&self) -> bool {
        self.mode == MergeMode::ZBuffer
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/api.rs"]
mod tests;
