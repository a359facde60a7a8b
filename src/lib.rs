//! sortlast coordinates sort-last compositing across a group of cooperating processes.
//!
//! Every process renders only its own region of a scene. A [`CompositeContext`] per process
//! tracks where each region sits ([`CentroidRegistry`]), derives the order in which the
//! partial images must be blended for a given camera ([`compute_order`]), and drives an external
//! [`CompositeEngine`] to merge them. The coordinating (root) process receives the final image.
//!
//! # Frame flow
//!
//! 1. **Setup** once: bind the process group and configure a `width x height` tile.
//! 2. **Register** anchors with [`CompositeContext::set_centroid`], any number of times.
//! 3. **Composite** every frame, on every rank, in lockstep:
//!    - flat: color only, blended in camera-distance order;
//!    - layered: color + depth, ordered by the engine's depth test.
//!
//! Composite calls are collective and blocking. All ranks must make the same calls in the same
//! order; there is no timeout.
//!
//! The crate ships an in-process [`LoopbackGroup`] engine that runs a whole group on threads,
//! used by the test-suite and the `sortlast` CLI.
#![forbid(unsafe_code)]

mod compose;
mod engine;
mod foundation;
mod order;
mod registry;

pub use compose::context::{CompositeContext, CompositeMode, ContextState};
pub use compose::result::{ResultBuffer, ResultView};
pub use compose::settings::CompositeSettings;
pub use engine::api::{
    CompositeEngine, DiagnosticLevel, DiagnosticSeverity, EngineFactory, GroupProvider,
    MergeMode, PipelineConfig, ProcessGroup, SingleImageStrategy, Strategy,
};
pub use engine::blend::{PremulRgba8, premul_from_f32};
pub use engine::loopback::{LoopbackGroup, LoopbackMember};
pub use foundation::core::{Position, ProcessId, TileGeometry};
pub use foundation::error::{CompositeError, CompositeResult};
pub use order::visibility::compute_order;
pub use registry::centroids::CentroidRegistry;
