use std::sync::Arc;

use crate::{
    compose::{
        result::{ResultBuffer, ResultView},
        settings::CompositeSettings,
    },
    engine::{
        api::{CompositeEngine, EngineFactory, GroupProvider, MergeMode, ProcessGroup},
        loopback::LoopbackMember,
    },
    foundation::{
        core::{Position, ProcessId, TileGeometry, checked_len},
        error::{CompositeError, CompositeResult},
    },
    order::visibility::compute_order,
    registry::centroids::CentroidRegistry,
};

/// Lifecycle state of a [`CompositeContext`].
///
/// The transient compositing phase is not represented: a composite call holds `&mut self`
/// for its whole duration, so nothing else can observe or re-enter the context meanwhile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Ready,
}

/// Mode-specific input of a composite call.
#[derive(Clone, Copy, Debug)]
pub enum CompositeMode<'a> {
    /// Color-only blend in distance order from `camera`.
    Flat { camera: Position },
    /// Color plus depth, `layers` images per process. Ordering is left to the engine's depth test.
    Layered { depth: &'a [f32], layers: u32 },
}

impl CompositeMode<'_> {
    pub fn merge_mode(&self) -> MergeMode {
        match self {
            Self::Flat { .. } => MergeMode::Blend,
            Self::Layered { .. } => MergeMode::ZBuffer,
        }
    }
}

struct Session {
    group: Arc<dyn ProcessGroup>,
    engine: Box<dyn CompositeEngine>,
    tile: TileGeometry,
}

/// Per-process compositing orchestrator.
///
/// Owns the centroid registry, the engine session and the root's result buffer. Create one per
/// participating process, call [`setup`](Self::setup) once, then composite every frame.
///
/// Composite calls are collective: every rank of the group must issue the same sequence of
/// `composite_*` calls, with matching modes, or the engine blocks indefinitely. There is no
/// timeout or cancellation. A call that fails validation before reaching the engine (bad
/// buffer sizes, a missing centroid) leaves the other ranks waiting in that merge.
pub struct CompositeContext {
    groups: Box<dyn GroupProvider>,
    engines: Box<dyn EngineFactory>,
    settings: CompositeSettings,
    registry: CentroidRegistry,
    session: Option<Session>,
    result: ResultBuffer,
}

impl CompositeContext {
    pub fn new(
        groups: Box<dyn GroupProvider>,
        engines: Box<dyn EngineFactory>,
        settings: CompositeSettings,
    ) -> Self {
        Self {
            groups,
            engines,
            settings,
            registry: CentroidRegistry::new(),
            session: None,
            result: ResultBuffer::new(),
        }
    }

    /// Context backed by one rank of an in-process loopback group.
    pub fn with_loopback(member: LoopbackMember, settings: CompositeSettings) -> Self {
        Self::new(Box::new(member.clone()), Box::new(member), settings)
    }

    pub fn state(&self) -> ContextState {
        if self.session.is_some() {
            ContextState::Ready
        } else {
            ContextState::Uninitialized
        }
    }

    pub fn settings(&self) -> &CompositeSettings {
        &self.settings
    }

    pub fn registry(&self) -> &CentroidRegistry {
        &self.registry
    }

    /// This process's rank, once set up.
    pub fn rank(&self) -> Option<ProcessId> {
        self.session.as_ref().map(|s| s.group.rank())
    }

    pub fn group_size(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.group.size())
    }

    pub fn tile(&self) -> Option<TileGeometry> {
        self.session.as_ref().map(|s| s.tile)
    }

    /// Bind to the process group and configure a single `width x height` output tile.
    ///
    /// Without a group this logs a warning and returns [`CompositeError::MissingGroup`]; the
    /// context keeps its previous state and `setup` may be retried. Calling `setup` on a ready
    /// context releases the current engine session and opens a new one.
    pub fn setup(&mut self, width: u32, height: u32) -> CompositeResult<()> {
        let tile = TileGeometry::at_origin(width, height)?;
        self.settings.validate()?;

        let Some(group) = self.groups.group() else {
            tracing::warn!("no process group available; context stays uninitialized");
            return Err(CompositeError::MissingGroup);
        };

        if self.session.take().is_some() {
            tracing::debug!("releasing previous engine session");
        }

        let mut engine = self.engines.create_session(Arc::clone(&group))?;
        engine.set_diagnostics(self.settings.diagnostics);
        engine.configure_tile(tile)?;

        tracing::debug!(
            rank = %group.rank(),
            size = group.size(),
            width,
            height,
            "composite context ready"
        );
        self.session = Some(Session {
            group,
            engine,
            tile,
        });
        Ok(())
    }

    /// Insert or overwrite the spatial anchor of process `id`.
    pub fn set_centroid(&mut self, id: ProcessId, position: Position) {
        self.registry.set_centroid(id, position);
    }

    /// Register anchors for ranks `0..n` in sequence.
    pub fn set_centroids<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = Position>,
    {
        self.registry.set_centroids(positions);
    }

    /// Visibility order for `camera` over the whole group. Requires a ready context.
    pub fn visibility_order(&self, camera: Position) -> CompositeResult<Vec<ProcessId>> {
        let size = self.group_size().ok_or(CompositeError::InvalidContext)?;
        compute_order(camera, &self.registry, size)
    }

    /// Color-only composite, blended nearest-first by distance from `camera`.
    pub fn composite_flat(
        &mut self,
        color: &[u8],
        camera: Position,
        width: u32,
        height: u32,
    ) -> CompositeResult<ResultView<'_>> {
        self.composite(color, width, height, CompositeMode::Flat { camera })
    }

    /// Depth-aware composite of `layers` color+depth images per process.
    pub fn composite_layered(
        &mut self,
        color: &[u8],
        depth: &[f32],
        width: u32,
        height: u32,
        layers: u32,
    ) -> CompositeResult<ResultView<'_>> {
        self.composite(color, width, height, CompositeMode::Layered { depth, layers })
    }

    /// Run one collective composite.
    ///
    /// On the root rank the result view covers `width * height * 4` bytes and stays valid until
    /// the next composite call; every other rank receives [`ResultView::empty`].
    #[tracing::instrument(skip(self, color, mode), fields(merge = ?mode.merge_mode()))]
    pub fn composite(
        &mut self,
        color: &[u8],
        width: u32,
        height: u32,
        mode: CompositeMode<'_>,
    ) -> CompositeResult<ResultView<'_>> {
        let Some(session) = self.session.as_mut() else {
            tracing::error!("composite called before a successful setup");
            return Err(CompositeError::InvalidContext);
        };

        let tile = session.tile;
        if (width, height) != (tile.width, tile.height) {
            return Err(CompositeError::validation(format!(
                "frame size {width}x{height} does not match configured tile {}x{}",
                tile.width, tile.height
            )));
        }

        let frame_len = tile.rgba8_len()?;
        match mode {
            CompositeMode::Flat { camera } => {
                expect_len("color", color.len(), frame_len)?;
                let order = compute_order(camera, &self.registry, session.group.size())
                    .inspect_err(|e| {
                        tracing::error!("cannot compute visibility order: {e}");
                    })?;
                tracing::debug!(?order, "visibility order");

                let engine = &mut session.engine;
                engine.configure_pipeline(&self.settings.pipeline(MergeMode::Blend))?;
                engine.set_merge_order(&order)?;
                engine.merge_flat(color)?;
            }
            CompositeMode::Layered { depth, layers } => {
                if layers == 0 {
                    return Err(CompositeError::validation(
                        "layered composite needs at least one layer",
                    ));
                }
                let n = layers as usize;
                expect_len("color", color.len(), checked_len(&[frame_len, n])?)?;
                expect_len("depth", depth.len(), checked_len(&[tile.pixel_count()?, n])?)?;

                let engine = &mut session.engine;
                engine.configure_pipeline(&self.settings.pipeline(MergeMode::ZBuffer))?;
                engine.merge_layered(color, depth, layers)?;
            }
        }

        let rank = session.group.rank();
        if rank != session.group.root() {
            return Ok(ResultView::empty());
        }

        let len = frame_len;
        let Some(pixels) = session.engine.root_result() else {
            tracing::error!(%rank, "engine returned no color data on root");
            return Err(CompositeError::EngineResultUnavailable { rank });
        };
        if pixels.len() < len {
            return Err(CompositeError::engine(format!(
                "engine result is {} bytes, expected {len}",
                pixels.len()
            )));
        }

        self.result.write(&pixels[..len]);
        Ok(self.result.view(len))
    }
}

fn expect_len(what: &str, got: usize, want: usize) -> CompositeResult<()> {
    if got != want {
        return Err(CompositeError::validation(format!(
            "{what} buffer has {got} elements, expected {want}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/compose/context.rs"]
mod tests;
