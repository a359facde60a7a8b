//! In-process composition engine and process group.
//!
//! Each [`LoopbackMember`] stands in for one rank; run each member's context on its own thread.
//! Merges are genuinely collective: a rank blocks in `merge_*` until every rank has merged.

use std::sync::{Arc, Barrier, Mutex};

use crate::{
    engine::{
        api::{
            CompositeEngine, DiagnosticLevel, DiagnosticSeverity, EngineFactory, GroupProvider,
            MergeMode, PipelineConfig, ProcessGroup,
        },
        blend::{blend_front_to_back, fill, premul_from_f32},
    },
    foundation::{
        core::{ProcessId, TileGeometry, checked_len},
        error::{CompositeError, CompositeResult},
    },
};

/// Factory for the members of one simulated group.
pub struct LoopbackGroup;

impl LoopbackGroup {
    /// Create `size` members sharing one collective hub, in rank order.
    pub fn new(size: u32) -> CompositeResult<Vec<LoopbackMember>> {
        if size == 0 {
            return Err(CompositeError::validation(
                "loopback group needs at least one rank",
            ));
        }
        let hub = Arc::new(Hub {
            size,
            barrier: Barrier::new(size as usize),
            state: Mutex::new(HubState {
                slots: (0..size).map(|_| None).collect(),
                failure: None,
            }),
        });
        Ok((0..size)
            .map(|r| LoopbackMember {
                hub: Arc::clone(&hub),
                rank: ProcessId(r),
            })
            .collect())
    }
}

/// One rank of a loopback group; serves as both group provider and engine factory.
#[derive(Clone)]
pub struct LoopbackMember {
    hub: Arc<Hub>,
    rank: ProcessId,
}

impl LoopbackMember {
    pub fn rank(&self) -> ProcessId {
        self.rank
    }
}

impl GroupProvider for LoopbackMember {
    fn group(&mut self) -> Option<Arc<dyn ProcessGroup>> {
        Some(Arc::new(LoopbackRank {
            rank: self.rank,
            size: self.hub.size,
        }))
    }
}

impl EngineFactory for LoopbackMember {
    fn create_session(
        &mut self,
        group: Arc<dyn ProcessGroup>,
    ) -> CompositeResult<Box<dyn CompositeEngine>> {
        if group.rank() != self.rank || group.size() != self.hub.size {
            return Err(CompositeError::engine(format!(
                "group (rank {}, size {}) does not belong to loopback member {} of {}",
                group.rank(),
                group.size(),
                self.rank,
                self.hub.size
            )));
        }
        Ok(Box::new(LoopbackEngine {
            hub: Arc::clone(&self.hub),
            rank: self.rank,
            root: group.root(),
            diagnostics: DiagnosticLevel::default(),
            tile: None,
            pipeline: None,
            order: None,
            result: Vec::new(),
            has_result: false,
        }))
    }
}

#[derive(Debug)]
struct LoopbackRank {
    rank: ProcessId,
    size: u32,
}

impl ProcessGroup for LoopbackRank {
    fn rank(&self) -> ProcessId {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }
}

struct Hub {
    size: u32,
    barrier: Barrier,
    state: Mutex<HubState>,
}

struct HubState {
    slots: Vec<Option<Contribution>>,
    failure: Option<String>,
}

struct Contribution {
    tile: TileGeometry,
    pipeline: PipelineConfig,
    order: Option<Vec<ProcessId>>,
    color: Vec<u8>,
    depth: Vec<f32>,
    layers: u32,
}

struct LoopbackEngine {
    hub: Arc<Hub>,
    rank: ProcessId,
    root: ProcessId,
    diagnostics: DiagnosticLevel,
    tile: Option<TileGeometry>,
    pipeline: Option<PipelineConfig>,
    order: Option<Vec<ProcessId>>,
    result: Vec<u8>,
    has_result: bool,
}

impl LoopbackEngine {
    fn contribution(
        &self,
        color: &[u8],
        depth: &[f32],
        layers: u32,
    ) -> CompositeResult<Contribution> {
        let tile = self
            .tile
            .ok_or_else(|| CompositeError::engine("merge before configure_tile"))?;
        let pipeline = self
            .pipeline
            .ok_or_else(|| CompositeError::engine("merge before configure_pipeline"))?;
        Ok(Contribution {
            tile,
            pipeline,
            order: self.order.clone(),
            color: color.to_vec(),
            depth: depth.to_vec(),
            layers,
        })
    }

    fn collective_merge(&mut self, contribution: Contribution) -> CompositeResult<()> {
        self.has_result = false;
        {
            let mut state = self.hub.lock()?;
            state.slots[self.rank.index()] = Some(contribution);
        }

        self.hub.barrier.wait();

        if self.rank == self.root {
            let mut state = self.hub.lock()?;
            let slots: Vec<Option<Contribution>> =
                state.slots.iter_mut().map(Option::take).collect();
            match merge_slots(&slots, self.hub.size) {
                Ok(pixels) => {
                    self.result = pixels;
                    self.has_result = true;
                    state.failure = None;
                }
                Err(msg) => state.failure = Some(msg),
            }
        }

        self.hub.barrier.wait();

        let failure = self.hub.lock()?.failure.clone();
        if let Some(msg) = failure {
            if self.diagnostics.reports(DiagnosticSeverity::Errors, self.rank) {
                tracing::error!(rank = %self.rank, "loopback merge failed: {msg}");
            }
            return Err(CompositeError::engine(msg));
        }
        if self.diagnostics.reports(DiagnosticSeverity::Debug, self.rank) {
            tracing::debug!(
                rank = %self.rank,
                has_result = self.has_result,
                "loopback merge complete"
            );
        }
        Ok(())
    }
}

impl Hub {
    fn lock(&self) -> CompositeResult<std::sync::MutexGuard<'_, HubState>> {
        self.state
            .lock()
            .map_err(|_| CompositeError::engine("loopback hub poisoned by a panicked rank"))
    }
}

impl CompositeEngine for LoopbackEngine {
    fn set_diagnostics(&mut self, level: DiagnosticLevel) {
        self.diagnostics = level;
    }

    fn configure_tile(&mut self, tile: TileGeometry) -> CompositeResult<()> {
        if tile.x != 0 || tile.y != 0 {
            return Err(CompositeError::engine(
                "loopback engine only supports a tile at the origin",
            ));
        }
        self.tile = Some(tile);
        Ok(())
    }

    fn configure_pipeline(&mut self, config: &PipelineConfig) -> CompositeResult<()> {
        if self.diagnostics.reports(DiagnosticSeverity::Debug, self.rank) {
            tracing::debug!(
                rank = %self.rank,
                mode = ?config.mode,
                strategy = ?config.strategy,
                single_image_strategy = ?config.single_image_strategy,
                "loopback pipeline configured"
            );
        }
        self.pipeline = Some(*config);
        Ok(())
    }

    fn set_merge_order(&mut self, order: &[ProcessId]) -> CompositeResult<()> {
        if !is_permutation(order, self.hub.size) {
            return Err(CompositeError::engine(format!(
                "merge order {order:?} is not a permutation of 0..{}",
                self.hub.size
            )));
        }
        self.order = Some(order.to_vec());
        Ok(())
    }

    fn merge_flat(&mut self, color: &[u8]) -> CompositeResult<()> {
        let c = self.contribution(color, &[], 1)?;
        self.collective_merge(c)
    }

    fn merge_layered(&mut self, color: &[u8], depth: &[f32], layers: u32) -> CompositeResult<()> {
        let c = self.contribution(color, depth, layers)?;
        self.collective_merge(c)
    }

    fn root_result(&self) -> Option<&[u8]> {
        self.has_result.then_some(self.result.as_slice())
    }
}

fn is_permutation(order: &[ProcessId], size: u32) -> bool {
    if order.len() != size as usize {
        return false;
    }
    let mut seen = vec![false; size as usize];
    for id in order {
        match seen.get_mut(id.index()) {
            Some(s) if !*s => *s = true,
            _ => return false,
        }
    }
    true
}

fn merge_slots(slots: &[Option<Contribution>], size: u32) -> Result<Vec<u8>, String> {
    let parts: Vec<&Contribution> = slots
        .iter()
        .enumerate()
        .map(|(r, s)| {
            s.as_ref()
                .ok_or_else(|| format!("rank {r} did not contribute"))
        })
        .collect::<Result<_, _>>()?;
    let first = parts[0];
    for (r, p) in parts.iter().enumerate() {
        if p.tile != first.tile
            || p.pipeline.mode != first.pipeline.mode
            || p.layers != first.layers
        {
            return Err(format!(
                "rank {r} merged with {:?}/{}x{}/{} layers, rank 0 with {:?}/{}x{}/{} layers",
                p.pipeline.mode,
                p.tile.width,
                p.tile.height,
                p.layers,
                first.pipeline.mode,
                first.tile.width,
                first.tile.height,
                first.layers
            ));
        }
    }

    let blend_order = match (first.pipeline.mode, first.pipeline.ordered) {
        (MergeMode::Blend, true) => {
            let order = first
                .order
                .as_ref()
                .ok_or("ordered blend requested but rank 0 set no merge order")?;
            for (r, p) in parts.iter().enumerate() {
                if !p.pipeline.ordered || p.order.as_ref() != Some(order) {
                    return Err(format!(
                        "rank {r} merge order {:?} differs from rank 0 order {order:?}",
                        p.order.as_deref().unwrap_or_default()
                    ));
                }
            }
            order.clone()
        }
        _ => (0..size).map(ProcessId).collect(),
    };

    let tile = first.tile;
    let layers = first.layers as usize;
    let frame_len = tile.rgba8_len().map_err(|e| e.to_string())?;
    let pixels = tile.pixel_count().map_err(|e| e.to_string())?;
    let color_len = checked_len(&[frame_len, layers]).map_err(|e| e.to_string())?;
    let depth_len = checked_len(&[pixels, layers]).map_err(|e| e.to_string())?;
    for (r, p) in parts.iter().enumerate() {
        if p.color.len() != color_len {
            return Err(format!(
                "rank {r} color buffer is {} bytes, expected {color_len}",
                p.color.len()
            ));
        }
        if first.pipeline.mode == MergeMode::ZBuffer && p.depth.len() != depth_len {
            return Err(format!(
                "rank {r} depth buffer has {} values, expected {depth_len}",
                p.depth.len()
            ));
        }
    }

    let background = premul_from_f32(first.pipeline.background);
    let mut out = vec![0u8; frame_len];
    fill(&mut out, background);

    match first.pipeline.mode {
        MergeMode::Blend => {
            let images: Vec<&[u8]> = blend_order
                .iter()
                .map(|id| parts[id.index()].color.as_slice())
                .collect();
            blend_front_to_back(&mut out, &images).map_err(|e| e.to_string())?;
        }
        MergeMode::ZBuffer => {
            for px in 0..pixels {
                let mut nearest = 1.0f32;
                let mut chosen: Option<&[u8]> = None;
                for p in &parts {
                    for layer in 0..layers {
                        let d = p.depth[layer * pixels + px];
                        if d < nearest {
                            nearest = d;
                            let at = (layer * pixels + px) * 4;
                            chosen = Some(&p.color[at..at + 4]);
                        }
                    }
                }
                if let Some(c) = chosen {
                    out[px * 4..px * 4 + 4].copy_from_slice(c);
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/engine/loopback.rs"]
mod tests;
