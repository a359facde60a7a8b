use std::fmt;

use crate::foundation::error::{CompositeError, CompositeResult};

/// Rank of a process within its group; dense in `[0, group_size)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// The coordinating rank that receives the composited image.
    pub const ROOT: ProcessId = ProcessId(0);

    /// Whether this id is the coordinating rank.
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    /// Index form, for addressing per-rank slots.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Spatial anchor of the region a process renders (usually its centroid).
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Build from a flat coordinate slice, as handed over by foreign callers.
    ///
    /// Exactly three finite components are accepted.
    pub fn from_slice(v: &[f32]) -> CompositeResult<Self> {
        let [x, y, z] = v else {
            return Err(CompositeError::validation(format!(
                "position must have exactly 3 components, got {}",
                v.len()
            )));
        };
        let p = Self::new(*x, *y, *z);
        if !p.is_finite() {
            return Err(CompositeError::validation(
                "position components must be finite",
            ));
        }
        Ok(p)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean distance, accumulated in f64.
    pub fn distance_to(self, other: Position) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl From<[f32; 3]> for Position {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Output tile geometry. The engine is always configured with a single tile at `(0, 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileGeometry {
    /// A tile at the origin. Width and height must be non-zero and one RGBA8 image of the
    /// tile must be addressable.
    pub fn at_origin(width: u32, height: u32) -> CompositeResult<Self> {
        if width == 0 || height == 0 {
            return Err(CompositeError::validation(format!(
                "tile size must be non-zero, got {width}x{height}"
            )));
        }
        let tile = Self {
            x: 0,
            y: 0,
            width,
            height,
        };
        tile.rgba8_len()?;
        Ok(tile)
    }

    pub fn pixel_count(self) -> CompositeResult<usize> {
        checked_len(&[self.width as usize, self.height as usize])
    }

    /// Byte length of one RGBA8 image covering the tile.
    pub fn rgba8_len(self) -> CompositeResult<usize> {
        checked_len(&[self.pixel_count()?, 4])
    }
}

/// Product of buffer dimensions, or a validation error when it does not fit in `usize`.
pub(crate) fn checked_len(dims: &[usize]) -> CompositeResult<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            CompositeError::validation(format!("buffer dimensions {dims:?} overflow usize"))
        })
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
