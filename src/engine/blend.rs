use crate::foundation::error::{CompositeError, CompositeResult};

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Lay `front` onto the `back` pixel behind it.
///
/// The back contributes in proportion to whatever coverage `front` leaves open.
pub fn layer_onto(back: PremulRgba8, front: PremulRgba8) -> PremulRgba8 {
    let open = u8::MAX - front[3];
    if open == 0 {
        return front;
    }
    std::array::from_fn(|i| front[i].saturating_add(scale(back[i], open)))
}

/// Blend whole RGBA8 images into `dst`, frontmost first.
///
/// `dst` holds the background on entry. A pixel stops accumulating once it is opaque, so
/// images hidden behind it are never read there.
pub fn blend_front_to_back(dst: &mut [u8], images: &[&[u8]]) -> CompositeResult<()> {
    if !dst.len().is_multiple_of(4) || images.iter().any(|img| img.len() != dst.len()) {
        return Err(CompositeError::engine(format!(
            "front-to-back blend needs rgba8 images of {} bytes",
            dst.len()
        )));
    }
    for (i, bg) in dst.chunks_exact_mut(4).enumerate() {
        let at = i * 4;
        let mut acc: PremulRgba8 = [0; 4];
        for img in images {
            if acc[3] == u8::MAX {
                break;
            }
            acc = layer_onto(pixel(&img[at..at + 4]), acc);
        }
        let out = layer_onto(pixel(bg), acc);
        bg.copy_from_slice(&out);
    }
    Ok(())
}

/// Straight float RGBA in `[0, 1]` to premultiplied RGBA8.
pub fn premul_from_f32(rgba: [f32; 4]) -> PremulRgba8 {
    fn to_u8(v: f32) -> u8 {
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    }
    let a = rgba[3].clamp(0.0, 1.0);
    [
        to_u8(rgba[0] * a),
        to_u8(rgba[1] * a),
        to_u8(rgba[2] * a),
        to_u8(a),
    ]
}

/// Fill an RGBA8 buffer with a single pixel value.
pub fn fill(dst: &mut [u8], px: PremulRgba8) {
    for d in dst.chunks_exact_mut(4) {
        d.copy_from_slice(&px);
    }
}

fn pixel(s: &[u8]) -> PremulRgba8 {
    [s[0], s[1], s[2], s[3]]
}

// c * f / 255, rounded to nearest.
fn scale(c: u8, f: u8) -> u8 {
    ((u32::from(c) * u32::from(f) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/engine/blend.rs"]
mod tests;
