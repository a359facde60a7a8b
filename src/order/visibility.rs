use crate::{
    foundation::core::{Position, ProcessId},
    foundation::error::{CompositeError, CompositeResult},
    registry::centroids::CentroidRegistry,
};

/// Visibility order of ranks `0..group_size` as seen from `camera`.
///
/// Ranks are sorted by ascending Euclidean distance from `camera` to their anchor, so the
/// first entry is the process nearest the viewer. This is the front-to-back order the blend
/// merge expects. Equal distances keep ascending rank order.
///
/// Fails with [`CompositeError::MissingCentroid`] for the lowest rank that has no anchor;
/// a missing anchor is never replaced by a default position.
pub fn compute_order(
    camera: Position,
    registry: &CentroidRegistry,
    group_size: u32,
) -> CompositeResult<Vec<ProcessId>> {
    if !camera.is_finite() {
        return Err(CompositeError::validation(
            "camera position components must be finite",
        ));
    }

    let mut keyed: Vec<(f64, ProcessId)> = Vec::with_capacity(group_size as usize);
    for id in (0..group_size).map(ProcessId) {
        let anchor = registry
            .get(id)
            .ok_or(CompositeError::MissingCentroid { id })?;
        let d = camera.distance_to(anchor);
        if d.is_nan() {
            return Err(CompositeError::validation(format!(
                "centroid of process {id} is not a finite position"
            )));
        }
        keyed.push((d, id));
    }

    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    Ok(keyed.into_iter().map(|(_, id)| id).collect())
}

#[cfg(test)]
#[path = "../../tests/unit/order/visibility.rs"]
mod tests;
