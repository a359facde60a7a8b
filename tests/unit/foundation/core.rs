use super::*;

#[test]
fn position_from_slice_requires_three_components() {
    assert_eq!(
        Position::from_slice(&[1.0, 2.0, 3.0]).unwrap(),
        Position::new(1.0, 2.0, 3.0)
    );
    assert!(Position::from_slice(&[1.0, 2.0]).is_err());
    assert!(Position::from_slice(&[1.0, 2.0, 3.0, 4.0]).is_err());
    assert!(Position::from_slice(&[]).is_err());
}

#[test]
fn position_from_slice_rejects_non_finite() {
    assert!(Position::from_slice(&[f32::NAN, 0.0, 0.0]).is_err());
    assert!(Position::from_slice(&[0.0, f32::INFINITY, 0.0]).is_err());
}

#[test]
fn distance_is_euclidean_and_symmetric() {
    let a = Position::new(0.0, 0.0, 0.0);
    let b = Position::new(3.0, 4.0, 12.0);
    assert_eq!(a.distance_to(b), 13.0);
    assert_eq!(b.distance_to(a), 13.0);
    assert_eq!(a.distance_to(a), 0.0);
}

#[test]
fn tile_at_origin_sizes_rgba8() {
    let t = TileGeometry::at_origin(800, 600).unwrap();
    assert_eq!((t.x, t.y), (0, 0));
    assert_eq!(t.pixel_count().unwrap(), 480_000);
    assert_eq!(t.rgba8_len().unwrap(), 1_920_000);
    assert!(TileGeometry::at_origin(0, 600).is_err());
    assert!(TileGeometry::at_origin(800, 0).is_err());
}

#[test]
fn root_is_rank_zero() {
    assert!(ProcessId(0).is_root());
    assert!(!ProcessId(3).is_root());
    assert_eq!(ProcessId(3).to_string(), "3");
}

#[test]
fn tile_whose_rgba8_len_overflows_is_rejected() {
    assert!(matches!(
        TileGeometry::at_origin(u32::MAX, u32::MAX),
        Err(CompositeError::Validation(_))
    ));

    let t = TileGeometry {
        x: 0,
        y: 0,
        width: u32::MAX,
        height: u32::MAX,
    };
    assert!(t.rgba8_len().is_err());
}

#[test]
fn checked_len_multiplies_or_errors() {
    assert_eq!(checked_len(&[3, 5, 4]).unwrap(), 60);
    assert_eq!(checked_len(&[]).unwrap(), 1);
    assert!(checked_len(&[usize::MAX, 2]).is_err());
}
