use super::*;
use crate::engine::api::{SingleImageStrategy, Strategy};

fn tile(w: u32, h: u32) -> TileGeometry {
    TileGeometry::at_origin(w, h).unwrap()
}

fn pipeline(mode: MergeMode, ordered: bool) -> PipelineConfig {
    PipelineConfig {
        mode,
        ordered,
        strategy: Strategy::Sequential,
        single_image_strategy: SingleImageStrategy::RadixK,
        background: [0.0; 4],
    }
}

fn session(member: &mut LoopbackMember) -> Box<dyn CompositeEngine> {
    let group = member.group().unwrap();
    member.create_session(group).unwrap()
}

/// Run `f` once per rank on its own thread; returns the per-rank outputs in rank order.
fn run_ranks<T, F>(size: u32, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(ProcessId, Box<dyn CompositeEngine>) -> T + Sync,
{
    let members = LoopbackGroup::new(size).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = members
            .into_iter()
            .map(|mut m| {
                let f = &f;
                s.spawn(move || {
                    let engine = session(&mut m);
                    f(m.rank(), engine)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn group_reports_rank_and_size() {
    let mut members = LoopbackGroup::new(3).unwrap();
    let g = members[2].group().unwrap();
    assert_eq!(g.rank(), ProcessId(2));
    assert_eq!(g.size(), 3);
    assert_eq!(g.root(), ProcessId(0));
    assert!(LoopbackGroup::new(0).is_err());
}

#[test]
fn foreign_group_is_rejected() {
    let mut a = LoopbackGroup::new(2).unwrap();
    let mut b = LoopbackGroup::new(3).unwrap();
    let foreign = b[1].group().unwrap();
    assert!(a[1].create_session(foreign).is_err());
}

#[test]
fn merge_order_must_be_a_permutation() {
    let mut members = LoopbackGroup::new(3).unwrap();
    let mut e = session(&mut members[0]);
    assert!(e.set_merge_order(&[ProcessId(0), ProcessId(2), ProcessId(1)]).is_ok());
    assert!(e.set_merge_order(&[ProcessId(0), ProcessId(0), ProcessId(1)]).is_err());
    assert!(e.set_merge_order(&[ProcessId(0), ProcessId(1)]).is_err());
    assert!(e.set_merge_order(&[ProcessId(0), ProcessId(1), ProcessId(5)]).is_err());
}

#[test]
fn single_rank_blend_returns_own_image_over_background() {
    let out = run_ranks(1, |_, mut e| {
        e.configure_tile(tile(2, 1)).unwrap();
        e.configure_pipeline(&pipeline(MergeMode::Blend, false)).unwrap();
        e.merge_flat(&[10, 20, 30, 255, 0, 0, 0, 0]).unwrap();
        e.root_result().map(<[u8]>::to_vec)
    });
    assert_eq!(out[0].as_deref(), Some(&[10, 20, 30, 255, 0, 0, 0, 0][..]));
}

#[test]
fn blend_uses_front_to_back_order_and_only_root_has_result() {
    // Rank 0 opaque red, rank 1 opaque green; whichever is first in the order wins.
    let out = run_ranks(2, |rank, mut e| {
        e.configure_tile(tile(1, 1)).unwrap();
        e.configure_pipeline(&pipeline(MergeMode::Blend, true)).unwrap();
        e.set_merge_order(&[ProcessId(1), ProcessId(0)]).unwrap();
        let color = if rank.is_root() {
            [255, 0, 0, 255]
        } else {
            [0, 255, 0, 255]
        };
        e.merge_flat(&color).unwrap();
        e.root_result().map(<[u8]>::to_vec)
    });
    assert_eq!(out[0].as_deref(), Some(&[0, 255, 0, 255][..]));
    assert_eq!(out[1], None);
}

#[test]
fn zbuffer_picks_nearest_fragment_per_pixel() {
    let out = run_ranks(2, |rank, mut e| {
        e.configure_tile(tile(2, 1)).unwrap();
        e.configure_pipeline(&pipeline(MergeMode::ZBuffer, false)).unwrap();
        let (color, depth): ([u8; 8], [f32; 2]) = if rank.is_root() {
            ([255, 0, 0, 255, 255, 0, 0, 255], [0.2, 1.0])
        } else {
            ([0, 0, 255, 255, 0, 0, 255, 255], [0.5, 1.0])
        };
        e.merge_layered(&color, &depth, 1).unwrap();
        e.root_result().map(<[u8]>::to_vec)
    });
    // Pixel 0: root is nearer. Pixel 1: nothing in front of the far plane.
    assert_eq!(
        out[0].as_deref(),
        Some(&[255, 0, 0, 255, 0, 0, 0, 0][..])
    );
    assert_eq!(out[1], None);
}

#[test]
fn zbuffer_searches_all_layers() {
    let out = run_ranks(1, |_, mut e| {
        e.configure_tile(tile(1, 1)).unwrap();
        e.configure_pipeline(&pipeline(MergeMode::ZBuffer, false)).unwrap();
        let color = [9, 9, 9, 255, 7, 7, 7, 255];
        let depth = [0.8, 0.3];
        e.merge_layered(&color, &depth, 2).unwrap();
        e.root_result().map(<[u8]>::to_vec)
    });
    assert_eq!(out[0].as_deref(), Some(&[7, 7, 7, 255][..]));
}

#[test]
fn mismatched_modes_fail_on_every_rank() {
    let out = run_ranks(2, |rank, mut e| {
        e.configure_tile(tile(1, 1)).unwrap();
        if rank.is_root() {
            e.configure_pipeline(&pipeline(MergeMode::Blend, false)).unwrap();
            e.merge_flat(&[0, 0, 0, 0]).is_err()
        } else {
            e.configure_pipeline(&pipeline(MergeMode::ZBuffer, false)).unwrap();
            e.merge_layered(&[0, 0, 0, 0], &[0.5], 1).is_err()
        }
    });
    assert_eq!(out, vec![true, true]);
}

#[test]
fn diverging_merge_orders_fail_on_every_rank() {
    let out = run_ranks(2, |rank, mut e| {
        e.configure_tile(tile(1, 1)).unwrap();
        e.configure_pipeline(&pipeline(MergeMode::Blend, true)).unwrap();
        let order = if rank.is_root() {
            [ProcessId(0), ProcessId(1)]
        } else {
            [ProcessId(1), ProcessId(0)]
        };
        e.set_merge_order(&order).unwrap();
        let merged = e.merge_flat(&[0, 0, 0, 255]);
        (
            matches!(merged, Err(CompositeError::Engine(_))),
            e.root_result().is_none(),
        )
    });
    assert_eq!(out, vec![(true, true), (true, true)]);
}

#[test]
fn ordered_blend_without_a_merge_order_fails() {
    let mut members = LoopbackGroup::new(1).unwrap();
    let mut e = session(&mut members[0]);
    e.configure_tile(tile(1, 1)).unwrap();
    e.configure_pipeline(&pipeline(MergeMode::Blend, true)).unwrap();
    assert!(matches!(
        e.merge_flat(&[0, 0, 0, 255]),
        Err(CompositeError::Engine(_))
    ));
}

#[test]
fn merge_without_configuration_is_an_engine_error() {
    let mut members = LoopbackGroup::new(1).unwrap();
    let mut e = session(&mut members[0]);
    assert!(matches!(
        e.merge_flat(&[0, 0, 0, 0]),
        Err(CompositeError::Engine(_))
    ));
    assert!(e.root_result().is_none());
}

#[test]
fn tile_off_origin_is_rejected() {
    let mut members = LoopbackGroup::new(1).unwrap();
    let mut e = session(&mut members[0]);
    let t = TileGeometry {
        x: 4,
        y: 0,
        width: 8,
        height: 8,
    };
    assert!(e.configure_tile(t).is_err());
}
