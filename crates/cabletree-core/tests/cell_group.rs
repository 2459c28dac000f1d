//! Cell-group behaviour over whole cells

use cabletree_core::backend::MulticoreBackend;
use cabletree_core::cell::{make_ball_and_stick, Cell, Location, MechanismDesc};
use cabletree_core::group::CellGroup;
use cabletree_core::mechanism::MechanismRegistry;
use cabletree_core::types::CellMember;

type Group = CellGroup<MulticoreBackend>;

fn registry() -> MechanismRegistry {
    MechanismRegistry::default()
}

// a single-compartment HH soma under a sustained suprathreshold step current
fn hh_soma_cell() -> Cell {
    let mut cell = Cell::new(6.30785);
    cell.add_mechanism(0, MechanismDesc::new("hh"));
    cell.add_stimulus(Location::new(0, 0.5), 0.0, 100.0, 0.09);
    cell.add_detector(Location::new(0, 0.0), 20.0);
    cell
}

#[test]
fn hh_soma_emits_four_spikes_over_fifty_ms() {
    let mut group = Group::new(0, &[hh_soma_cell()], &registry()).unwrap();
    group.advance(50.0, 0.01).unwrap();

    let spikes = group.spikes();
    assert_eq!(
        spikes.len(),
        4,
        "spike times: {:?}",
        spikes.iter().map(|s| s.time).collect::<Vec<_>>()
    );
    for s in spikes {
        assert_eq!(s.source, CellMember::new(0, 0));
        assert!(s.time >= 0.0 && s.time <= 50.0);
    }
    for pair in spikes.windows(2) {
        assert!(pair[0].time < pair[1].time);
    }
}

#[test]
fn spike_times_are_stable_across_reset() {
    let mut group = Group::new(0, &[hh_soma_cell()], &registry()).unwrap();
    group.advance(50.0, 0.01).unwrap();
    let first: Vec<u64> = group.spikes().iter().map(|s| s.time.to_bits()).collect();

    group.reset();
    group.advance(50.0, 0.01).unwrap();
    let second: Vec<u64> = group.spikes().iter().map(|s| s.time.to_bits()).collect();

    assert_eq!(first, second);
}

#[test]
fn spike_sources_are_lexicographically_ordered() {
    // two detectors on one cell plus a third on a second cell; sources must
    // come out sorted by (gid, index) with indices starting at zero per cell
    let mut first = make_ball_and_stick(101);
    first.add_detector(Location::new(0, 0.0), 0.0);
    first.add_detector(Location::new(1, 0.3), 2.3);

    let mut second = make_ball_and_stick(101);
    second.add_detector(Location::new(0, 0.0), 0.0);

    let first_gid = 37;
    let group = Group::new(first_gid, &[first, second], &registry()).unwrap();

    let sources: Vec<CellMember> = group.spike_sources().collect();
    assert_eq!(
        sources,
        vec![
            CellMember::new(37, 0),
            CellMember::new(37, 1),
            CellMember::new(38, 0),
        ]
    );
    for pair in sources.windows(2) {
        assert!(pair[0] < pair[1]);
        if pair[1].gid == pair[0].gid {
            assert_eq!(pair[1].index, pair[0].index + 1);
        } else {
            assert_eq!(pair[1].index, 0);
        }
    }
}
