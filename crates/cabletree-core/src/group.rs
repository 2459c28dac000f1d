//! Cell group: the unit of parallel advancement
//!
//! A group owns a contiguous gid range and all state needed to advance it:
//! the lowered FVM cells, the pending-event queue, the output spike buffer
//! and any attached samplers. During an advance the group touches nothing
//! outside itself, which is what makes groups safe to step concurrently.

use crate::backend::{Backend, Value};
use crate::cell::Cell;
use crate::error::{CoreError, Result};
use crate::event_queue::{EventQueue, PostedEvent};
use crate::fvm::{FvmCells, ProbeHandle};
use crate::mechanism::MechanismRegistry;
use crate::types::{CellGid, CellMember, Spike, TimeMs};

// slack when comparing event and step times; times are O(1e2) ms, so this
// sits far above f64 rounding and far below any dt
const TIME_EPS: TimeMs = 1e-10;

#[derive(Debug, Clone)]
struct Sampler {
    probe: CellMember,
    compartment: u32,
    sample_dt: TimeMs,
    next_time: TimeMs,
    samples: Vec<(TimeMs, Value)>,
}

/// A batch of cells advanced as one unit.
#[derive(Debug)]
pub struct CellGroup<B: Backend> {
    first_gid: CellGid,
    num_cells: usize,
    cells: FvmCells<B>,
    events: EventQueue,
    spikes: Vec<Spike>,
    samplers: Vec<Sampler>,
    time: TimeMs,
    v_prev: Vec<Value>,
    v_now: Vec<Value>,
    crossings: Vec<Spike>,
}

impl<B: Backend> CellGroup<B> {
    /// Build a group over cells with gids `first_gid..first_gid + cells.len()`.
    pub fn new(
        first_gid: CellGid,
        cells: &[Cell],
        registry: &MechanismRegistry,
    ) -> Result<Self> {
        let lowered = FvmCells::new(first_gid, cells, registry)?;
        let num_detectors = lowered.detectors().len();
        Ok(Self {
            first_gid,
            num_cells: cells.len(),
            cells: lowered,
            events: EventQueue::new(),
            spikes: Vec::new(),
            samplers: Vec::new(),
            time: 0.0,
            v_prev: vec![0.0; num_detectors],
            v_now: vec![0.0; num_detectors],
            crossings: Vec::new(),
        })
    }

    /// First gid owned by this group.
    pub fn first_gid(&self) -> CellGid {
        self.first_gid
    }

    /// Half-open gid range owned by this group.
    pub fn gid_range(&self) -> (CellGid, CellGid) {
        (self.first_gid, self.first_gid + self.num_cells as CellGid)
    }

    /// Current group time (ms).
    pub fn time(&self) -> TimeMs {
        self.time
    }

    /// Spike sources of this group in lexicographic `(gid, index)` order.
    pub fn spike_sources(&self) -> impl ExactSizeIterator<Item = CellMember> + '_ {
        self.cells.detectors().iter().map(|d| d.member)
    }

    /// Queue events for delivery during subsequent advances.
    pub fn enqueue_events(&mut self, events: impl IntoIterator<Item = PostedEvent>) {
        for ev in events {
            self.events.push(ev);
        }
    }

    /// Integrate up to (but not beyond) `tfinal` in steps of `dt`.
    ///
    /// Pending events are delivered when due; an event strictly inside a step
    /// splits it, so delivery happens at the exact event time. Spikes are
    /// appended in non-decreasing time order, with same-step ties broken by
    /// source member.
    pub fn advance(&mut self, tfinal: TimeMs, dt: TimeMs) -> Result<()> {
        if !(dt > 0.0) {
            return Err(CoreError::invalid_parameter("dt", dt, "> 0"));
        }

        while self.time < tfinal - TIME_EPS {
            self.sample_due();
            while let Some(ev) = self.events.pop_if(self.time + TIME_EPS) {
                self.deliver(ev)?;
            }

            let mut t_next = (self.time + dt).min(tfinal);
            if let Some(te) = self.events.peek_time() {
                if te < t_next - TIME_EPS {
                    t_next = te;
                }
            }
            let h = t_next - self.time;

            self.cells.detector_voltages(&mut self.v_prev);
            self.cells.step(self.time, h)?;
            self.cells.detector_voltages(&mut self.v_now);

            self.crossings.clear();
            for (k, det) in self.cells.detectors().iter().enumerate() {
                let (v0, v1) = (self.v_prev[k], self.v_now[k]);
                if v0 < det.threshold && v1 >= det.threshold {
                    let s = (det.threshold - v0) / (v1 - v0);
                    self.crossings.push(Spike::new(det.member, self.time + s * h));
                }
            }
            self.crossings
                .sort_by(|a, b| a.time.total_cmp(&b.time).then(a.source.cmp(&b.source)));
            self.spikes.append(&mut self.crossings);

            self.time = t_next;
        }
        self.sample_due();
        Ok(())
    }

    // record every sampler whose next sample time has been reached; called
    // between steps so sampled values are the state at the sample time
    fn sample_due(&mut self) {
        for s in self.samplers.iter_mut() {
            while s.next_time <= self.time + TIME_EPS {
                s.samples
                    .push((s.next_time, self.cells.voltage_at(s.compartment)));
                s.next_time += s.sample_dt;
            }
        }
    }

    /// Spikes produced since the last `clear_spikes`, in emission order.
    pub fn spikes(&self) -> &[Spike] {
        &self.spikes
    }

    /// Drop the output spike buffer.
    pub fn clear_spikes(&mut self) {
        self.spikes.clear();
    }

    /// Voltage probes exposed by this group's cells.
    pub fn probes(&self) -> &[ProbeHandle] {
        self.cells.probes()
    }

    /// Attach a sampler to the probe with the given id, recording voltage
    /// every `sample_dt` ms starting at time zero.
    pub fn attach_sampler(&mut self, probe: CellMember, sample_dt: TimeMs) -> Result<()> {
        if !(sample_dt > 0.0) {
            return Err(CoreError::invalid_parameter("sample_dt", sample_dt, "> 0"));
        }
        let handle = self
            .cells
            .probes()
            .iter()
            .find(|p| p.member == probe)
            .ok_or_else(|| {
                CoreError::model_description(format!("probe {}", probe), "no such probe")
            })?;
        self.samplers.push(Sampler {
            probe,
            compartment: handle.compartment,
            sample_dt,
            next_time: 0.0,
            samples: Vec::new(),
        });
        Ok(())
    }

    /// Samples recorded for the given probe, if a sampler is attached.
    pub fn samples(&self, probe: CellMember) -> Option<&[(TimeMs, Value)]> {
        self.samplers
            .iter()
            .find(|s| s.probe == probe)
            .map(|s| s.samples.as_slice())
    }

    /// Restore initial state: voltages, mechanism state, queue, buffers and
    /// samplers. Topology is preserved.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.cells.init();
        self.events.clear();
        self.spikes.clear();
        for s in self.samplers.iter_mut() {
            s.next_time = 0.0;
            s.samples.clear();
        }
    }

    fn deliver(&mut self, ev: PostedEvent) -> Result<()> {
        let (first, last) = self.gid_range();
        if ev.target.gid < first || ev.target.gid >= last {
            return Err(CoreError::model_description(
                format!("event target {}", ev.target),
                format!("outside group range [{}, {})", first, last),
            ));
        }
        let slot = (ev.target.gid - first) as usize;
        self.cells.deliver(slot, ev.target.index, ev.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MulticoreBackend;
    use crate::cell::{Location, MechanismDesc, V_INIT};

    type Group = CellGroup<MulticoreBackend>;

    fn registry() -> MechanismRegistry {
        MechanismRegistry::default()
    }

    fn passive_cell_with_synapse() -> Cell {
        let mut cell = Cell::new(6.30785);
        cell.add_mechanism(0, MechanismDesc::new("pas").with("e", V_INIT));
        cell.add_synapse(Location::new(0, 0.5), MechanismDesc::new("expsyn"));
        cell.add_detector(Location::new(0, 0.0), -30.0);
        cell
    }

    #[test]
    fn advance_reaches_tfinal() {
        let mut group = Group::new(0, &[passive_cell_with_synapse()], &registry()).unwrap();
        group.advance(1.0, 0.025).unwrap();
        assert!((group.time() - 1.0).abs() < 1e-9);
        assert!(group.spikes().is_empty());
    }

    #[test]
    fn rejects_nonpositive_dt() {
        let mut group = Group::new(0, &[passive_cell_with_synapse()], &registry()).unwrap();
        assert!(group.advance(1.0, 0.0).is_err());
    }

    #[test]
    fn strong_event_drives_a_spike() {
        let mut group = Group::new(0, &[passive_cell_with_synapse()], &registry()).unwrap();
        // delivery mid-step; the conductance pulls the soma well past -30 mV
        group.enqueue_events([PostedEvent::new(CellMember::new(0, 0), 0.4131, 0.05)]);
        group.advance(5.0, 0.025).unwrap();

        assert!(!group.spikes().is_empty());
        let spike = group.spikes()[0];
        assert_eq!(spike.source, CellMember::new(0, 0));
        assert!(spike.time >= 0.4131 && spike.time < 1.0, "t = {}", spike.time);
    }

    #[test]
    fn event_for_foreign_gid_is_an_error() {
        let mut group = Group::new(0, &[passive_cell_with_synapse()], &registry()).unwrap();
        group.enqueue_events([PostedEvent::new(CellMember::new(7, 0), 0.1, 1.0)]);
        assert!(group.advance(1.0, 0.025).is_err());
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut group = Group::new(0, &[passive_cell_with_synapse()], &registry()).unwrap();
        group.enqueue_events([PostedEvent::new(CellMember::new(0, 0), 0.25, 0.05)]);
        group.advance(5.0, 0.025).unwrap();
        assert!(!group.spikes().is_empty());

        group.reset();
        assert_eq!(group.time(), 0.0);
        assert!(group.spikes().is_empty());

        // without re-queued events the cell stays silent
        group.advance(5.0, 0.025).unwrap();
        assert!(group.spikes().is_empty());
    }

    #[test]
    fn sampler_records_at_fixed_cadence() {
        let mut cell = passive_cell_with_synapse();
        cell.add_probe(Location::new(0, 0.5));
        let mut group = Group::new(3, &[cell], &registry()).unwrap();
        let probe = CellMember::new(3, 0);
        group.attach_sampler(probe, 0.1).unwrap();
        group.advance(1.0, 0.025).unwrap();

        let samples = group.samples(probe).unwrap();
        // 0.0, 0.1, ..., 1.0
        assert_eq!(samples.len(), 11);
        assert!((samples[1].0 - 0.1).abs() < 1e-9);
        assert!((samples[0].1 - V_INIT).abs() < 1e-6);
    }

    #[test]
    fn attach_sampler_to_missing_probe_fails() {
        let mut group = Group::new(0, &[passive_cell_with_synapse()], &registry()).unwrap();
        assert!(group.attach_sampler(CellMember::new(0, 0), 0.1).is_err());
    }
}
