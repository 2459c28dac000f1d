//! Model driver: the epoch loop
//!
//! The driver advances all local cell groups in fixed communication epochs of
//! half the global minimum delay. Because every connection delays its events
//! by at least the minimum delay, a spike emitted inside one epoch cannot
//! influence any state before the end of the next, so groups advance an
//! entire epoch without synchronisation; the only collective points are the
//! startup min-delay reduction and the per-epoch spike exchange.

use crate::backend::Backend;
use crate::connection::Connection;
use crate::error::{CoreError, Result};
use crate::event_queue::PostedEvent;
use crate::group::CellGroup;
use crate::communicator::Communicator;
use crate::fvm::ProbeHandle;
use crate::mechanism::MechanismRegistry;
use crate::partition::DomainDecomposition;
use crate::policy::CommunicationPolicy;
use crate::recipe::Recipe;
use crate::types::{CellMember, Spike, TimeMs};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const TIME_EPS: TimeMs = 1e-10;

/// Observer of spike streams, invoked once per epoch.
pub type SpikeCallback = Box<dyn FnMut(&[Spike]) + Send>;

/// A complete simulation on one rank: cell groups, communicator and the
/// epoch loop tying them together.
pub struct Model<B: Backend, P: CommunicationPolicy> {
    decomposition: DomainDecomposition,
    groups: Vec<CellGroup<B>>,
    communicator: Communicator<P>,
    time: TimeMs,
    min_delay: Option<TimeMs>,
    pending_queues: Option<Vec<Vec<PostedEvent>>>,
    artificial_spikes: Vec<Spike>,
    local_spike_callback: Option<SpikeCallback>,
    global_spike_callback: Option<SpikeCallback>,
}

impl<B: Backend, P: CommunicationPolicy> Model<B, P> {
    /// Build the local part of the model described by `recipe`.
    pub fn new(recipe: &dyn Recipe, decomposition: DomainDecomposition, policy: P) -> Result<Self> {
        let registry = MechanismRegistry::default();

        let mut groups = Vec::with_capacity(decomposition.num_local_groups());
        for gi in 0..decomposition.num_local_groups() {
            let (first, last) = decomposition.group_range(gi);
            let cells = (first..last)
                .map(|gid| recipe.cell_description(gid))
                .collect::<Result<Vec<_>>>()?;
            groups.push(CellGroup::new(first, &cells, &registry)?);
        }

        let mut communicator = Communicator::new(decomposition.clone(), policy);
        let (first, last) = decomposition.local_range();
        for gid in first..last {
            for info in recipe.connections_on(gid)? {
                communicator.add_connection(Connection::new(
                    info.source,
                    CellMember::new(gid, info.target_index),
                    info.weight,
                    info.delay,
                )?)?;
            }
        }
        communicator.construct();
        debug!(
            groups = groups.len(),
            connections = communicator.connections().len(),
            "model constructed"
        );

        Ok(Self {
            decomposition,
            groups,
            communicator,
            time: 0.0,
            min_delay: None,
            pending_queues: None,
            artificial_spikes: Vec::new(),
            local_spike_callback: None,
            global_spike_callback: None,
        })
    }

    /// Total number of cells in the model.
    pub fn num_cells(&self) -> u64 {
        self.decomposition.num_cells()
    }

    /// Current simulation time (ms).
    pub fn time(&self) -> TimeMs {
        self.time
    }

    /// Total number of spikes exchanged so far.
    pub fn num_spikes(&self) -> u64 {
        self.communicator.num_spikes()
    }

    /// Global minimum connection delay; collective, computed once and cached.
    pub fn min_delay(&mut self) -> Result<TimeMs> {
        if let Some(d) = self.min_delay {
            return Ok(d);
        }
        let d = self.communicator.min_delay()?;
        self.min_delay = Some(d);
        Ok(d)
    }

    /// Seed a spike from the given source at time zero; it enters the first
    /// exchange after the current reset.
    pub fn add_artificial_spike(&mut self, source: CellMember) {
        self.artificial_spikes.push(Spike::new(source, 0.0));
    }

    /// Observe the local spikes of every epoch (e.g. per-rank file export).
    pub fn set_local_spike_callback(&mut self, callback: SpikeCallback) {
        self.local_spike_callback = Some(callback);
    }

    /// Observe the gathered global spikes of every epoch.
    pub fn set_global_spike_callback(&mut self, callback: SpikeCallback) {
        self.global_spike_callback = Some(callback);
    }

    /// All probes exposed by local cells.
    pub fn probes(&self) -> Vec<ProbeHandle> {
        self.groups
            .iter()
            .flat_map(|g| g.probes().iter().copied())
            .collect()
    }

    /// Attach a sampler to a local probe, recording every `sample_dt` ms.
    pub fn attach_sampler(&mut self, probe: CellMember, sample_dt: TimeMs) -> Result<()> {
        let group = self.owning_group(probe.gid)?;
        self.groups[group].attach_sampler(probe, sample_dt)
    }

    /// Samples recorded for a probe, if a sampler is attached.
    pub fn samples(&self, probe: CellMember) -> Option<&[(TimeMs, f64)]> {
        let group = self.decomposition.group_index(probe.gid)?;
        self.groups[group].samples(probe)
    }

    /// Run the simulation to `tfinal` in integration steps of `dt`.
    ///
    /// The epoch loop: deliver the queues built in the previous epoch,
    /// advance every group to the epoch boundary (in parallel), gather the
    /// spikes produced, exchange them globally, and turn the gathered spikes
    /// into the next epoch's queues. Epoch zero delivers nothing.
    pub fn run(&mut self, tfinal: TimeMs, dt: TimeMs) -> Result<()> {
        if !(dt > 0.0) {
            return Err(CoreError::invalid_parameter("dt", dt, "> 0"));
        }
        let interval = self.min_delay()? / 2.0;
        info!(tfinal, dt, interval, "starting epoch loop");

        while self.time < tfinal - TIME_EPS {
            let t1 = (self.time + interval).min(tfinal);

            if let Some(queues) = self.pending_queues.take() {
                for (group, queue) in self.groups.iter_mut().zip(queues) {
                    group.enqueue_events(queue);
                }
            }

            #[cfg(feature = "parallel")]
            self.groups
                .par_iter_mut()
                .try_for_each(|g| g.advance(t1, dt))?;
            #[cfg(not(feature = "parallel"))]
            for g in self.groups.iter_mut() {
                g.advance(t1, dt)?;
            }

            let mut local_spikes = std::mem::take(&mut self.artificial_spikes);
            for g in self.groups.iter() {
                local_spikes.extend_from_slice(g.spikes());
            }
            if let Some(cb) = self.local_spike_callback.as_mut() {
                cb(&local_spikes);
            }

            let global_spikes = self.communicator.exchange(local_spikes)?;
            if let Some(cb) = self.global_spike_callback.as_mut() {
                cb(global_spikes.values());
            }

            self.pending_queues = Some(self.communicator.make_event_queues(&global_spikes));
            for g in self.groups.iter_mut() {
                g.clear_spikes();
            }

            self.time = t1;
        }
        Ok(())
    }

    /// Restore the initial state: groups, queues, counters and time. The
    /// topology and attached samplers are preserved (sampler buffers are
    /// cleared); artificial spikes must be re-added by the caller.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.pending_queues = None;
        self.artificial_spikes.clear();
        self.communicator.reset();
        for g in self.groups.iter_mut() {
            g.reset();
        }
    }

    fn owning_group(&self, gid: u64) -> Result<usize> {
        self.decomposition.group_index(gid).ok_or_else(|| {
            CoreError::model_description(
                format!("gid {}", gid),
                "not local to this rank",
            )
        })
    }
}
