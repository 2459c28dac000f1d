//! Spike exchange and event routing
//!
//! The communicator owns the connection table for all synapses that terminate
//! on this rank. Between epochs it gathers every rank's spikes through the
//! communication policy and routes the gathered spikes through the table into
//! per-group event queues. The table is read-only after `construct`, so
//! routing may run concurrently with anything that does not mutate it.

use crate::connection::Connection;
use crate::error::{CoreError, Result};
use crate::event_queue::PostedEvent;
use crate::partition::DomainDecomposition;
use crate::policy::{CommunicationPolicy, GatheredVector};
use crate::types::{Spike, TimeMs};

/// Connection table plus the collective spike-exchange machinery for one
/// rank.
#[derive(Debug)]
pub struct Communicator<P: CommunicationPolicy> {
    policy: P,
    decomposition: DomainDecomposition,
    connections: Vec<Connection>,
    constructed: bool,
    num_spikes: u64,
}

impl<P: CommunicationPolicy> Communicator<P> {
    /// Create an empty communicator for the local partition.
    pub fn new(decomposition: DomainDecomposition, policy: P) -> Self {
        Self {
            policy,
            decomposition,
            connections: Vec::new(),
            constructed: false,
            num_spikes: 0,
        }
    }

    /// Number of local cell groups event queues are built for.
    pub fn num_groups_local(&self) -> usize {
        self.decomposition.num_local_groups()
    }

    /// Add a connection; its destination must live on this rank.
    pub fn add_connection(&mut self, connection: Connection) -> Result<()> {
        if !self.decomposition.is_local(connection.destination.gid) {
            return Err(CoreError::model_description(
                format!(
                    "connection {} -> {}",
                    connection.source, connection.destination
                ),
                "destination is not local to this rank",
            ));
        }
        self.constructed = false;
        self.connections.push(connection);
        Ok(())
    }

    /// Sort the table for equal-range lookup by source. The sort is stable,
    /// so connections with the same source keep their insertion order and
    /// exact-tie events replay deterministically.
    pub fn construct(&mut self) {
        self.connections.sort_by_key(|c| c.source);
        self.constructed = true;
    }

    /// The connection table, sorted by source after `construct`.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Global minimum delay over all connections on all ranks.
    pub fn min_delay(&self) -> Result<TimeMs> {
        let local_min = self
            .connections
            .iter()
            .map(|c| c.delay)
            .fold(f64::MAX, f64::min);
        self.policy.min(local_min)
    }

    /// Exchange spikes with every rank. Each rank receives the identical
    /// gathered vector, with contributions in rank order.
    pub fn exchange(&mut self, local_spikes: Vec<Spike>) -> Result<GatheredVector<Spike>> {
        let global_spikes = self.policy.gather_spikes(local_spikes)?;
        self.num_spikes += global_spikes.len() as u64;
        Ok(global_spikes)
    }

    /// Route every gathered spike through the connection table, producing one
    /// event queue per local cell group, sorted by delivery time (ties keep
    /// table order by way of the stable sort).
    pub fn make_event_queues(
        &self,
        global_spikes: &GatheredVector<Spike>,
    ) -> Vec<Vec<PostedEvent>> {
        debug_assert!(self.constructed, "construct() must precede routing");
        let mut queues: Vec<Vec<PostedEvent>> = vec![Vec::new(); self.num_groups_local()];

        for spike in global_spikes.values() {
            // equal range of connections with this spike's source
            let begin = self
                .connections
                .partition_point(|c| c.source < spike.source);
            let end = self
                .connections
                .partition_point(|c| c.source <= spike.source);
            for con in &self.connections[begin..end] {
                // destination locality was checked at add_connection
                let group = self
                    .decomposition
                    .group_index(con.destination.gid)
                    .expect("local destination");
                queues[group].push(con.make_event(spike));
            }
        }

        for queue in queues.iter_mut() {
            queue.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.target.cmp(&b.target)));
        }
        queues
    }

    /// Total number of spikes seen in exchanges since the last reset.
    pub fn num_spikes(&self) -> u64 {
        self.num_spikes
    }

    /// The communication policy in use.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Reset the spike counter.
    pub fn reset(&mut self) {
        self.num_spikes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SerialPolicy;
    use crate::types::CellMember;

    fn communicator(num_cells: u64, group_size: u64) -> Communicator<SerialPolicy> {
        let dd = DomainDecomposition::new(num_cells, 1, 0, group_size).unwrap();
        Communicator::new(dd, SerialPolicy)
    }

    fn con(src: u64, dst: u64, weight: f64, delay: f64) -> Connection {
        Connection::new(
            CellMember::new(src, 0),
            CellMember::new(dst, 0),
            weight,
            delay,
        )
        .unwrap()
    }

    #[test]
    fn table_is_sorted_after_construct() {
        let mut comm = communicator(4, 1);
        comm.add_connection(con(3, 0, 0.1, 10.0)).unwrap();
        comm.add_connection(con(1, 1, 0.1, 20.0)).unwrap();
        comm.add_connection(con(2, 2, 0.1, 15.0)).unwrap();
        comm.construct();

        let sources: Vec<u64> = comm.connections().iter().map(|c| c.source.gid).collect();
        assert_eq!(sources, vec![1, 2, 3]);
    }

    #[test]
    fn nonlocal_destination_is_rejected() {
        // rank 0 of 2 owns [0, 2)
        let dd = DomainDecomposition::new(4, 2, 0, 1).unwrap();
        let mut comm = Communicator::new(dd, SerialPolicy);
        assert!(comm.add_connection(con(0, 1, 0.1, 10.0)).is_ok());
        assert!(comm.add_connection(con(0, 3, 0.1, 10.0)).is_err());
    }

    #[test]
    fn min_delay_over_table() {
        let mut comm = communicator(4, 1);
        comm.add_connection(con(0, 1, 0.1, 20.0)).unwrap();
        comm.add_connection(con(1, 2, 0.1, 12.5)).unwrap();
        comm.construct();
        assert_eq!(comm.min_delay().unwrap(), 12.5);
    }

    #[test]
    fn exchange_counts_spikes() {
        let mut comm = communicator(4, 1);
        let spikes = vec![
            Spike::new(CellMember::new(0, 0), 0.5),
            Spike::new(CellMember::new(1, 0), 0.75),
        ];
        let gathered = comm.exchange(spikes).unwrap();
        assert_eq!(gathered.len(), 2);
        assert_eq!(comm.num_spikes(), 2);

        comm.reset();
        assert_eq!(comm.num_spikes(), 0);
    }

    #[test]
    fn all_to_all_pair_routes_one_event_each_way() {
        // two cells, complete graph: a spike at i yields exactly one event at
        // j != i, delayed by the connection delay
        let mut comm = communicator(2, 1);
        comm.add_connection(con(1, 0, 0.25, 10.0)).unwrap();
        comm.add_connection(con(0, 1, 0.25, 10.0)).unwrap();
        comm.construct();

        let gathered = comm
            .exchange(vec![Spike::new(CellMember::new(0, 0), 1.5)])
            .unwrap();
        let queues = comm.make_event_queues(&gathered);

        assert_eq!(queues.len(), 2);
        assert!(queues[0].is_empty());
        assert_eq!(queues[1].len(), 1);
        let ev = queues[1][0];
        assert_eq!(ev.target, CellMember::new(1, 0));
        assert_eq!(ev.time, 11.5);
        assert_eq!(ev.weight, 0.25);
    }

    #[test]
    fn queues_are_sorted_by_delivery_time() {
        let mut comm = communicator(2, 2);
        comm.add_connection(con(0, 1, 0.1, 30.0)).unwrap();
        comm.add_connection(con(1, 0, 0.1, 10.0)).unwrap();
        comm.construct();

        let gathered = comm
            .exchange(vec![
                Spike::new(CellMember::new(0, 0), 0.0),
                Spike::new(CellMember::new(1, 0), 5.0),
            ])
            .unwrap();
        let queues = comm.make_event_queues(&gathered);

        assert_eq!(queues.len(), 1);
        let times: Vec<f64> = queues[0].iter().map(|e| e.time).collect();
        assert_eq!(times, vec![15.0, 30.0]);
    }

    #[test]
    fn equal_range_spans_multiple_targets() {
        let mut comm = communicator(3, 3);
        comm.add_connection(con(0, 1, 0.1, 10.0)).unwrap();
        comm.add_connection(con(0, 2, 0.2, 10.0)).unwrap();
        comm.construct();

        let gathered = comm
            .exchange(vec![Spike::new(CellMember::new(0, 0), 0.0)])
            .unwrap();
        let queues = comm.make_event_queues(&gathered);
        assert_eq!(queues[0].len(), 2);
        // same delivery time: table order decides
        assert_eq!(queues[0][0].target.gid, 1);
        assert_eq!(queues[0][1].target.gid, 2);
    }
}
