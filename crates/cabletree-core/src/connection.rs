//! Directed synaptic connections

use crate::backend::Value;
use crate::error::{CoreError, Result};
use crate::event_queue::PostedEvent;
use crate::types::{CellMember, Spike, TimeMs};

/// A directed link from a source detector to a destination synapse, with a
/// weight and a positive conduction delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    /// Emitting detector
    pub source: CellMember,
    /// Receiving synapse; must resolve to a local cell group
    pub destination: CellMember,
    /// Synaptic weight
    pub weight: Value,
    /// Conduction delay (ms)
    pub delay: TimeMs,
}

impl Connection {
    /// Create a connection; the delay must be strictly positive.
    pub fn new(
        source: CellMember,
        destination: CellMember,
        weight: Value,
        delay: TimeMs,
    ) -> Result<Self> {
        if !(delay > 0.0) {
            return Err(CoreError::invalid_parameter(
                format!("connection {} -> {} delay", source, destination),
                delay,
                "> 0",
            ));
        }
        Ok(Self {
            source,
            destination,
            weight,
            delay,
        })
    }

    /// Turn a spike from this connection's source into the event it delivers.
    pub fn make_event(&self, spike: &Spike) -> PostedEvent {
        PostedEvent::new(self.destination, spike.time + self.delay, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_time_is_spike_plus_delay() {
        let con = Connection::new(
            CellMember::new(0, 0),
            CellMember::new(1, 0),
            0.5,
            20.0,
        )
        .unwrap();
        let ev = con.make_event(&Spike::new(CellMember::new(0, 0), 1.25));
        assert_eq!(ev.time, 21.25);
        assert_eq!(ev.target, CellMember::new(1, 0));
        assert_eq!(ev.weight, 0.5);
    }

    #[test]
    fn rejects_nonpositive_delay() {
        assert!(
            Connection::new(CellMember::new(0, 0), CellMember::new(1, 0), 0.5, 0.0).is_err()
        );
        assert!(
            Connection::new(CellMember::new(0, 0), CellMember::new(1, 0), 0.5, -1.0).is_err()
        );
    }
}
