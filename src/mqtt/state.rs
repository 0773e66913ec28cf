//! Fixed-capacity table of in-flight QoS 1 and QoS 2 publishes.
//!
//! Every record is keyed by `(packet_id, direction)`. A record is created by
//! [`OperationTable::reserve`] when a QoS 1 or QoS 2 publish is sent or
//! received, walks through the states of its flow one acknowledgement at a
//! time via [`OperationTable::transition`], and is removed as soon as it
//! reaches [`PublishState::PublishDone`].
//!
//! The table never allocates. Its capacity is the const parameter `N` and a
//! reservation beyond it fails with [`Error::NoMemory`].

use heapless::Vec;
use log::debug;

use super::error::{Error, Result};
use super::packet::{AckType, QoS};

/// Default number of publishes that may be in flight per connection.
pub const DEFAULT_MAX_INFLIGHT: usize = 10;

/// Which side originated a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Published by this client.
    Outgoing,
    /// Published by the broker to this client.
    Incoming,
}

/// Where a publish stands in its acknowledgement flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishState {
    /// No record exists.
    Null,
    /// Outgoing publish sent, waiting for PUBACK (QoS 1) or PUBREC (QoS 2).
    PublishSend,
    /// Incoming QoS 1 publish, PUBACK still to be sent.
    PubAckSend,
    /// Incoming QoS 2 publish, PUBREC still to be sent.
    PubRecSend,
    /// Outgoing QoS 2 publish acknowledged by PUBREC, PUBREL still to be sent.
    PubRelSend,
    /// Incoming QoS 2 publish acknowledged, waiting for PUBREL.
    PubRelPending,
    /// Incoming QoS 2 publish released, PUBCOMP still to be sent.
    PubCompSend,
    /// Outgoing QoS 2 publish released, waiting for PUBCOMP.
    PubCompPending,
    /// Terminal. The record has been removed.
    PublishDone,
}

impl PublishState {
    /// The acknowledgement this client owes the broker in this state, if any.
    pub const fn ack_to_send(self) -> Option<AckType> {
        match self {
            PublishState::PubAckSend => Some(AckType::PubAck),
            PublishState::PubRecSend => Some(AckType::PubRec),
            PublishState::PubRelSend => Some(AckType::PubRel),
            PublishState::PubCompSend => Some(AckType::PubComp),
            _ => None,
        }
    }
}

/// An acknowledgement that moved through the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateEvent {
    /// This client transmitted the acknowledgement.
    Sent(AckType),
    /// The broker's acknowledgement was received.
    Received(AckType),
}

impl StateEvent {
    /// The direction of the publish this event belongs to.
    ///
    /// A PUBREL always travels from publisher to receiver, every other
    /// acknowledgement the opposite way.
    pub const fn direction(self) -> Direction {
        match self {
            StateEvent::Sent(AckType::PubRel) => Direction::Outgoing,
            StateEvent::Sent(_) => Direction::Incoming,
            StateEvent::Received(AckType::PubRel) => Direction::Incoming,
            StateEvent::Received(_) => Direction::Outgoing,
        }
    }
}

/// One in-flight publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OperationRecord {
    /// Packet identifier of the publish.
    pub packet_id: u16,
    /// Who published.
    pub direction: Direction,
    /// QoS 1 or QoS 2.
    pub qos: QoS,
    /// Current position in the flow.
    pub state: PublishState,
}

/// The state a freshly reserved record starts in. QoS 0 is never tracked.
const fn initial_state(direction: Direction, qos: QoS) -> Option<PublishState> {
    match (direction, qos) {
        (_, QoS::AtMostOnce) => None,
        (Direction::Outgoing, _) => Some(PublishState::PublishSend),
        (Direction::Incoming, QoS::AtLeastOnce) => Some(PublishState::PubAckSend),
        (Direction::Incoming, QoS::ExactlyOnce) => Some(PublishState::PubRecSend),
    }
}

/// The single legal step from `state` on `event`, if there is one.
pub const fn next_state(
    direction: Direction,
    qos: QoS,
    state: PublishState,
    event: StateEvent,
) -> Option<PublishState> {
    use AckType::*;
    use PublishState::*;
    use StateEvent::*;

    match (direction, qos, state, event) {
        (Direction::Outgoing, QoS::AtLeastOnce, PublishSend, Received(PubAck)) => {
            Some(PublishDone)
        }
        (Direction::Outgoing, QoS::ExactlyOnce, PublishSend, Received(PubRec)) => {
            Some(PubRelSend)
        }
        (Direction::Outgoing, QoS::ExactlyOnce, PubRelSend, Sent(PubRel)) => Some(PubCompPending),
        (Direction::Outgoing, QoS::ExactlyOnce, PubCompPending, Received(PubComp)) => {
            Some(PublishDone)
        }
        (Direction::Incoming, QoS::AtLeastOnce, PubAckSend, Sent(PubAck)) => Some(PublishDone),
        (Direction::Incoming, QoS::ExactlyOnce, PubRecSend, Sent(PubRec)) => Some(PubRelPending),
        (Direction::Incoming, QoS::ExactlyOnce, PubRelPending, Received(PubRel)) => {
            Some(PubCompSend)
        }
        (Direction::Incoming, QoS::ExactlyOnce, PubCompSend, Sent(PubComp)) => Some(PublishDone),
        _ => None,
    }
}

/// Bounded table of in-flight publishes.
#[derive(Debug, Clone)]
pub struct OperationTable<const N: usize = DEFAULT_MAX_INFLIGHT> {
    records: Vec<OperationRecord, N>,
}

impl<const N: usize> Default for OperationTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> OperationTable<N> {
    /// An empty table.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Create the record for a QoS 1 or QoS 2 publish.
    ///
    /// Returns the state the record starts in.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - `packet_id` is 0 or `qos` is QoS 0
    /// * [`Error::StateCollision`] - a record for `(packet_id, direction)` exists
    /// * [`Error::NoMemory`] - the table is full
    pub fn reserve(
        &mut self,
        packet_id: u16,
        direction: Direction,
        qos: QoS,
    ) -> Result<PublishState> {
        let Some(state) = initial_state(direction, qos) else {
            return Err(Error::BadParameter);
        };
        if packet_id == 0 {
            return Err(Error::BadParameter);
        }
        if self.position(packet_id, direction).is_some() {
            return Err(Error::StateCollision);
        }

        self.records
            .push(OperationRecord {
                packet_id,
                direction,
                qos,
                state,
            })
            .map_err(|_| Error::NoMemory)?;

        debug!(
            "Reserved {:?} record for packet {} in state {:?}.",
            direction, packet_id, state
        );
        Ok(state)
    }

    /// Apply one acknowledgement to the record for `(packet_id, direction)`.
    ///
    /// Returns the new state. A record reaching [`PublishState::PublishDone`]
    /// is removed and its slot becomes free.
    ///
    /// # Errors
    ///
    /// * [`Error::IllegalState`] - no such record, or no transition is defined
    ///   for its current state and `event`; the record is left untouched
    pub fn transition(
        &mut self,
        packet_id: u16,
        direction: Direction,
        event: StateEvent,
    ) -> Result<PublishState> {
        let index = self
            .position(packet_id, direction)
            .ok_or(Error::IllegalState)?;
        let record = &mut self.records[index];

        let next = next_state(direction, record.qos, record.state, event)
            .ok_or(Error::IllegalState)?;
        debug!(
            "Packet {} {:?}: {:?} --{:?}--> {:?}.",
            packet_id, direction, record.state, event, next
        );

        if next == PublishState::PublishDone {
            self.records.remove(index);
        } else {
            record.state = next;
        }
        Ok(next)
    }

    /// Current state of `(packet_id, direction)`, [`PublishState::Null`] if
    /// there is no record.
    pub fn state(&self, packet_id: u16, direction: Direction) -> PublishState {
        self.position(packet_id, direction)
            .map_or(PublishState::Null, |index| self.records[index].state)
    }

    /// Drop a record regardless of its state.
    pub fn release(&mut self, packet_id: u16, direction: Direction) -> Option<OperationRecord> {
        let index = self.position(packet_id, direction)?;
        Some(self.records.remove(index))
    }

    /// Number of in-flight publishes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of in-flight publishes.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Forget every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Iterate over the in-flight records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records.iter()
    }

    fn position(&self, packet_id: u16, direction: Direction) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.packet_id == packet_id && r.direction == direction)
    }
}
