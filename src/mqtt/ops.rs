//! Outgoing operations.

use log::{debug, error, info};

use super::codec::Codec;
use super::context::Context;
use super::error::{Error, Result};
use super::event::EventHandler;
use super::packet::{AckType, PublishInfo, QoS, SubscribeInfo};
use super::state::{Direction, PublishState, StateEvent};
use super::time::Clock;
use crate::network::Transport;

impl<T, C, H, K, const N: usize> Context<'_, T, C, H, K, N>
where
    T: Transport,
    C: Clock,
    H: EventHandler,
    K: Codec,
{
    /// Publish a message.
    ///
    /// For QoS 1 and QoS 2 the publish is recorded as in flight before any
    /// byte is sent, so an acknowledgement can never arrive ahead of its
    /// record. If sending fails the record is dropped again and the same
    /// `packet_id` may be retried.
    ///
    /// The header is serialized into the network buffer, the payload is sent
    /// straight from `info`.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - `packet_id` is 0 for QoS 1 or 2, or `info`
    ///   cannot be encoded
    /// * [`Error::NoMemory`] - the header does not fit the network buffer, or
    ///   too many publishes are in flight
    /// * [`Error::StateCollision`] - `packet_id` is already in flight
    /// * [`Error::SendFailed`] - the transport failed
    pub fn publish(&mut self, info: &PublishInfo<'_>, packet_id: u16) -> Result<()> {
        if info.qos > QoS::AtMostOnce && packet_id == 0 {
            error!("Packet id 0 is invalid for a QoS {} PUBLISH.", info.qos as u8);
            return Err(Error::BadParameter);
        }

        let size = self.codec.publish_packet_size(info)?;
        debug!(
            "PUBLISH packet size is {} and remaining length is {}.",
            size.packet_size, size.remaining_length
        );
        let header_len = self
            .codec
            .serialize_publish_header(info, packet_id, &size, self.buffer)?;
        debug!("Serialized PUBLISH header size is {}.", header_len);

        let tracked = info.qos > QoS::AtMostOnce;
        if tracked {
            self.state_table
                .reserve(packet_id, Direction::Outgoing, info.qos)
                .inspect_err(|e| error!("Cannot track PUBLISH {}: {}.", packet_id, e))?;
        }

        if let Err(e) = self.send_publish(header_len, info.payload) {
            if tracked {
                self.state_table.release(packet_id, Direction::Outgoing);
            }
            error!("MQTT PUBLISH {} failed: {}.", packet_id, e);
            return Err(e);
        }
        Ok(())
    }

    fn send_publish(&mut self, header_len: usize, payload: &[u8]) -> Result<()> {
        self.send_buffer(header_len)?;
        debug!("Sent {} bytes of PUBLISH header.", header_len);
        self.send_slice(payload)?;
        debug!("Sent {} bytes of PUBLISH payload.", payload.len());
        Ok(())
    }

    /// Subscribe to one or more topic filters.
    ///
    /// Nothing is recorded, the SUBACK surfaces as
    /// [`Event::SubAck`](super::Event::SubAck) with the same `packet_id`.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - empty list, empty filter or `packet_id` 0
    /// * [`Error::NoMemory`] - the packet does not fit the network buffer
    /// * [`Error::SendFailed`] - the transport failed
    pub fn subscribe(&mut self, subscriptions: &[SubscribeInfo<'_>], packet_id: u16) -> Result<()> {
        validate_request(subscriptions, packet_id)?;

        let size = self.codec.subscribe_packet_size(subscriptions)?;
        debug!(
            "SUBSCRIBE packet size is {} and remaining length is {}.",
            size.packet_size, size.remaining_length
        );
        let len = self
            .codec
            .serialize_subscribe(subscriptions, packet_id, &size, self.buffer)?;
        self.send_buffer(len)?;
        debug!("Sent {} bytes of SUBSCRIBE packet.", len);
        Ok(())
    }

    /// Unsubscribe from one or more topic filters.
    ///
    /// The `qos` of each entry is ignored.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub fn unsubscribe(
        &mut self,
        subscriptions: &[SubscribeInfo<'_>],
        packet_id: u16,
    ) -> Result<()> {
        validate_request(subscriptions, packet_id)?;

        let size = self.codec.unsubscribe_packet_size(subscriptions)?;
        debug!(
            "UNSUBSCRIBE packet size is {} and remaining length is {}.",
            size.packet_size, size.remaining_length
        );
        let len = self
            .codec
            .serialize_unsubscribe(subscriptions, packet_id, &size, self.buffer)?;
        self.send_buffer(len)?;
        debug!("Sent {} bytes of UNSUBSCRIBE packet.", len);
        Ok(())
    }

    /// Send a PINGREQ and start waiting for the PINGRESP.
    ///
    /// The process loop calls this on its own when the keep-alive interval
    /// runs out.
    ///
    /// # Errors
    ///
    /// * [`Error::NoMemory`] - the network buffer is too small
    /// * [`Error::SendFailed`] - the transport failed
    pub fn ping(&mut self) -> Result<()> {
        let size = self.codec.pingreq_packet_size()?;
        debug!("MQTT PINGREQ packet size is {}.", size);
        let len = self.codec.serialize_pingreq(self.buffer)?;
        self.send_buffer(len).inspect_err(|e| {
            error!("Transport send failed for PINGREQ packet: {}.", e);
        })?;

        self.ping_req_send_time = self.last_packet_time;
        self.waiting_for_ping_resp = true;
        debug!("Sent PINGREQ at {}.", self.ping_req_send_time);
        Ok(())
    }

    /// Send the acknowledgement owed in `state` and advance the record.
    ///
    /// Returns the record's new state, or `state` unchanged if nothing is
    /// owed. Failing to serialize or send is reported as
    /// [`Error::SendFailed`]; the record keeps its current state.
    pub(super) fn send_publish_ack(
        &mut self,
        packet_id: u16,
        state: PublishState,
    ) -> Result<PublishState> {
        let Some(ack) = state.ack_to_send() else {
            return Ok(state);
        };

        self.send_ack_packet(ack, packet_id)?;

        let event = StateEvent::Sent(ack);
        let next = self
            .state_table
            .transition(packet_id, event.direction(), event)
            .inspect_err(|e| error!("Failed to update state of publish {}: {}.", packet_id, e))?;
        info!("Sent {:?} for packet {}, new state {:?}.", ack, packet_id, next);
        Ok(next)
    }

    /// Send a bare acknowledgement without touching the operation table.
    pub(super) fn send_ack_packet(&mut self, ack: AckType, packet_id: u16) -> Result<()> {
        let sent = match self.codec.serialize_ack(ack, packet_id, self.buffer) {
            Ok(len) => self.send_buffer(len),
            Err(e) => Err(e),
        };
        sent.map_err(|e| {
            error!("Failed to send {:?} for packet {}: {}.", ack, packet_id, e);
            Error::SendFailed
        })
    }
}

fn validate_request(subscriptions: &[SubscribeInfo<'_>], packet_id: u16) -> Result<()> {
    if subscriptions.is_empty() {
        error!("Subscription list is empty.");
        return Err(Error::BadParameter);
    }
    if packet_id == 0 {
        error!("Packet id 0 is invalid for a subscription request.");
        return Err(Error::BadParameter);
    }
    Ok(())
}
