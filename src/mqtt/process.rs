//! Receive path and keep-alive.

use log::{error, info, warn};

use super::codec::Codec;
use super::context::Context;
use super::error::{Error, Result};
use super::event::{Event, EventHandler};
use super::packet::{
    AckType, PacketInfo, QoS, PINGRESP, PUBACK, PUBCOMP, PUBREC, PUBREL, SUBACK, UNSUBACK,
};
use super::state::{Direction, PublishState, StateEvent};
use super::time::{elapsed, Clock};
use crate::network::Transport;

impl<T, C, H, K, const N: usize> Context<'_, T, C, H, K, N>
where
    T: Transport,
    C: Clock,
    H: EventHandler,
    K: Codec,
{
    /// Service the connection for `timeout_ms` milliseconds.
    ///
    /// Each cycle checks keep-alive, tries to read one packet and dispatches
    /// it. An overdue PINGRESP fails the cycle only after its read attempt,
    /// so a PINGRESP already waiting in the transport is not missed.
    /// Incoming publishes are acknowledged, acknowledgements advance the
    /// in-flight table and may trigger a PUBREL or PUBCOMP. Events reach the
    /// handler before any follow-up acknowledgement is sent. A retransmitted
    /// PUBREC or PUBREL whose follow-up was never sent gets it sent again.
    ///
    /// At least one cycle runs, so a zero timeout makes exactly one read
    /// attempt. Having nothing to read is not an error. The first fatal
    /// error ends the loop and is returned; work completed before it stays
    /// completed.
    ///
    /// # Errors
    ///
    /// * [`Error::KeepAliveTimeout`] - a PINGREQ went unanswered
    /// * [`Error::SendFailed`] - a PINGREQ or acknowledgement could not be sent
    /// * [`Error::RecvFailed`] - the transport failed or a packet arrived short
    /// * [`Error::BadResponse`] - an unexpected or malformed packet arrived
    /// * [`Error::IllegalState`] - an acknowledgement matched no in-flight state
    /// * [`Error::NoMemory`] - too many incoming publishes are in flight
    pub fn process_loop(&mut self, timeout_ms: u32) -> Result<()> {
        let entry = self.clock.now_ms();
        let mut remaining = timeout_ms;

        loop {
            if let Err(e) = self.process_once(remaining) {
                error!("Exiting process loop: {}.", e);
                return Err(e);
            }

            let spent = elapsed(self.clock.now_ms(), entry);
            if spent >= timeout_ms {
                return Ok(());
            }
            remaining = timeout_ms - spent;
        }
    }

    fn process_once(&mut self, remaining_ms: u32) -> Result<()> {
        let pingresp_overdue = self.handle_keep_alive()?;

        self.receive_and_dispatch(remaining_ms)?;

        // A PINGRESP read this cycle still counts.
        if pingresp_overdue && self.waiting_for_ping_resp {
            error!(
                "No PINGRESP within {} ms of the PINGREQ.",
                self.ping_resp_timeout_ms
            );
            return Err(Error::KeepAliveTimeout);
        }
        Ok(())
    }

    fn receive_and_dispatch(&mut self, remaining_ms: u32) -> Result<()> {
        let packet = match self
            .codec
            .incoming_packet_type_and_length(&mut self.transport)
        {
            Ok(packet) => packet,
            Err(Error::NoDataAvailable) => return Ok(()),
            Err(e) => return Err(e),
        };

        match self.receive_packet(&packet, remaining_ms) {
            Ok(()) => {}
            Err(Error::NoDataAvailable) => return Ok(()),
            Err(e) => return Err(e),
        }

        if packet.is_publish() {
            self.handle_incoming_publish(&packet)
        } else {
            self.handle_incoming_ack(&packet)
        }
    }

    /// Send a PINGREQ if one is due. Returns whether the PINGRESP to an
    /// earlier PINGREQ is overdue.
    fn handle_keep_alive(&mut self) -> Result<bool> {
        let interval_ms = u32::from(self.keep_alive_interval_sec) * 1000;
        if interval_ms == 0 {
            return Ok(false);
        }

        let now = self.clock.now_ms();
        if self.waiting_for_ping_resp {
            return Ok(elapsed(now, self.ping_req_send_time) >= self.ping_resp_timeout_ms);
        }
        if elapsed(now, self.last_packet_time) >= interval_ms {
            self.ping()?;
        }
        Ok(false)
    }

    fn handle_incoming_publish(&mut self, packet: &PacketInfo) -> Result<()> {
        let body = self
            .buffer
            .get(..packet.remaining_length)
            .ok_or(Error::BadResponse)?;
        let (packet_id, publish) = self.codec.deserialize_publish(packet, body)?;
        info!(
            "Incoming PUBLISH {} on {} with QoS {}.",
            packet_id, publish.topic, publish.qos as u8
        );

        if publish.qos == QoS::AtMostOnce {
            self.handler.on_event(Event::Publish { packet_id, publish });
            return Ok(());
        }

        match self
            .state_table
            .reserve(packet_id, Direction::Incoming, publish.qos)
        {
            Ok(state) => {
                self.handler.on_event(Event::Publish { packet_id, publish });
                self.send_publish_ack(packet_id, state)?;
                Ok(())
            }
            Err(Error::StateCollision) => self.handle_duplicate_publish(packet_id),
            Err(e) => {
                error!("Cannot track incoming PUBLISH {}: {}.", packet_id, e);
                Err(e)
            }
        }
    }

    /// A retransmitted publish whose record still exists is acknowledged
    /// again but not delivered again.
    fn handle_duplicate_publish(&mut self, packet_id: u16) -> Result<()> {
        match self.state_table.state(packet_id, Direction::Incoming) {
            PublishState::PubRelPending => {
                warn!("Duplicate PUBLISH {}, resending PUBREC.", packet_id);
                self.send_ack_packet(AckType::PubRec, packet_id)
            }
            state @ (PublishState::PubAckSend | PublishState::PubRecSend) => {
                warn!("Duplicate PUBLISH {}, retrying its acknowledgement.", packet_id);
                self.send_publish_ack(packet_id, state).map(|_| ())
            }
            state => {
                error!(
                    "Duplicate PUBLISH {} collides with a record in {:?}.",
                    packet_id, state
                );
                Err(Error::StateCollision)
            }
        }
    }

    fn handle_incoming_ack(&mut self, packet: &PacketInfo) -> Result<()> {
        if !matches!(
            packet.packet_type,
            PUBACK | PUBREC | PUBREL | PUBCOMP | SUBACK | UNSUBACK | PINGRESP
        ) {
            error!(
                "Unexpected packet type from server: {:#04x}.",
                packet.packet_type
            );
            return Err(Error::BadResponse);
        }

        let body = self
            .buffer
            .get(..packet.remaining_length)
            .ok_or(Error::BadResponse)?;
        let ack = self.codec.deserialize_ack(packet, body)?;
        let packet_id = ack.packet_id;

        match AckType::from_packet_type(packet.packet_type) {
            Some(ack_type) => self.handle_publish_ack(ack_type, packet_id),
            None => {
                let event = match packet.packet_type {
                    PINGRESP => {
                        self.waiting_for_ping_resp = false;
                        Event::PingResp
                    }
                    SUBACK => Event::SubAck {
                        packet_id,
                        return_codes: ack.return_codes,
                    },
                    _ => Event::UnsubAck { packet_id },
                };
                info!("Received {:?}.", event);
                self.handler.on_event(event);
                Ok(())
            }
        }
    }

    fn handle_publish_ack(&mut self, ack_type: AckType, packet_id: u16) -> Result<()> {
        let event = StateEvent::Received(ack_type);
        let direction = event.direction();

        match (ack_type, self.state_table.state(packet_id, direction)) {
            (AckType::PubRel | AckType::PubComp, PublishState::Null) => {
                warn!(
                    "{:?} for unknown packet {} absorbed.",
                    ack_type, packet_id
                );
                if ack_type == AckType::PubRel {
                    self.send_ack_packet(AckType::PubComp, packet_id)?;
                }
                return Ok(());
            }
            // The follow-up to the first copy was never sent.
            (AckType::PubRec, state @ PublishState::PubRelSend)
            | (AckType::PubRel, state @ PublishState::PubCompSend) => {
                warn!(
                    "Retransmitted {:?} for packet {}, sending the owed acknowledgement.",
                    ack_type, packet_id
                );
                self.send_publish_ack(packet_id, state)?;
                return Ok(());
            }
            _ => {}
        }

        let state = self
            .state_table
            .transition(packet_id, direction, event)
            .inspect_err(|e| {
                error!(
                    "{:?} for packet {} rejected by the operation table: {}.",
                    ack_type, packet_id, e
                )
            })?;
        info!(
            "{:?} received for packet {}, new state {:?}.",
            ack_type, packet_id, state
        );

        self.handler.on_event(match ack_type {
            AckType::PubAck => Event::PubAck { packet_id },
            AckType::PubRec => Event::PubRec { packet_id },
            AckType::PubRel => Event::PubRel { packet_id },
            AckType::PubComp => Event::PubComp { packet_id },
        });

        self.send_publish_ack(packet_id, state)?;
        Ok(())
    }
}
