//! Events surfaced to the application.

use super::packet::PublishInfo;

/// Something the broker sent that the application may care about.
///
/// Events are delivered synchronously from inside
/// [`Context::process_loop`](super::Context::process_loop), on the caller's
/// thread. Borrowed data points into the network buffer and is overwritten by
/// the next packet, so copy out whatever must outlive the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event<'a> {
    /// An incoming PUBLISH. For QoS 1 and 2 the engine has already recorded
    /// it and sends the PUBACK or PUBREC right after the callback returns.
    Publish {
        /// Packet identifier, 0 for QoS 0.
        packet_id: u16,
        /// Topic, payload and flags.
        publish: PublishInfo<'a>,
    },
    /// An outgoing QoS 1 publish completed.
    PubAck {
        /// Identifier of the completed publish.
        packet_id: u16,
    },
    /// The broker received an outgoing QoS 2 publish.
    PubRec {
        /// Identifier of the publish.
        packet_id: u16,
    },
    /// The broker released an incoming QoS 2 publish.
    PubRel {
        /// Identifier of the publish.
        packet_id: u16,
    },
    /// An outgoing QoS 2 publish completed.
    PubComp {
        /// Identifier of the completed publish.
        packet_id: u16,
    },
    /// The broker answered a SUBSCRIBE.
    SubAck {
        /// Identifier of the SUBSCRIBE.
        packet_id: u16,
        /// Granted QoS per filter, or `0x80` for a rejected filter.
        return_codes: &'a [u8],
    },
    /// The broker answered an UNSUBSCRIBE.
    UnsubAck {
        /// Identifier of the UNSUBSCRIBE.
        packet_id: u16,
    },
    /// The broker answered a PINGREQ.
    PingResp,
}

impl Event<'_> {
    /// Packet identifier the event refers to, if any.
    pub const fn packet_id(&self) -> Option<u16> {
        match *self {
            Event::Publish { packet_id, .. }
            | Event::PubAck { packet_id }
            | Event::PubRec { packet_id }
            | Event::PubRel { packet_id }
            | Event::PubComp { packet_id }
            | Event::SubAck { packet_id, .. }
            | Event::UnsubAck { packet_id } => Some(packet_id),
            Event::PingResp => None,
        }
    }
}

/// Receiver of [`Event`]s.
///
/// Implemented for every `FnMut(Event<'_>)`, so a closure is usually enough.
pub trait EventHandler {
    /// Handle one event.
    fn on_event(&mut self, event: Event<'_>);
}

impl<F> EventHandler for F
where
    F: FnMut(Event<'_>),
{
    fn on_event(&mut self, event: Event<'_>) {
        self(event)
    }
}
