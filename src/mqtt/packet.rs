//! MQTT control packet types and the values exchanged with the codec.

// MQTT Control Packet types - these are the fixed header packet type values,
// including the reserved flag bits mandated for each type.
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier. The low nibble carries flags.
pub const PUBLISH: u8 = 0x30;
/// MQTT PUBACK packet type identifier.
pub const PUBACK: u8 = 0x40;
/// MQTT PUBREC packet type identifier.
pub const PUBREC: u8 = 0x50;
/// MQTT PUBREL packet type identifier.
pub const PUBREL: u8 = 0x62;
/// MQTT PUBCOMP packet type identifier.
pub const PUBCOMP: u8 = 0x70;
/// MQTT SUBSCRIBE packet type identifier.
pub const SUBSCRIBE: u8 = 0x82;
/// MQTT SUBACK packet type identifier.
pub const SUBACK: u8 = 0x90;
/// MQTT UNSUBSCRIBE packet type identifier.
pub const UNSUBSCRIBE: u8 = 0xA2;
/// MQTT UNSUBACK packet type identifier.
pub const UNSUBACK: u8 = 0xB0;
/// MQTT PINGREQ packet type identifier.
pub const PINGREQ: u8 = 0xC0;
/// MQTT PINGRESP packet type identifier.
pub const PINGRESP: u8 = 0xD0;
/// MQTT DISCONNECT packet type identifier.
pub const DISCONNECT: u8 = 0xE0;

/// Size of PUBACK, PUBREC, PUBREL and PUBCOMP on the wire.
pub const PUBLISH_ACK_PACKET_SIZE: usize = 4;

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. Higher QoS levels
/// provide stronger delivery guarantees but require more network overhead and
/// client state management.
///
/// # Examples
///
/// ```rust
/// use libiot_mqtt::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::from_bits(2), Some(QoS::ExactlyOnce));
/// assert_eq!(QoS::from_bits(3), None);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// **QoS 0**: At most once delivery. Never tracked by the engine.
    AtMostOnce = 0,

    /// **QoS 1**: At least once delivery, completed by a PUBACK.
    AtLeastOnce = 1,

    /// **QoS 2**: Exactly once delivery, completed by the
    /// PUBREC/PUBREL/PUBCOMP handshake.
    ExactlyOnce = 2,
}

impl QoS {
    /// Decode the two-bit QoS field of a fixed header.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// A PUBLISH, either to be sent or as deserialized from the network buffer.
///
/// Incoming publishes borrow their topic and payload straight from the
/// network buffer, so they are only valid for the duration of the event
/// callback.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PublishInfo<'a> {
    /// Delivery guarantee.
    pub qos: QoS,
    /// Whether the broker should retain the message.
    pub retain: bool,
    /// Whether this is a redelivery of an earlier attempt.
    pub dup: bool,
    /// Topic name. Must not be empty.
    pub topic: &'a str,
    /// Application payload. Sent directly from caller memory.
    pub payload: &'a [u8],
}

/// Configuration options for the CONNECT packet.
///
/// # Examples
///
/// ```rust
/// use libiot_mqtt::mqtt::ConnectInfo;
///
/// let info = ConnectInfo {
///     client_id: "my_iot_device",
///     keep_alive_seconds: 60,
///     clean_session: true,
///     username: None,
///     password: None,
/// };
/// assert_eq!(info.keep_alive_seconds, 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectInfo<'a> {
    /// The client identifier, must be unique within the broker.
    ///
    /// If a client connects with a client identifier that is already in use by
    /// another client, the broker will disconnect the existing client. An
    /// empty identifier is rejected with [`Error::BadParameter`](super::Error::BadParameter).
    pub client_id: &'a str,

    /// The keep-alive time interval in seconds. A value of 0 disables
    /// keep-alive, otherwise the engine sends a PINGREQ whenever nothing has
    /// been sent for this long.
    pub keep_alive_seconds: u16,

    /// Whether to start a clean session.
    ///
    /// - `true`: The broker will discard any previous session state and start fresh
    /// - `false`: The broker will resume the previous session if one exists
    pub clean_session: bool,

    /// Optional user name.
    pub username: Option<&'a str>,

    /// Optional password. MQTT 3.1.1 only allows it together with a user name.
    pub password: Option<&'a [u8]>,
}

/// One topic filter of a SUBSCRIBE or UNSUBSCRIBE request.
///
/// `qos` is ignored when the filter is used for UNSUBSCRIBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscribeInfo<'a> {
    /// Topic filter, wildcards allowed. Must not be empty.
    pub topic_filter: &'a str,
    /// Maximum QoS requested for the filter.
    pub qos: QoS,
}

/// Type and length of an incoming packet, as read from its fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketInfo {
    /// First byte of the fixed header, flags included.
    pub packet_type: u8,
    /// Number of bytes following the fixed header.
    pub remaining_length: usize,
}

impl PacketInfo {
    /// Whether this is a PUBLISH, whose low nibble carries flags.
    pub const fn is_publish(&self) -> bool {
        self.packet_type & 0xF0 == PUBLISH
    }
}

/// Sizes reported by the codec before serializing a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketSize {
    /// Value of the remaining length field.
    pub remaining_length: usize,
    /// Size of the whole packet, fixed header included.
    pub packet_size: usize,
}

/// Fields of a deserialized acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ack<'a> {
    /// Packet identifier, 0 for CONNACK and PINGRESP.
    pub packet_id: u16,
    /// Session present flag, only meaningful for CONNACK.
    pub session_present: bool,
    /// SUBACK return codes, one per requested filter. Empty otherwise.
    pub return_codes: &'a [u8],
}

/// The four acknowledgements of the QoS 1 and QoS 2 publish flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckType {
    /// Completes QoS 1.
    PubAck,
    /// First answer to a QoS 2 PUBLISH.
    PubRec,
    /// Release sent by the publisher after PUBREC.
    PubRel,
    /// Completes QoS 2.
    PubComp,
}

impl AckType {
    /// Fixed header byte for this acknowledgement.
    pub const fn packet_type(self) -> u8 {
        match self {
            AckType::PubAck => PUBACK,
            AckType::PubRec => PUBREC,
            AckType::PubRel => PUBREL,
            AckType::PubComp => PUBCOMP,
        }
    }

    /// Map a fixed header byte back to an acknowledgement, if it is one.
    pub const fn from_packet_type(packet_type: u8) -> Option<Self> {
        match packet_type {
            PUBACK => Some(AckType::PubAck),
            PUBREC => Some(AckType::PubRec),
            PUBREL => Some(AckType::PubRel),
            PUBCOMP => Some(AckType::PubComp),
            _ => None,
        }
    }
}
