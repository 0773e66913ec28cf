//! Packet serialization and deserialization.
//!
//! The engine never touches raw MQTT bytes itself. It asks a [`Codec`] how
//! large a packet will be, has it serialized into the network buffer, and
//! has incoming bodies deserialized into the borrowed views from
//! [`packet`](super::packet). [`Mqtt311Codec`] is the stock MQTT 3.1.1
//! implementation.
//!
//! # Remaining Length
//!
//! Every MQTT packet starts with a one byte type followed by the remaining
//! length, a variable-length integer of one to four bytes. Each byte carries
//! seven bits of the value and sets its top bit when another byte follows,
//! allowing values from 0 to 268,435,455 (`0xFF, 0xFF, 0xFF, 0x7F`).

use log::{debug, error};

use super::error::{Error, Result};
use super::packet::{
    Ack, AckType, ConnectInfo, PacketInfo, PacketSize, PublishInfo, QoS, SubscribeInfo, CONNACK,
    CONNECT, DISCONNECT, PINGREQ, PINGRESP, PUBACK, PUBCOMP, PUBLISH, PUBLISH_ACK_PACKET_SIZE,
    PUBREC, PUBREL, SUBACK, SUBSCRIBE, UNSUBACK, UNSUBSCRIBE,
};
use crate::network::Read;

/// Largest value the remaining length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Protocol name and level 4 of the CONNECT variable header.
const PROTOCOL_NAME_AND_LEVEL: [u8; 7] = [0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04];
/// Protocol name, level, connect flags and keep-alive.
const CONNECT_VARIABLE_HEADER_SIZE: usize = 10;

const CONNECT_FLAG_CLEAN: u8 = 0x02;
const CONNECT_FLAG_WILL: u8 = 0x04;
const CONNECT_FLAG_WILL_RETAIN: u8 = 0x20;
const CONNECT_FLAG_PASSWORD: u8 = 0x40;
const CONNECT_FLAG_USERNAME: u8 = 0x80;

const PUBLISH_FLAG_RETAIN: u8 = 0x01;
const PUBLISH_FLAG_DUP: u8 = 0x08;

/// SUBACK return code for a rejected filter.
pub const SUBACK_FAILURE: u8 = 0x80;

/// Serializer and deserializer for MQTT control packets.
///
/// Size queries validate their input and return [`Error::BadParameter`] for
/// anything that cannot be encoded. Serializers write into the front of
/// `buf`, return the number of bytes written and fail with
/// [`Error::NoMemory`] when `buf` is too small. Deserializers borrow from the
/// body they are given and fail with [`Error::BadResponse`] on malformed
/// input.
pub trait Codec {
    /// Size of a CONNECT packet for `info` and an optional last will.
    fn connect_packet_size(
        &self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo<'_>>,
    ) -> Result<PacketSize>;

    /// Serialize a complete CONNECT packet.
    fn serialize_connect(
        &self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo<'_>>,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize>;

    /// Size of a PUBLISH packet, payload included.
    fn publish_packet_size(&self, info: &PublishInfo<'_>) -> Result<PacketSize>;

    /// Serialize everything of a PUBLISH except its payload.
    ///
    /// Returns the header size. The payload is sent by the engine straight
    /// from caller memory.
    fn serialize_publish_header(
        &self,
        info: &PublishInfo<'_>,
        packet_id: u16,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize>;

    /// Size of a SUBSCRIBE packet for `subscriptions`.
    fn subscribe_packet_size(&self, subscriptions: &[SubscribeInfo<'_>]) -> Result<PacketSize>;

    /// Serialize a complete SUBSCRIBE packet.
    fn serialize_subscribe(
        &self,
        subscriptions: &[SubscribeInfo<'_>],
        packet_id: u16,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize>;

    /// Size of an UNSUBSCRIBE packet for `subscriptions`.
    fn unsubscribe_packet_size(&self, subscriptions: &[SubscribeInfo<'_>])
        -> Result<PacketSize>;

    /// Serialize a complete UNSUBSCRIBE packet.
    fn serialize_unsubscribe(
        &self,
        subscriptions: &[SubscribeInfo<'_>],
        packet_id: u16,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize>;

    /// Size of a PINGREQ packet.
    fn pingreq_packet_size(&self) -> Result<usize>;

    /// Serialize a PINGREQ packet.
    fn serialize_pingreq(&self, buf: &mut [u8]) -> Result<usize>;

    /// Size of a DISCONNECT packet.
    fn disconnect_packet_size(&self) -> Result<usize>;

    /// Serialize a DISCONNECT packet.
    fn serialize_disconnect(&self, buf: &mut [u8]) -> Result<usize>;

    /// Serialize a PUBACK, PUBREC, PUBREL or PUBCOMP.
    fn serialize_ack(&self, ack: AckType, packet_id: u16, buf: &mut [u8]) -> Result<usize>;

    /// Deserialize the body of an incoming PUBLISH.
    ///
    /// Returns the packet identifier, 0 for QoS 0, and the publish borrowing
    /// its topic and payload from `body`.
    fn deserialize_publish<'b>(
        &self,
        info: &PacketInfo,
        body: &'b [u8],
    ) -> Result<(u16, PublishInfo<'b>)>;

    /// Deserialize the body of any incoming acknowledgement, CONNACK included.
    ///
    /// A CONNACK carrying a refusal code fails with [`Error::ServerRefused`].
    fn deserialize_ack<'b>(&self, info: &PacketInfo, body: &'b [u8]) -> Result<Ack<'b>>;

    /// Read the fixed header of the next incoming packet from `transport`.
    ///
    /// Fails with [`Error::NoDataAvailable`] if the transport has nothing to
    /// read, without consuming anything.
    fn incoming_packet_type_and_length<R: Read + ?Sized>(
        &self,
        transport: &mut R,
    ) -> Result<PacketInfo>;
}

/// The stock MQTT 3.1.1 codec.
///
/// # Examples
///
/// ```rust
/// use libiot_mqtt::mqtt::{Codec, Mqtt311Codec};
///
/// let codec = Mqtt311Codec;
/// let mut buf = [0u8; 2];
/// let size = codec.pingreq_packet_size().unwrap();
/// assert_eq!(codec.serialize_pingreq(&mut buf[..size]), Ok(2));
/// assert_eq!(buf, [0xC0, 0x00]);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Mqtt311Codec;

/// Number of bytes needed to encode `len` as a remaining length.
fn remaining_length_size(len: usize) -> usize {
    match len {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

/// Turn a remaining length into the full packet size.
fn packet_size(remaining_length: usize) -> Result<PacketSize> {
    if remaining_length > MAX_REMAINING_LENGTH {
        error!(
            "Remaining length {} exceeds the MQTT maximum of {}.",
            remaining_length, MAX_REMAINING_LENGTH
        );
        return Err(Error::BadParameter);
    }
    Ok(PacketSize {
        remaining_length,
        packet_size: 1 + remaining_length_size(remaining_length) + remaining_length,
    })
}

/// Encoded size of a length-prefixed UTF-8 string or binary field.
fn field_size(len: usize) -> Result<usize> {
    if len > u16::MAX as usize {
        error!("Field of {} bytes exceeds the 65535 byte limit.", len);
        return Err(Error::BadParameter);
    }
    Ok(2 + len)
}

fn validate_filters(subscriptions: &[SubscribeInfo<'_>]) -> Result<()> {
    if subscriptions.is_empty() {
        error!("Subscription list is empty.");
        return Err(Error::BadParameter);
    }
    if subscriptions.iter().any(|s| s.topic_filter.is_empty()) {
        error!("Topic filter cannot be empty.");
        return Err(Error::BadParameter);
    }
    Ok(())
}

fn validate_publish(info: &PublishInfo<'_>) -> Result<()> {
    if info.topic.is_empty() {
        error!("PUBLISH topic cannot be empty.");
        return Err(Error::BadParameter);
    }
    if info.dup && info.qos == QoS::AtMostOnce {
        error!("DUP flag cannot be set on a QoS 0 PUBLISH.");
        return Err(Error::BadParameter);
    }
    Ok(())
}

/// Bounds-checked cursor over the network buffer.
struct Writer<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl<'b> Writer<'b> {
    fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        let dst = self.buf.get_mut(self.pos..end).ok_or(Error::NoMemory)?;
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn put_u8(&mut self, byte: u8) -> Result<()> {
        self.put_bytes(&[byte])
    }

    fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_bytes(&value.to_be_bytes())
    }

    /// Length-prefixed field. Lengths were validated by the size query.
    fn put_field(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u16::try_from(bytes.len()).map_err(|_| Error::BadParameter)?;
        self.put_u16(len)?;
        self.put_bytes(bytes)
    }

    fn put_remaining_length(&mut self, mut len: usize) -> Result<()> {
        loop {
            let mut byte = (len % 128) as u8;
            len /= 128;
            if len > 0 {
                byte |= 0x80;
            }
            self.put_u8(byte)?;
            if len == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Fail early if the whole packet cannot fit.
    fn reserve(&self, size: usize) -> Result<()> {
        if size > self.buf.len() {
            error!(
                "Buffer of {} bytes is too small for a {} byte packet.",
                self.buf.len(),
                size
            );
            return Err(Error::NoMemory);
        }
        Ok(())
    }

    fn written(&self) -> usize {
        self.pos
    }
}

/// Read a big-endian `u16` at `pos`.
fn read_u16(body: &[u8], pos: usize) -> Result<u16> {
    match body.get(pos..pos + 2) {
        Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(Error::BadResponse),
    }
}

/// Read one byte of the remaining length from the transport.
fn read_length_byte<R: Read + ?Sized>(transport: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    match transport.read(&mut byte) {
        Ok(1) => Ok(byte[0]),
        Ok(_) => {
            error!("Transport ran dry inside a remaining length field.");
            Err(Error::BadResponse)
        }
        Err(e) => {
            error!("Transport read failed: {:?}.", e);
            Err(Error::RecvFailed)
        }
    }
}

/// Whether a fixed header byte is one the broker may send to a client.
fn is_valid_incoming_type(packet_type: u8) -> bool {
    match packet_type & 0xF0 {
        // QoS 3 is malformed.
        PUBLISH => packet_type & 0x06 != 0x06,
        _ => matches!(
            packet_type,
            CONNACK | PUBACK | PUBREC | PUBREL | PUBCOMP | SUBACK | UNSUBACK | PINGRESP
        ),
    }
}

/// Check a 2-byte body holding a non-zero packet identifier.
fn packet_id_body(info: &PacketInfo, body: &[u8]) -> Result<u16> {
    if info.remaining_length != 2 {
        error!(
            "Packet {:#04x} has remaining length {}, expected 2.",
            info.packet_type, info.remaining_length
        );
        return Err(Error::BadResponse);
    }
    let packet_id = read_u16(body, 0)?;
    if packet_id == 0 {
        error!("Packet {:#04x} carries packet id 0.", info.packet_type);
        return Err(Error::BadResponse);
    }
    Ok(packet_id)
}

fn deserialize_connack<'b>(info: &PacketInfo, body: &'b [u8]) -> Result<Ack<'b>> {
    if info.remaining_length != 2 {
        error!("CONNACK has remaining length {}.", info.remaining_length);
        return Err(Error::BadResponse);
    }
    let (flags, return_code) = match body.get(..2) {
        Some(&[flags, code]) => (flags, code),
        _ => return Err(Error::BadResponse),
    };
    if flags & 0xFE != 0 {
        error!("CONNACK acknowledge flags {:#04x} use reserved bits.", flags);
        return Err(Error::BadResponse);
    }
    let session_present = flags == 0x01;

    match return_code {
        0 => {
            debug!("CONNACK accepted, session present: {}.", session_present);
            Ok(Ack {
                packet_id: 0,
                session_present,
                return_codes: &[],
            })
        }
        // A refusal must not claim a session.
        1..=5 if !session_present => {
            error!("Broker refused the connection with code {}.", return_code);
            Err(Error::ServerRefused)
        }
        _ => {
            error!("Invalid CONNACK return code {}.", return_code);
            Err(Error::BadResponse)
        }
    }
}

fn deserialize_suback<'b>(info: &PacketInfo, body: &'b [u8]) -> Result<Ack<'b>> {
    if info.remaining_length < 3 {
        error!("SUBACK has remaining length {}.", info.remaining_length);
        return Err(Error::BadResponse);
    }
    let packet_id = read_u16(body, 0)?;
    if packet_id == 0 {
        return Err(Error::BadResponse);
    }
    let return_codes = body
        .get(2..info.remaining_length)
        .ok_or(Error::BadResponse)?;
    if let Some(code) = return_codes
        .iter()
        .find(|&&c| !matches!(c, 0x00 | 0x01 | 0x02 | SUBACK_FAILURE))
    {
        error!("Invalid SUBACK return code {:#04x}.", code);
        return Err(Error::BadResponse);
    }
    Ok(Ack {
        packet_id,
        session_present: false,
        return_codes,
    })
}

impl Codec for Mqtt311Codec {
    fn connect_packet_size(
        &self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo<'_>>,
    ) -> Result<PacketSize> {
        if info.client_id.is_empty() {
            error!("Client identifier cannot be empty.");
            return Err(Error::BadParameter);
        }
        if info.password.is_some() && info.username.is_none() {
            error!("A password requires a user name.");
            return Err(Error::BadParameter);
        }

        let mut remaining = CONNECT_VARIABLE_HEADER_SIZE + field_size(info.client_id.len())?;
        if let Some(will) = will {
            if will.topic.is_empty() {
                error!("Will topic cannot be empty.");
                return Err(Error::BadParameter);
            }
            remaining += field_size(will.topic.len())? + field_size(will.payload.len())?;
        }
        if let Some(username) = info.username {
            remaining += field_size(username.len())?;
        }
        if let Some(password) = info.password {
            remaining += field_size(password.len())?;
        }

        packet_size(remaining)
    }

    fn serialize_connect(
        &self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo<'_>>,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize> {
        let mut w = Writer::new(buf);
        w.reserve(size.packet_size)?;

        let mut flags = 0u8;
        if info.clean_session {
            flags |= CONNECT_FLAG_CLEAN;
        }
        if let Some(will) = will {
            flags |= CONNECT_FLAG_WILL | ((will.qos as u8) << 3);
            if will.retain {
                flags |= CONNECT_FLAG_WILL_RETAIN;
            }
        }
        if info.username.is_some() {
            flags |= CONNECT_FLAG_USERNAME;
        }
        if info.password.is_some() {
            flags |= CONNECT_FLAG_PASSWORD;
        }

        w.put_u8(CONNECT)?;
        w.put_remaining_length(size.remaining_length)?;
        w.put_bytes(&PROTOCOL_NAME_AND_LEVEL)?;
        w.put_u8(flags)?;
        w.put_u16(info.keep_alive_seconds)?;

        w.put_field(info.client_id.as_bytes())?;
        if let Some(will) = will {
            w.put_field(will.topic.as_bytes())?;
            w.put_field(will.payload)?;
        }
        if let Some(username) = info.username {
            w.put_field(username.as_bytes())?;
        }
        if let Some(password) = info.password {
            w.put_field(password)?;
        }

        Ok(w.written())
    }

    fn publish_packet_size(&self, info: &PublishInfo<'_>) -> Result<PacketSize> {
        validate_publish(info)?;
        let mut remaining = field_size(info.topic.len())? + info.payload.len();
        if info.qos > QoS::AtMostOnce {
            remaining += 2;
        }
        packet_size(remaining)
    }

    fn serialize_publish_header(
        &self,
        info: &PublishInfo<'_>,
        packet_id: u16,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize> {
        validate_publish(info)?;
        if info.qos > QoS::AtMostOnce && packet_id == 0 {
            error!("Packet id 0 is invalid for a QoS {} PUBLISH.", info.qos as u8);
            return Err(Error::BadParameter);
        }

        let header_size = size
            .packet_size
            .checked_sub(info.payload.len())
            .ok_or(Error::BadParameter)?;
        let mut w = Writer::new(buf);
        w.reserve(header_size)?;

        let mut first = PUBLISH | ((info.qos as u8) << 1);
        if info.dup {
            first |= PUBLISH_FLAG_DUP;
        }
        if info.retain {
            first |= PUBLISH_FLAG_RETAIN;
        }

        w.put_u8(first)?;
        w.put_remaining_length(size.remaining_length)?;
        w.put_field(info.topic.as_bytes())?;
        if info.qos > QoS::AtMostOnce {
            w.put_u16(packet_id)?;
        }

        Ok(w.written())
    }

    fn subscribe_packet_size(&self, subscriptions: &[SubscribeInfo<'_>]) -> Result<PacketSize> {
        validate_filters(subscriptions)?;
        let mut remaining = 2;
        for s in subscriptions {
            remaining += field_size(s.topic_filter.len())? + 1;
        }
        packet_size(remaining)
    }

    fn serialize_subscribe(
        &self,
        subscriptions: &[SubscribeInfo<'_>],
        packet_id: u16,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize> {
        validate_filters(subscriptions)?;
        if packet_id == 0 {
            return Err(Error::BadParameter);
        }
        let mut w = Writer::new(buf);
        w.reserve(size.packet_size)?;

        w.put_u8(SUBSCRIBE)?;
        w.put_remaining_length(size.remaining_length)?;
        w.put_u16(packet_id)?;
        for s in subscriptions {
            w.put_field(s.topic_filter.as_bytes())?;
            w.put_u8(s.qos as u8)?;
        }
        Ok(w.written())
    }

    fn unsubscribe_packet_size(
        &self,
        subscriptions: &[SubscribeInfo<'_>],
    ) -> Result<PacketSize> {
        validate_filters(subscriptions)?;
        let mut remaining = 2;
        for s in subscriptions {
            remaining += field_size(s.topic_filter.len())?;
        }
        packet_size(remaining)
    }

    fn serialize_unsubscribe(
        &self,
        subscriptions: &[SubscribeInfo<'_>],
        packet_id: u16,
        size: &PacketSize,
        buf: &mut [u8],
    ) -> Result<usize> {
        validate_filters(subscriptions)?;
        if packet_id == 0 {
            return Err(Error::BadParameter);
        }
        let mut w = Writer::new(buf);
        w.reserve(size.packet_size)?;

        w.put_u8(UNSUBSCRIBE)?;
        w.put_remaining_length(size.remaining_length)?;
        w.put_u16(packet_id)?;
        for s in subscriptions {
            w.put_field(s.topic_filter.as_bytes())?;
        }
        Ok(w.written())
    }

    fn pingreq_packet_size(&self) -> Result<usize> {
        Ok(2)
    }

    fn serialize_pingreq(&self, buf: &mut [u8]) -> Result<usize> {
        let mut w = Writer::new(buf);
        w.reserve(2)?;
        w.put_bytes(&[PINGREQ, 0x00])?;
        Ok(w.written())
    }

    fn disconnect_packet_size(&self) -> Result<usize> {
        Ok(2)
    }

    fn serialize_disconnect(&self, buf: &mut [u8]) -> Result<usize> {
        let mut w = Writer::new(buf);
        w.reserve(2)?;
        w.put_bytes(&[DISCONNECT, 0x00])?;
        Ok(w.written())
    }

    fn serialize_ack(&self, ack: AckType, packet_id: u16, buf: &mut [u8]) -> Result<usize> {
        if packet_id == 0 {
            error!("Packet id 0 is invalid for {:?}.", ack);
            return Err(Error::BadParameter);
        }
        let mut w = Writer::new(buf);
        w.reserve(PUBLISH_ACK_PACKET_SIZE)?;
        w.put_u8(ack.packet_type())?;
        w.put_u8(0x02)?;
        w.put_u16(packet_id)?;
        Ok(w.written())
    }

    fn deserialize_publish<'b>(
        &self,
        info: &PacketInfo,
        body: &'b [u8],
    ) -> Result<(u16, PublishInfo<'b>)> {
        if !info.is_publish() {
            return Err(Error::BadParameter);
        }
        let qos = QoS::from_bits((info.packet_type >> 1) & 0x03).ok_or_else(|| {
            error!("Incoming PUBLISH has QoS 3.");
            Error::BadResponse
        })?;
        let dup = info.packet_type & PUBLISH_FLAG_DUP != 0;
        let retain = info.packet_type & PUBLISH_FLAG_RETAIN != 0;
        if dup && qos == QoS::AtMostOnce {
            error!("Incoming QoS 0 PUBLISH has DUP set.");
            return Err(Error::BadResponse);
        }

        let body = body.get(..info.remaining_length).ok_or(Error::BadResponse)?;
        let topic_len = read_u16(body, 0)? as usize;
        let topic_end = 2 + topic_len;
        let topic = body.get(2..topic_end).ok_or(Error::BadResponse)?;
        let topic = core::str::from_utf8(topic).map_err(|_| {
            error!("Incoming PUBLISH topic is not valid UTF-8.");
            Error::BadResponse
        })?;
        if topic.is_empty() {
            error!("Incoming PUBLISH has an empty topic.");
            return Err(Error::BadResponse);
        }

        let (packet_id, payload_start) = if qos > QoS::AtMostOnce {
            let packet_id = read_u16(body, topic_end)?;
            if packet_id == 0 {
                error!("Incoming QoS {} PUBLISH has packet id 0.", qos as u8);
                return Err(Error::BadResponse);
            }
            (packet_id, topic_end + 2)
        } else {
            (0, topic_end)
        };
        let payload = &body[payload_start..];

        debug!(
            "Deserialized PUBLISH: id {}, topic {}, {} byte payload.",
            packet_id,
            topic,
            payload.len()
        );
        Ok((
            packet_id,
            PublishInfo {
                qos,
                retain,
                dup,
                topic,
                payload,
            },
        ))
    }

    fn deserialize_ack<'b>(&self, info: &PacketInfo, body: &'b [u8]) -> Result<Ack<'b>> {
        match info.packet_type {
            CONNACK => deserialize_connack(info, body),
            SUBACK => deserialize_suback(info, body),
            PUBACK | PUBREC | PUBREL | PUBCOMP | UNSUBACK => Ok(Ack {
                packet_id: packet_id_body(info, body)?,
                session_present: false,
                return_codes: &[],
            }),
            PINGRESP if info.remaining_length == 0 => Ok(Ack {
                packet_id: 0,
                session_present: false,
                return_codes: &[],
            }),
            other => {
                error!(
                    "Cannot deserialize packet {:#04x} with remaining length {} as an ack.",
                    other, info.remaining_length
                );
                Err(Error::BadResponse)
            }
        }
    }

    fn incoming_packet_type_and_length<R: Read + ?Sized>(
        &self,
        transport: &mut R,
    ) -> Result<PacketInfo> {
        let mut first = [0u8; 1];
        match transport.read(&mut first) {
            Ok(0) => return Err(Error::NoDataAvailable),
            Ok(_) => {}
            Err(e) => {
                error!("Transport read failed: {:?}.", e);
                return Err(Error::RecvFailed);
            }
        }
        let packet_type = first[0];

        let mut remaining_length = 0usize;
        let mut encoded_bytes = 0usize;
        loop {
            if encoded_bytes == 4 {
                error!("Remaining length field is longer than four bytes.");
                return Err(Error::BadResponse);
            }
            let byte = read_length_byte(transport)?;
            remaining_length |= (byte as usize & 0x7F) << (7 * encoded_bytes);
            encoded_bytes += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        if encoded_bytes != remaining_length_size(remaining_length) {
            error!("Remaining length {} is not minimally encoded.", remaining_length);
            return Err(Error::BadResponse);
        }

        if !is_valid_incoming_type(packet_type) {
            error!("Unexpected incoming packet type {:#04x}.", packet_type);
            return Err(Error::BadResponse);
        }

        debug!(
            "Incoming packet {:#04x} with remaining length {}.",
            packet_type, remaining_length
        );
        Ok(PacketInfo {
            packet_type,
            remaining_length,
        })
    }
}
