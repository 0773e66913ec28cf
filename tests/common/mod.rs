//! Shared fixtures for the integration tests: a scripted transport, a
//! hand-driven clock and an event recorder.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use libiot_mqtt::mqtt::{Clock, ConnectInfo, Context, Event, EventHandler, Mqtt311Codec, QoS};
use libiot_mqtt::network::{Read, Transport, Write};

/// One scripted answer to a `read` call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Bytes that become readable. Reads consume them across calls.
    Data(Vec<u8>),
    /// A read that returns `Ok(0)`.
    Empty,
    /// A read that fails.
    Fail,
}

/// Transport that replays scripted reads and records every write.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Step>,
    pub written: Vec<u8>,
    pub read_calls: usize,
    pub write_calls: usize,
    pub flush_calls: usize,
    /// Accept at most this many bytes per write.
    pub max_write: Option<usize>,
    /// Make every write fail.
    pub fail_writes: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step) {
        self.script.push_back(step);
    }

    pub fn push_bytes(&mut self, bytes: Vec<u8>) {
        self.push(Step::Data(bytes));
    }

    /// Forget what was written and how often the transport was called.
    pub fn reset_counters(&mut self) {
        self.written.clear();
        self.read_calls = 0;
        self.write_calls = 0;
        self.flush_calls = 0;
    }

    pub fn pending(&self) -> usize {
        self.script.len()
    }

    /// Split everything written so far into control packets.
    pub fn sent_packets(&self) -> Vec<Vec<u8>> {
        split_packets(&self.written)
    }

    /// First byte of every packet written so far.
    pub fn sent_types(&self) -> Vec<u8> {
        self.sent_packets().iter().map(|p| p[0]).collect()
    }
}

impl Read for ScriptedTransport {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_calls += 1;
        match self.script.pop_front() {
            None | Some(Step::Empty) => Ok(0),
            Some(Step::Fail) => Err(()),
            Some(Step::Data(mut bytes)) => {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.script.push_front(Step::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

impl Write for ScriptedTransport {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.write_calls += 1;
        if self.fail_writes {
            return Err(());
        }
        let n = self.max_write.map_or(buf.len(), |max| buf.len().min(max));
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flush_calls += 1;
        Ok(())
    }
}

impl Transport for ScriptedTransport {}

/// Clock driven by the test. Every reading advances it by `step`.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Rc<Cell<u32>>,
    step: u32,
}

impl MockClock {
    /// A clock frozen at `start`.
    pub fn at(start: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step: 0,
        }
    }

    /// A clock starting at `start` that moves `step` ms per reading.
    pub fn stepping(start: u32, step: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step,
        }
    }

    pub fn now(&self) -> u32 {
        self.now.get()
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&mut self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step));
        now
    }
}

/// Owned copy of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Publish {
        packet_id: u16,
        qos: QoS,
        topic: String,
        payload: Vec<u8>,
    },
    PubAck(u16),
    PubRec(u16),
    PubRel(u16),
    PubComp(u16),
    SubAck {
        packet_id: u16,
        return_codes: Vec<u8>,
    },
    UnsubAck(u16),
    PingResp,
}

/// Event handler that keeps everything it is given.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Recorded>,
}

impl EventHandler for Recorder {
    fn on_event(&mut self, event: Event<'_>) {
        self.events.push(match event {
            Event::Publish { packet_id, publish } => Recorded::Publish {
                packet_id,
                qos: publish.qos,
                topic: publish.topic.to_string(),
                payload: publish.payload.to_vec(),
            },
            Event::PubAck { packet_id } => Recorded::PubAck(packet_id),
            Event::PubRec { packet_id } => Recorded::PubRec(packet_id),
            Event::PubRel { packet_id } => Recorded::PubRel(packet_id),
            Event::PubComp { packet_id } => Recorded::PubComp(packet_id),
            Event::SubAck {
                packet_id,
                return_codes,
            } => Recorded::SubAck {
                packet_id,
                return_codes: return_codes.to_vec(),
            },
            Event::UnsubAck { packet_id } => Recorded::UnsubAck(packet_id),
            Event::PingResp => Recorded::PingResp,
        });
    }
}

pub type TestContext<'a, const N: usize = 10> =
    Context<'a, ScriptedTransport, MockClock, Recorder, Mqtt311Codec, N>;

/// A context with the default table capacity over fresh fixtures.
pub fn context<'a>(buffer: &'a mut [u8], clock: &MockClock) -> TestContext<'a> {
    new_context(buffer, clock)
}

/// A context over fresh fixtures sharing `clock`.
pub fn new_context<'a, const N: usize>(
    buffer: &'a mut [u8],
    clock: &MockClock,
) -> TestContext<'a, N> {
    Context::with_codec(
        ScriptedTransport::new(),
        clock.clone(),
        Recorder::default(),
        Mqtt311Codec,
        buffer,
    )
    .unwrap()
}

pub fn connect_info(keep_alive_seconds: u16) -> ConnectInfo<'static> {
    ConnectInfo {
        client_id: "libiot-test",
        keep_alive_seconds,
        clean_session: true,
        username: None,
        password: None,
    }
}

/// Run a successful connect and forget what it wrote.
pub fn connect<const N: usize>(context: &mut TestContext<'_, N>, keep_alive_seconds: u16) {
    context.transport_mut().push_bytes(connack(false, 0));
    context
        .connect(&connect_info(keep_alive_seconds), None, 0)
        .unwrap();
    context.transport_mut().reset_counters();
}

pub fn encode_remaining_length(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

pub fn packet(first: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![first];
    encode_remaining_length(body.len(), &mut out);
    out.extend_from_slice(body);
    out
}

pub fn connack(session_present: bool, return_code: u8) -> Vec<u8> {
    packet(0x20, &[session_present as u8, return_code])
}

pub fn puback(packet_id: u16) -> Vec<u8> {
    packet(0x40, &packet_id.to_be_bytes())
}

pub fn pubrec(packet_id: u16) -> Vec<u8> {
    packet(0x50, &packet_id.to_be_bytes())
}

pub fn pubrel(packet_id: u16) -> Vec<u8> {
    packet(0x62, &packet_id.to_be_bytes())
}

pub fn pubcomp(packet_id: u16) -> Vec<u8> {
    packet(0x70, &packet_id.to_be_bytes())
}

pub fn suback(packet_id: u16, return_codes: &[u8]) -> Vec<u8> {
    let mut body = packet_id.to_be_bytes().to_vec();
    body.extend_from_slice(return_codes);
    packet(0x90, &body)
}

pub fn unsuback(packet_id: u16) -> Vec<u8> {
    packet(0xB0, &packet_id.to_be_bytes())
}

pub fn pingresp() -> Vec<u8> {
    vec![0xD0, 0x00]
}

pub fn incoming_publish(qos: QoS, packet_id: u16, topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = (topic.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(topic.as_bytes());
    if qos != QoS::AtMostOnce {
        body.extend_from_slice(&packet_id.to_be_bytes());
    }
    body.extend_from_slice(payload);
    packet(0x30 | ((qos as u8) << 1), &body)
}

pub fn split_packets(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    while !bytes.is_empty() {
        let mut len = 0usize;
        let mut shift = 0;
        let mut i = 1;
        loop {
            let byte = bytes[i];
            len |= ((byte & 0x7F) as usize) << shift;
            shift += 7;
            i += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        let end = i + len;
        packets.push(bytes[..end].to_vec());
        bytes = &bytes[end..];
    }
    packets
}
