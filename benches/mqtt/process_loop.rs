use criterion::{Criterion, Throughput};
use libiot_mqtt::mqtt::{
    AckType, ConnectInfo, Context, Direction, Event, OperationTable, PublishInfo, QoS, StateEvent,
};
use libiot_mqtt::network::{Read, Transport, Write};
use std::collections::VecDeque;
use std::hint::black_box;

/// In-memory broker side: bytes queued with `push` are read back by the
/// engine, everything the engine writes is counted and dropped.
#[derive(Default)]
struct Loopback {
    incoming: VecDeque<u8>,
    written: usize,
}

impl Loopback {
    fn push(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes);
    }
}

impl Read for Loopback {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for Loopback {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Transport for Loopback {}

const TOPIC: &str = "libiot/bench-topic";
const PAYLOAD: &[u8] = b"hello world from bench";

fn frozen_clock() -> u32 {
    0
}

fn ignore(event: Event<'_>) {
    black_box(event);
}

type BenchContext<'a> = Context<'a, Loopback, fn() -> u32, fn(Event<'_>)>;

fn connected(buffer: &mut [u8]) -> BenchContext<'_> {
    let mut context = Context::new(
        Loopback::default(),
        frozen_clock as fn() -> u32,
        ignore as fn(Event<'_>),
        buffer,
    )
    .expect("buffer is not empty");

    context.transport_mut().push(&[0x20, 0x02, 0x00, 0x00]);
    let info = ConnectInfo {
        client_id: "libiot-bench",
        keep_alive_seconds: 0,
        clean_session: true,
        username: None,
        password: None,
    };
    context.connect(&info, None, 0).expect("Failed to connect");
    context
}

fn publish_info(qos: QoS) -> PublishInfo<'static> {
    PublishInfo {
        qos,
        retain: false,
        dup: false,
        topic: TOPIC,
        payload: PAYLOAD,
    }
}

fn incoming_qos2_publish(packet_id: u16) -> Vec<u8> {
    let [hi, lo] = packet_id.to_be_bytes();
    let remaining = 2 + TOPIC.len() + 2 + PAYLOAD.len();
    let mut bytes = vec![0x34, remaining as u8];
    bytes.extend_from_slice(&(TOPIC.len() as u16).to_be_bytes());
    bytes.extend_from_slice(TOPIC.as_bytes());
    bytes.extend_from_slice(&[hi, lo]);
    bytes.extend_from_slice(PAYLOAD);
    bytes
}

pub fn bench_publish_qos0(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_qos0");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    let mut buffer = [0u8; 256];
    let mut context = connected(&mut buffer);
    let info = publish_info(QoS::AtMostOnce);

    group.bench_function("publish_qos0", |b| {
        b.iter(|| {
            context
                .publish(black_box(&info), 0)
                .expect("Failed to publish");
        })
    });
    group.finish();
}

pub fn bench_publish_qos1_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_qos1_round_trip");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    let mut buffer = [0u8; 256];
    let mut context = connected(&mut buffer);
    let info = publish_info(QoS::AtLeastOnce);

    group.bench_function("publish_qos1_round_trip", |b| {
        b.iter(|| {
            let packet_id = context.next_packet_id();
            context
                .publish(black_box(&info), packet_id)
                .expect("Failed to publish");
            let [hi, lo] = packet_id.to_be_bytes();
            context.transport_mut().push(&[0x40, 0x02, hi, lo]);
            context.process_loop(0).expect("Failed to process PUBACK");
        })
    });
    group.finish();
}

pub fn bench_incoming_qos2(c: &mut Criterion) {
    let mut group = c.benchmark_group("incoming_qos2");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    let mut buffer = [0u8; 256];
    let mut context = connected(&mut buffer);

    let publish = incoming_qos2_publish(1);
    let pubrel = [0x62, 0x02, 0x00, 0x01];

    group.bench_function("incoming_qos2", |b| {
        b.iter(|| {
            context.transport_mut().push(&publish);
            context.process_loop(0).expect("Failed to process PUBLISH");
            context.transport_mut().push(&pubrel);
            context.process_loop(0).expect("Failed to process PUBREL");
        })
    });
    group.finish();
}

pub fn bench_operation_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_table");

    group.bench_function("fill_and_drain_qos2", |b| {
        b.iter(|| {
            let mut table: OperationTable = OperationTable::new();
            for packet_id in 1..=table.capacity() as u16 {
                table
                    .reserve(packet_id, Direction::Outgoing, QoS::ExactlyOnce)
                    .expect("Failed to reserve");
            }
            for packet_id in 1..=table.capacity() as u16 {
                for event in [
                    StateEvent::Received(AckType::PubRec),
                    StateEvent::Sent(AckType::PubRel),
                    StateEvent::Received(AckType::PubComp),
                ] {
                    table
                        .transition(packet_id, Direction::Outgoing, event)
                        .expect("Failed to transition");
                }
            }
            black_box(table.is_empty())
        })
    });
    group.finish();
}
