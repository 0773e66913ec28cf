use criterion::{criterion_group, criterion_main};

mod mqtt;

criterion_group!(
    benches,
    mqtt::process_loop::bench_publish_qos0,
    mqtt::process_loop::bench_publish_qos1_round_trip,
    mqtt::process_loop::bench_incoming_qos2,
    mqtt::process_loop::bench_operation_table
);
criterion_main!(benches);
