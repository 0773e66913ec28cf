mod common;

use common::*;
use libiot_mqtt::mqtt::{Direction, Error, PublishInfo, PublishState, QoS, SubscribeInfo};

fn message(qos: QoS) -> PublishInfo<'static> {
    PublishInfo {
        qos,
        retain: false,
        dup: false,
        topic: "sensors/temp",
        payload: b"23.5",
    }
}

#[test]
fn test_qos1_publish_completes_on_puback() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    context.publish(&message(QoS::AtLeastOnce), 1).unwrap();
    assert_eq!(
        context.state_table().state(1, Direction::Outgoing),
        PublishState::PublishSend
    );

    context.transport_mut().push_bytes(puback(1));
    assert_eq!(context.process_loop(0), Ok(()));

    assert_eq!(
        context.state_table().state(1, Direction::Outgoing),
        PublishState::Null
    );
    assert!(context.state_table().is_empty());
    assert_eq!(context.handler().events, vec![Recorded::PubAck(1)]);
}

#[test]
fn test_qos0_publish_is_not_tracked() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    context.publish(&message(QoS::AtMostOnce), 0).unwrap();

    assert!(context.state_table().is_empty());
    let mut expected = vec![0x30, 18, 0x00, 12];
    expected.extend_from_slice(b"sensors/temp23.5");
    assert_eq!(context.transport().written, expected);
}

#[test]
fn test_qos1_publish_bytes() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    let retained = PublishInfo {
        retain: true,
        ..message(QoS::AtLeastOnce)
    };
    context.publish(&retained, 0x0102).unwrap();

    let mut expected = vec![0x33, 20, 0x00, 12];
    expected.extend_from_slice(b"sensors/temp");
    expected.extend_from_slice(&[0x01, 0x02]);
    expected.extend_from_slice(b"23.5");
    assert_eq!(context.transport().written, expected);
    // Header and payload are handed over separately, each flushed.
    assert_eq!(context.transport().write_calls, 2);
    assert_eq!(context.transport().flush_calls, 2);
}

#[test]
fn test_publish_rejects_zero_packet_id_for_qos1() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    assert_eq!(
        context.publish(&message(QoS::AtLeastOnce), 0),
        Err(Error::BadParameter)
    );
    assert_eq!(
        context.publish(&message(QoS::ExactlyOnce), 0),
        Err(Error::BadParameter)
    );
    assert!(context.transport().written.is_empty());
    assert!(context.state_table().is_empty());
}

#[test]
fn test_publish_collision_sends_nothing() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    context.publish(&message(QoS::ExactlyOnce), 5).unwrap();
    let written = context.transport().written.len();

    assert_eq!(
        context.publish(&message(QoS::AtLeastOnce), 5),
        Err(Error::StateCollision)
    );
    assert_eq!(context.transport().written.len(), written);
    assert_eq!(context.state_table().len(), 1);
}

#[test]
fn test_publish_fails_when_table_is_full() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = new_context::<2>(&mut buffer, &clock);
    connect(&mut context, 60);

    context.publish(&message(QoS::AtLeastOnce), 1).unwrap();
    context.publish(&message(QoS::ExactlyOnce), 2).unwrap();
    assert_eq!(
        context.publish(&message(QoS::AtLeastOnce), 3),
        Err(Error::NoMemory)
    );
    assert_eq!(context.state_table().capacity(), 2);
    assert_eq!(context.transport().sent_packets().len(), 2);

    // QoS 0 still goes out.
    assert_eq!(context.publish(&message(QoS::AtMostOnce), 0), Ok(()));
}

#[test]
fn test_publish_header_larger_than_buffer() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 8];
    let mut context = context(&mut buffer, &clock);

    assert_eq!(
        context.publish(&message(QoS::AtLeastOnce), 1),
        Err(Error::NoMemory)
    );
    assert!(context.state_table().is_empty());
}

#[test]
fn test_payload_is_sent_from_caller_memory() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 32];
    let mut context = context(&mut buffer, &clock);

    // Far larger than the network buffer.
    let payload = [0x5Au8; 1_000];
    let big = PublishInfo {
        payload: &payload,
        ..message(QoS::AtMostOnce)
    };
    context.publish(&big, 0).unwrap();

    let packets = context.transport().sent_packets();
    assert_eq!(packets.len(), 1);
    assert!(packets[0].ends_with(&payload));
}

#[test]
fn test_partial_writes_are_accumulated() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    context.transport_mut().max_write = Some(3);

    context.publish(&message(QoS::AtLeastOnce), 9).unwrap();

    let packets = context.transport().sent_packets();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].len(), 2 + 20);
    assert!(context.transport().write_calls > 2);
}

#[test]
fn test_failed_publish_releases_its_record() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);
    context.transport_mut().fail_writes = true;

    assert_eq!(
        context.publish(&message(QoS::ExactlyOnce), 7),
        Err(Error::SendFailed)
    );
    assert!(context.state_table().is_empty());

    context.transport_mut().fail_writes = false;
    assert_eq!(context.publish(&message(QoS::ExactlyOnce), 7), Ok(()));
    assert_eq!(
        context.state_table().state(7, Direction::Outgoing),
        PublishState::PublishSend
    );
}

#[test]
fn test_publish_updates_last_packet_time() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    clock.set(5_000);
    context.publish(&message(QoS::AtMostOnce), 0).unwrap();
    assert_eq!(context.last_packet_time(), 5_000);
}

#[test]
fn test_subscribe_and_suback() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    let filters = [
        SubscribeInfo {
            topic_filter: "a/+",
            qos: QoS::AtLeastOnce,
        },
        SubscribeInfo {
            topic_filter: "b/#",
            qos: QoS::ExactlyOnce,
        },
    ];
    context.subscribe(&filters, 3).unwrap();
    assert_eq!(
        context.transport().written,
        vec![0x82, 14, 0, 3, 0, 3, b'a', b'/', b'+', 1, 0, 3, b'b', b'/', b'#', 2]
    );
    assert!(context.state_table().is_empty());

    context.transport_mut().push_bytes(suback(3, &[0x01, 0x80]));
    context.process_loop(0).unwrap();
    assert_eq!(
        context.handler().events,
        vec![Recorded::SubAck {
            packet_id: 3,
            return_codes: vec![0x01, 0x80]
        }]
    );
}

#[test]
fn test_unsubscribe_and_unsuback() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    let filters = [SubscribeInfo {
        topic_filter: "a/+",
        qos: QoS::AtMostOnce,
    }];
    context.unsubscribe(&filters, 4).unwrap();
    assert_eq!(
        context.transport().written,
        vec![0xA2, 7, 0, 4, 0, 3, b'a', b'/', b'+']
    );

    context.transport_mut().push_bytes(unsuback(4));
    context.process_loop(0).unwrap();
    assert_eq!(context.handler().events, vec![Recorded::UnsubAck(4)]);
}

#[test]
fn test_subscribe_parameter_errors() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    let filters = [SubscribeInfo {
        topic_filter: "x",
        qos: QoS::AtMostOnce,
    }];

    assert_eq!(context.subscribe(&[], 1), Err(Error::BadParameter));
    assert_eq!(context.subscribe(&filters, 0), Err(Error::BadParameter));
    assert_eq!(context.unsubscribe(&[], 1), Err(Error::BadParameter));
    assert_eq!(context.unsubscribe(&filters, 0), Err(Error::BadParameter));
    assert_eq!(context.transport().write_calls, 0);
}

#[test]
fn test_subscribe_send_failure() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    context.transport_mut().fail_writes = true;
    let filters = [SubscribeInfo {
        topic_filter: "x",
        qos: QoS::AtMostOnce,
    }];

    assert_eq!(context.subscribe(&filters, 1), Err(Error::SendFailed));
}

#[test]
fn test_ping_marks_waiting() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);

    clock.set(700);
    context.ping().unwrap();

    assert!(context.is_waiting_for_ping_resp());
    assert_eq!(context.last_packet_time(), 700);
    assert_eq!(context.transport().written, vec![0xC0, 0x00]);
}

#[test]
fn test_failed_ping_does_not_wait() {
    let clock = MockClock::at(0);
    let mut buffer = [0u8; 128];
    let mut context = context(&mut buffer, &clock);
    connect(&mut context, 60);
    context.transport_mut().fail_writes = true;

    assert_eq!(context.ping(), Err(Error::SendFailed));
    assert!(!context.is_waiting_for_ping_resp());
}
