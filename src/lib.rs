//! # libiot-mqtt - MQTT 3.1.1 client engine
//!
//! An allocation-free MQTT 3.1.1 client protocol engine for IoT devices. It
//! manages a single connection's lifecycle, issues PUBLISH, SUBSCRIBE,
//! UNSUBSCRIBE and PINGREQ operations, tracks QoS 1 and QoS 2 exchanges to
//! completion, and drives keep-alive timing. Everything runs over a byte
//! transport supplied by the application and a network buffer it owns.
//!
//! ## Features
//!
//! - **No heap**: the network buffer is borrowed from the caller and the
//!   in-flight table has a capacity fixed at build time
//! - **Transport agnostic**: works with any type implementing
//!   [`network::Transport`]
//! - **Pluggable codec**: wire encoding sits behind [`mqtt::Codec`], with a
//!   stock MQTT 3.1.1 implementation in [`mqtt::Mqtt311Codec`]
//! - **Cooperative**: single-threaded, every call returns synchronously and
//!   only [`mqtt::Context::process_loop`] waits on the network, bounded by
//!   its timeout
//!
//! ## Usage
//!
//! ```rust,no_run
//! use libiot_mqtt::mqtt::{ConnectInfo, Context, Event, PublishInfo, QoS};
//! # use libiot_mqtt::network::{Read, Transport, Write};
//! # struct TcpTransport;
//! # impl Read for TcpTransport {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for TcpTransport {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Transport for TcpTransport {}
//! # fn millis() -> u32 { 0 }
//!
//! let mut buffer = [0u8; 512];
//! let on_event = |event: Event<'_>| {
//!     if let Event::Publish { publish, .. } = event {
//!         let _ = (publish.topic, publish.payload);
//!     }
//! };
//!
//! let mut context = Context::new(TcpTransport, millis, on_event, &mut buffer)?;
//!
//! let info = ConnectInfo {
//!     client_id: "sensor_node_1",
//!     keep_alive_seconds: 60,
//!     clean_session: true,
//!     username: None,
//!     password: None,
//! };
//! let _session_present = context.connect(&info, None, 1_000)?;
//!
//! let packet_id = context.next_packet_id();
//! let publish = PublishInfo {
//!     qos: QoS::AtLeastOnce,
//!     retain: false,
//!     dup: false,
//!     topic: "sensors/temperature",
//!     payload: b"23.5",
//! };
//! context.publish(&publish, packet_id)?;
//!
//! // Drives keep-alive and completes the QoS 1 exchange once the PUBACK lands.
//! context.process_loop(100)?;
//! # Ok::<(), libiot_mqtt::mqtt::Error>(())
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Implement `std::error::Error` for [`mqtt::Error`]
//! - `defmt`: Enable defmt formatting of the public types for embedded logging

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiot/")]

/// Transport abstraction the engine sends and receives through.
pub mod network;

/// The MQTT client engine: connection context, operation table, codec and
/// process loop.
pub mod mqtt;
