//! MQTT 3.1.1 client engine for embedded systems.
//!
//! The engine is split along the seams of the protocol:
//!
//! - [`Context`] owns one connection: transport, clock, event handler,
//!   network buffer, packet identifier counter and keep-alive timers. It
//!   exposes connect/disconnect, the outgoing operations
//!   ([`Context::publish`], [`Context::subscribe`], [`Context::unsubscribe`],
//!   [`Context::ping`]) and the single incoming entry point
//!   [`Context::process_loop`].
//! - [`OperationTable`] tracks in-flight QoS 1 and QoS 2 publishes by packet
//!   identifier and enforces the legal order of acknowledgements.
//! - [`Codec`] turns control packets into bytes and back. The engine only
//!   looks at the sizes, fields and status codes the codec hands back.
//!
//! # QoS flows
//!
//! ```text
//! outgoing QoS 1:  PublishSend --PUBACK rx--> done
//! outgoing QoS 2:  PublishSend --PUBREC rx--> PubRelSend --PUBREL tx--> PubCompPending --PUBCOMP rx--> done
//! incoming QoS 1:  PubAckSend --PUBACK tx--> done
//! incoming QoS 2:  PubRecSend --PUBREC tx--> PubRelPending --PUBREL rx--> PubCompSend --PUBCOMP tx--> done
//! ```
//!
//! QoS 0 traffic never enters the table.

/// Stock and pluggable wire codecs.
pub mod codec;

/// Connection context and lifecycle.
pub mod context;

/// Error taxonomy shared by every operation.
pub mod error;

/// Application event callback.
pub mod event;

/// Outgoing operations: publish, subscribe, unsubscribe and ping.
mod ops;

/// Control packet types and the value types passed to and from the codec.
pub mod packet;

/// Incoming packet dispatch and keep-alive.
mod process;

/// Table of in-flight QoS 1 and QoS 2 publishes.
pub mod state;

/// Millisecond clock and wraparound-safe elapsed time.
pub mod time;

pub use codec::{Codec, Mqtt311Codec};
pub use context::{Config, ConnectionStatus, Context, DEFAULT_PINGRESP_TIMEOUT_MS};
pub use error::{Error, Result};
pub use event::{Event, EventHandler};
pub use packet::{
    Ack, AckType, ConnectInfo, PacketInfo, PacketSize, PublishInfo, QoS, SubscribeInfo,
};
pub use state::{
    DEFAULT_MAX_INFLIGHT, Direction, OperationRecord, OperationTable, PublishState, StateEvent,
};
pub use time::Clock;
