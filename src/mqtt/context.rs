//! Connection context and lifecycle.
//!
//! A [`Context`] owns everything one MQTT connection needs: the transport,
//! the clock, the event handler, the codec, a caller-provided network buffer
//! and the table of in-flight publishes. Nothing is allocated and nothing is
//! shared between contexts.

use core::fmt;

use log::{debug, error, info, warn};

use super::codec::{Codec, Mqtt311Codec};
use super::error::{Error, Result};
use super::event::EventHandler;
use super::packet::{ConnectInfo, PacketInfo, PublishInfo, CONNACK};
use super::state::{OperationTable, DEFAULT_MAX_INFLIGHT};
use super::time::{elapsed, Clock};
use crate::network::{Read, Transport, Write};

/// Default time allowed for the broker to answer a PINGREQ.
pub const DEFAULT_PINGRESP_TIMEOUT_MS: u32 = 500;

/// Engine settings that are not part of the CONNECT packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// How long to wait for a PINGRESP before failing with
    /// [`Error::KeepAliveTimeout`]. Applied on the next successful connect.
    pub pingresp_timeout_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pingresp_timeout_ms: DEFAULT_PINGRESP_TIMEOUT_MS,
        }
    }
}

/// Whether the broker has accepted the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionStatus {
    /// Not connected, or disconnected.
    NotConnected,
    /// A CONNACK accepted the connection.
    Connected,
}

/// State of one MQTT connection.
///
/// The context is driven from a single thread. It never spawns work or
/// keeps timers of its own, all timing checks happen inside its method
/// calls.
///
/// * `T` - byte stream to the broker
/// * `C` - millisecond clock
/// * `H` - receiver of incoming publishes and acknowledgements
/// * `K` - packet codec, [`Mqtt311Codec`] unless replaced
/// * `N` - maximum number of in-flight QoS 1 and QoS 2 publishes
///
/// # Examples
///
/// ```rust
/// use libiot_mqtt::mqtt::{ConnectionStatus, Context, Event};
/// # use libiot_mqtt::network::{Read, Transport, Write};
/// # struct Socket;
/// # impl Read for Socket {
/// #     type Error = ();
/// #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
/// # }
/// # impl Write for Socket {
/// #     type Error = ();
/// #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
/// #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # impl Transport for Socket {}
///
/// let mut buffer = [0u8; 256];
/// let mut ticks = 0u32;
/// let clock = move || {
///     ticks += 1;
///     ticks
/// };
/// let handler = |_event: Event<'_>| {};
///
/// let mut context = Context::new(Socket, clock, handler, &mut buffer).unwrap();
/// assert_eq!(context.status(), ConnectionStatus::NotConnected);
/// assert_eq!(context.next_packet_id(), 1);
/// assert_eq!(context.next_packet_id(), 2);
/// ```
pub struct Context<'a, T, C, H, K = Mqtt311Codec, const N: usize = DEFAULT_MAX_INFLIGHT>
where
    T: Transport,
    C: Clock,
    H: EventHandler,
    K: Codec,
{
    pub(super) transport: T,
    pub(super) clock: C,
    pub(super) handler: H,
    pub(super) codec: K,
    pub(super) buffer: &'a mut [u8],
    pub(super) status: ConnectionStatus,
    pub(super) next_packet_id: u16,
    pub(super) keep_alive_interval_sec: u16,
    pub(super) last_packet_time: u32,
    pub(super) waiting_for_ping_resp: bool,
    pub(super) ping_req_send_time: u32,
    pub(super) ping_resp_timeout_ms: u32,
    pub(super) config: Config,
    pub(super) state_table: OperationTable<N>,
}

impl<'a, T, C, H> Context<'a, T, C, H>
where
    T: Transport,
    C: Clock,
    H: EventHandler,
{
    /// Create a context with the stock codec and default table capacity.
    ///
    /// No I/O is performed. The context starts
    /// [`NotConnected`](ConnectionStatus::NotConnected) with packet id 1.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - `buffer` is empty
    pub fn new(transport: T, clock: C, handler: H, buffer: &'a mut [u8]) -> Result<Self> {
        Self::with_codec(transport, clock, handler, Mqtt311Codec, buffer)
    }
}

impl<'a, T, C, H, K, const N: usize> Context<'a, T, C, H, K, N>
where
    T: Transport,
    C: Clock,
    H: EventHandler,
    K: Codec,
{
    /// Create a context with an explicit codec and table capacity.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - `buffer` is empty
    pub fn with_codec(
        transport: T,
        clock: C,
        handler: H,
        codec: K,
        buffer: &'a mut [u8],
    ) -> Result<Self> {
        if buffer.is_empty() {
            error!("Network buffer cannot be empty.");
            return Err(Error::BadParameter);
        }

        Ok(Self {
            transport,
            clock,
            handler,
            codec,
            buffer,
            status: ConnectionStatus::NotConnected,
            next_packet_id: 1,
            keep_alive_interval_sec: 0,
            last_packet_time: 0,
            waiting_for_ping_resp: false,
            ping_req_send_time: 0,
            ping_resp_timeout_ms: 0,
            config: Config::default(),
            state_table: OperationTable::new(),
        })
    }

    /// Send CONNECT and wait up to `timeout_ms` for the CONNACK.
    ///
    /// Returns the broker's session present flag. On success the keep-alive
    /// interval from `info` takes effect, and a clean session forgets every
    /// in-flight publish.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - invalid `info` or `will`
    /// * [`Error::NoMemory`] - the CONNECT does not fit the network buffer
    /// * [`Error::SendFailed`] - the transport failed while sending
    /// * [`Error::NoDataAvailable`] - no CONNACK arrived within `timeout_ms`
    /// * [`Error::RecvFailed`] - the CONNACK could not be read in full
    /// * [`Error::BadResponse`] - the broker answered with something else
    /// * [`Error::ServerRefused`] - the CONNACK refused the connection
    pub fn connect(
        &mut self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo<'_>>,
        timeout_ms: u32,
    ) -> Result<bool> {
        match self.send_connect(info, will, timeout_ms) {
            Ok(session_present) => {
                self.status = ConnectionStatus::Connected;
                self.keep_alive_interval_sec = info.keep_alive_seconds;
                self.waiting_for_ping_resp = false;
                self.ping_resp_timeout_ms = self.config.pingresp_timeout_ms;
                if info.clean_session {
                    self.state_table.clear();
                }
                info!(
                    "MQTT connection established, session present: {}.",
                    session_present
                );
                Ok(session_present)
            }
            Err(e) => {
                self.status = ConnectionStatus::NotConnected;
                error!("MQTT connection failed: {}.", e);
                Err(e)
            }
        }
    }

    fn send_connect(
        &mut self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo<'_>>,
        timeout_ms: u32,
    ) -> Result<bool> {
        let size = self.codec.connect_packet_size(info, will)?;
        debug!(
            "CONNECT packet size is {} and remaining length is {}.",
            size.packet_size, size.remaining_length
        );
        let len = self.codec.serialize_connect(info, will, &size, self.buffer)?;
        self.send_buffer(len)?;
        debug!("Sent {} bytes of CONNECT packet.", len);

        self.receive_connack(timeout_ms)
    }

    fn receive_connack(&mut self, timeout_ms: u32) -> Result<bool> {
        let entry = self.clock.now_ms();

        let packet = loop {
            match self
                .codec
                .incoming_packet_type_and_length(&mut self.transport)
            {
                Err(Error::NoDataAvailable)
                    if elapsed(self.clock.now_ms(), entry) < timeout_ms => {}
                other => break other,
            }
        }?;

        if packet.packet_type != CONNACK {
            error!(
                "Received packet {:#04x} while expecting CONNACK.",
                packet.packet_type
            );
            return Err(Error::BadResponse);
        }

        // Read the body at least once even if the budget is spent.
        let remaining = timeout_ms.saturating_sub(elapsed(self.clock.now_ms(), entry));
        self.receive_packet(&packet, remaining)?;

        let body = self
            .buffer
            .get(..packet.remaining_length)
            .ok_or(Error::BadResponse)?;
        let ack = self.codec.deserialize_ack(&packet, body)?;
        info!("Received CONNACK from broker.");
        Ok(ack.session_present)
    }

    /// Send DISCONNECT. The context is
    /// [`NotConnected`](ConnectionStatus::NotConnected) afterwards even if
    /// sending failed.
    ///
    /// # Errors
    ///
    /// * [`Error::NoMemory`] - the network buffer is too small
    /// * [`Error::SendFailed`] - the transport failed
    pub fn disconnect(&mut self) -> Result<()> {
        let result = self.send_disconnect();
        self.status = ConnectionStatus::NotConnected;
        match result {
            Ok(()) => info!("Disconnected from the broker."),
            Err(e) => warn!("DISCONNECT could not be sent: {}.", e),
        }
        result
    }

    fn send_disconnect(&mut self) -> Result<()> {
        let size = self.codec.disconnect_packet_size()?;
        debug!("DISCONNECT packet size is {}.", size);
        let len = self.codec.serialize_disconnect(self.buffer)?;
        self.send_buffer(len)
    }

    /// Hand out the next packet identifier.
    ///
    /// Identifiers count up from 1 and skip 0 when the counter wraps.
    pub fn next_packet_id(&mut self) -> u16 {
        let packet_id = self.next_packet_id;
        self.next_packet_id = match self.next_packet_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        packet_id
    }

    /// Whether the broker has accepted the connection.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Keep-alive interval in seconds, 0 when disabled.
    pub fn keep_alive_interval(&self) -> u16 {
        self.keep_alive_interval_sec
    }

    /// Whether a PINGREQ is still unanswered.
    pub fn is_waiting_for_ping_resp(&self) -> bool {
        self.waiting_for_ping_resp
    }

    /// Clock reading taken when the last packet was sent.
    pub fn last_packet_time(&self) -> u32 {
        self.last_packet_time
    }

    /// The in-flight publishes.
    pub fn state_table(&self) -> &OperationTable<N> {
        &self.state_table
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The event handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The event handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Engine settings.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the engine settings. They apply from the next connect.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Send the first `len` bytes of the network buffer.
    pub(super) fn send_buffer(&mut self, len: usize) -> Result<()> {
        let data = self.buffer.get(..len).ok_or(Error::NoMemory)?;
        self.last_packet_time = send_all(&mut self.transport, &mut self.clock, data)?;
        Ok(())
    }

    /// Send caller memory, such as a PUBLISH payload.
    pub(super) fn send_slice(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.last_packet_time = send_all(&mut self.transport, &mut self.clock, data)?;
        Ok(())
    }

    /// Read the body of `packet` into the network buffer.
    ///
    /// A body larger than the buffer is read and thrown away in buffer-sized
    /// chunks, after which [`Error::NoDataAvailable`] is returned.
    pub(super) fn receive_packet(&mut self, packet: &PacketInfo, timeout_ms: u32) -> Result<()> {
        if packet.remaining_length > self.buffer.len() {
            warn!(
                "Incoming packet of {} bytes exceeds the {} byte network buffer and will be dumped.",
                packet.remaining_length,
                self.buffer.len()
            );
            return self.discard_packet(packet.remaining_length, timeout_ms);
        }

        let body = &mut self.buffer[..packet.remaining_length];
        recv_exact(&mut self.transport, &mut self.clock, body, timeout_ms).map_err(|e| {
            error!(
                "Failed to receive {} byte packet body: {}.",
                packet.remaining_length, e
            );
            e
        })?;
        info!("Packet received. ReceivedBytes={}.", packet.remaining_length);
        Ok(())
    }

    fn discard_packet(&mut self, remaining_length: usize, timeout_ms: u32) -> Result<()> {
        let entry = self.clock.now_ms();
        let chunk = self.buffer.len();
        let mut budget = timeout_ms;
        let mut dumped = 0;

        while dumped < remaining_length {
            let len = chunk.min(remaining_length - dumped);
            recv_exact(
                &mut self.transport,
                &mut self.clock,
                &mut self.buffer[..len],
                budget,
            )?;
            dumped += len;

            if dumped < remaining_length {
                let spent = elapsed(self.clock.now_ms(), entry);
                if spent >= timeout_ms {
                    error!("Time expired while discarding packet.");
                    return Err(Error::RecvFailed);
                }
                budget = timeout_ms - spent;
            }
        }

        warn!("Dumped packet. DumpedBytes={}.", dumped);
        Err(Error::NoDataAvailable)
    }
}

impl<T, C, H, K, const N: usize> fmt::Debug for Context<'_, T, C, H, K, N>
where
    T: Transport,
    C: Clock,
    H: EventHandler,
    K: Codec,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("buffer_len", &self.buffer.len())
            .field("status", &self.status)
            .field("next_packet_id", &self.next_packet_id)
            .field("keep_alive_interval_sec", &self.keep_alive_interval_sec)
            .field("last_packet_time", &self.last_packet_time)
            .field("waiting_for_ping_resp", &self.waiting_for_ping_resp)
            .field("ping_req_send_time", &self.ping_req_send_time)
            .field("ping_resp_timeout_ms", &self.ping_resp_timeout_ms)
            .field("state_table", &self.state_table)
            .finish_non_exhaustive()
    }
}

/// Write all of `data`, then flush.
///
/// Returns the clock reading taken before the first write. Any write that
/// fails or accepts nothing aborts with [`Error::SendFailed`].
pub(super) fn send_all<W, C>(transport: &mut W, clock: &mut C, data: &[u8]) -> Result<u32>
where
    W: Write + ?Sized,
    C: Clock + ?Sized,
{
    let send_time = clock.now_ms();
    let mut sent = 0;

    while sent < data.len() {
        match transport.write(&data[sent..]) {
            Ok(0) => {
                error!("Transport accepted no bytes.");
                return Err(Error::SendFailed);
            }
            Ok(n) => {
                sent += n.min(data.len() - sent);
                debug!(
                    "Bytes sent={}, bytes remaining={}.",
                    n,
                    data.len() - sent
                );
            }
            Err(e) => {
                error!("Transport send failed: {:?}.", e);
                return Err(Error::SendFailed);
            }
        }
    }

    transport.flush().map_err(|e| {
        error!("Transport flush failed: {:?}.", e);
        Error::SendFailed
    })?;
    Ok(send_time)
}

/// Fill `buf` completely from the transport.
///
/// At least one read is attempted. Fails with [`Error::RecvFailed`] on a
/// transport error, or once `timeout_ms` has elapsed with bytes missing.
pub(super) fn recv_exact<R, C>(
    transport: &mut R,
    clock: &mut C,
    buf: &mut [u8],
    timeout_ms: u32,
) -> Result<()>
where
    R: Read + ?Sized,
    C: Clock + ?Sized,
{
    let entry = clock.now_ms();
    let mut received = 0;

    while received < buf.len() {
        match transport.read(&mut buf[received..]) {
            Ok(n) => received += n.min(buf.len() - received),
            Err(e) => {
                error!("Network error while receiving packet: {:?}.", e);
                return Err(Error::RecvFailed);
            }
        }

        if received < buf.len() && elapsed(clock.now_ms(), entry) >= timeout_ms {
            error!(
                "Time expired while receiving packet, {} of {} bytes read.",
                received,
                buf.len()
            );
            return Err(Error::RecvFailed);
        }
    }
    Ok(())
}
