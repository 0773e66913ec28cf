//! Error types returned by the MQTT engine.

/// Why an MQTT operation did not complete.
///
/// Success is `Ok(..)`; every other outcome of an engine call is one of these
/// variants. The enum is `Copy` and carries no payload so it can be returned
/// and logged on targets without an allocator.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An argument was invalid, e.g. an empty client identifier or a zero
    /// packet identifier on a QoS 1 publish.
    BadParameter,
    /// The operation table is full or the network buffer is too small for the
    /// packet. Never retried internally.
    NoMemory,
    /// The transport failed or refused to accept bytes.
    SendFailed,
    /// The transport failed while receiving, or a packet did not arrive in
    /// full within the time budget.
    RecvFailed,
    /// The broker sent an unexpected or malformed packet.
    BadResponse,
    /// The broker answered CONNECT with a non-zero CONNACK return code.
    ServerRefused,
    /// Nothing was available to read. Absorbed by the process loop.
    NoDataAvailable,
    /// An acknowledgement arrived for which the operation table defines no
    /// transition.
    IllegalState,
    /// A record for the same packet identifier and direction already exists.
    StateCollision,
    /// The broker did not answer a PINGREQ in time.
    KeepAliveTimeout,
}

impl Error {
    /// A stable name for the error, suitable for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Error::BadParameter => "BadParameter",
            Error::NoMemory => "NoMemory",
            Error::SendFailed => "SendFailed",
            Error::RecvFailed => "RecvFailed",
            Error::BadResponse => "BadResponse",
            Error::ServerRefused => "ServerRefused",
            Error::NoDataAvailable => "NoDataAvailable",
            Error::IllegalState => "IllegalState",
            Error::StateCollision => "StateCollision",
            Error::KeepAliveTimeout => "KeepAliveTimeout",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = core::result::Result<T, Error>;
