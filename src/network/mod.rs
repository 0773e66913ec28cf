//! Transport abstraction consumed by the MQTT engine.
//!
//! The engine never opens sockets or TLS sessions itself. Instead it drives
//! whatever byte stream the application hands it through the [`Read`] and
//! [`Write`] traits below, which mirror the shape of a non-blocking socket:
//!
//! - [`Read::read`] returns `Ok(0)` when nothing has arrived yet. That is a
//!   legal answer, not an error.
//! - [`Write::write`] returns the number of bytes the transport accepted.
//!   Accepting zero bytes is treated as a failed send by the engine.
//! - [`Write::flush`] is called once after each complete control packet.
//!
//! A type that implements both halves opts into [`Transport`] with an empty
//! marker impl, the same way connections are declared elsewhere in libiot.
//!
//! ```rust
//! use libiot_mqtt::network::{Read, Transport, Write};
//!
//! struct Loopback {
//!     bytes: [u8; 64],
//!     len: usize,
//! }
//!
//! impl Read for Loopback {
//!     type Error = ();
//!     fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
//!         let n = buf.len().min(self.len);
//!         buf[..n].copy_from_slice(&self.bytes[..n]);
//!         self.bytes.copy_within(n..self.len, 0);
//!         self.len -= n;
//!         Ok(n)
//!     }
//! }
//!
//! impl Write for Loopback {
//!     type Error = ();
//!     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
//!         let n = buf.len().min(self.bytes.len() - self.len);
//!         self.bytes[self.len..self.len + n].copy_from_slice(&buf[..n]);
//!         self.len += n;
//!         Ok(n)
//!     }
//!     fn flush(&mut self) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//! }
//!
//! impl Transport for Loopback {}
//! ```

#![deny(unsafe_code)]

/// Receiving half of a transport.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read whatever is available into `buf`, returning `Ok(0)` if nothing is.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Sending half of a transport.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write as much of `buf` as the transport accepts right now.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A bidirectional byte stream to the broker.
pub trait Transport: Read + Write {}

impl<T: Read + ?Sized> Read for &mut T {
    type Error = T::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        T::read(self, buf)
    }
}

impl<T: Write + ?Sized> Write for &mut T {
    type Error = T::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        T::write(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        T::flush(self)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {}
