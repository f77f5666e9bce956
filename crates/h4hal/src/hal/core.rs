//! Connection management and the HCI HAL client surface
//!
//! This module owns the controller socket, the reader thread and the
//! registered callbacks. Sends may come from any thread and are serialized
//! by a writer mutex; received packets are dispatched synchronously on the
//! reader thread, in the order they completed.

use crate::error::HalError;
use crate::hal::constants::{DEFAULT_ROOTCANAL_HOST, DEFAULT_ROOTCANAL_PORT, READ_CHUNK_SIZE};
use crate::hal::packet::{self, HciPacket, PacketKind};
use crate::hal::reassembler::H4Reassembler;
use crate::hal::transport::{self, Readable, WakePipe};
use log::{debug, error, info, trace, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Result of `initialize()`, reported exactly once through the completion
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Fail,
}

/// Connection lifecycle. `Closed` is terminal: a HAL instance is not
/// re-initialized after `close()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

/// Where the controller emulator listens.
#[derive(Debug, Clone)]
pub struct HalConfig {
    pub host: String,
    pub port: u16,
}

impl HalConfig {
    pub fn new(host: impl Into<String>, port: u16) -> HalConfig {
        HalConfig {
            host: host.into(),
            port,
        }
    }
}

impl Default for HalConfig {
    fn default() -> Self {
        HalConfig {
            host: DEFAULT_ROOTCANAL_HOST.to_string(),
            port: DEFAULT_ROOTCANAL_PORT,
        }
    }
}

/// Incoming packet callbacks, one method per kind a controller may send.
///
/// Methods are invoked synchronously on the reader thread in packet
/// completion order; blocking in a callback stalls all further reception.
/// The delivered buffer is the packet's header and payload, with the H4
/// type byte stripped.
pub trait HalCallbacks: Send + Sync {
    fn hci_event_received(&self, packet: Vec<u8>);
    fn acl_data_received(&self, packet: Vec<u8>);
    fn sco_data_received(&self, packet: Vec<u8>);
}

/// Invoked once when the connection is torn down by the peer or by an I/O
/// or protocol fault. Not invoked for a local `close()`.
pub type DisconnectCallback = Box<dyn FnMut() + Send + 'static>;

/// State shared between the façade and the reader thread.
struct Shared {
    state: Mutex<ConnectionState>,
    writer: Mutex<Option<TcpStream>>,
    callbacks: Mutex<Option<Arc<dyn HalCallbacks>>>,
    disconnect_callback: Mutex<Option<DisconnectCallback>>,
}

impl Shared {
    /// Tear the connection down after a peer close, I/O failure or
    /// protocol violation. No-op while a local close() is in progress;
    /// close() then owns the rest of the shutdown.
    fn teardown(&self) {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                ConnectionState::Closing | ConnectionState::Closed => return,
                _ => *state = ConnectionState::Disconnected,
            }
        }
        if let Some(stream) = self.writer.lock().unwrap().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(callback) = self.disconnect_callback.lock().unwrap().as_mut() {
            callback();
        }
    }
}

/// The H4 HCI transport HAL.
///
/// Usage: `register_callbacks`, then `initialize`, then `send_*` freely
/// from any thread, then `close`. Dropping the HAL closes it.
pub struct HciHal {
    config: HalConfig,
    shared: Arc<Shared>,
    wake: Mutex<Option<WakePipe>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl HciHal {
    pub fn new(config: HalConfig) -> HciHal {
        HciHal {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Disconnected),
                writer: Mutex::new(None),
                callbacks: Mutex::new(None),
                disconnect_callback: Mutex::new(None),
            }),
            wake: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock().unwrap()
    }

    /// Register the incoming packet callbacks.
    ///
    /// Must be called before `initialize()`; requiring this ordering makes
    /// "packet arrives before registration" impossible by construction.
    pub fn register_callbacks(&self, callbacks: Arc<dyn HalCallbacks>) {
        *self.shared.callbacks.lock().unwrap() = Some(callbacks);
    }

    /// Register an optional disconnect notification.
    pub fn set_disconnect_callback(&self, callback: DisconnectCallback) {
        *self.shared.disconnect_callback.lock().unwrap() = Some(callback);
    }

    /// Establish the connection to the controller and start the reader
    /// thread. The outcome is reported exactly once through `on_complete`:
    /// `Status::Success` after the reader is running, `Status::Fail` on
    /// any setup failure (in which case no reader thread exists and the
    /// state is back to `Disconnected`).
    pub fn initialize<F>(&self, on_complete: F)
    where
        F: FnOnce(Status) + Send + 'static,
    {
        match self.start() {
            Ok(()) => on_complete(Status::Success),
            Err(err) => {
                error!("Transport initialization failed: {}", err);
                on_complete(Status::Fail);
            }
        }
    }

    fn start(&self) -> Result<(), HalError> {
        if self.shared.callbacks.lock().unwrap().is_none() {
            return Err(HalError::CallbacksNotRegistered);
        }
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state != ConnectionState::Disconnected {
                return Err(HalError::AlreadyInitialized);
            }
            *state = ConnectionState::Connecting;
        }

        match self.connect_and_spawn() {
            Ok(()) => Ok(()),
            Err(err) => {
                *self.shared.writer.lock().unwrap() = None;
                *self.wake.lock().unwrap() = None;
                *self.shared.state.lock().unwrap() = ConnectionState::Disconnected;
                Err(err)
            }
        }
    }

    fn connect_and_spawn(&self) -> Result<(), HalError> {
        info!(
            "Connecting to controller at {}:{}",
            self.config.host, self.config.port
        );
        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))?;
        // Controller packets are small and latency-sensitive.
        stream.set_nodelay(true)?;
        let reader_stream = stream.try_clone()?;
        let wake = WakePipe::new()?;
        let wake_fd = wake.read_fd();

        *self.shared.writer.lock().unwrap() = Some(stream);
        *self.wake.lock().unwrap() = Some(wake);
        *self.shared.state.lock().unwrap() = ConnectionState::Connected;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("h4-reader".to_string())
            .spawn(move || reader_loop(shared, reader_stream, wake_fd))?;
        *self.reader.lock().unwrap() = Some(handle);

        info!("Connected to controller");
        Ok(())
    }

    /// Send an HCI command packet (opcode, length and parameters).
    pub fn send_hci_command(&self, packet: &[u8]) -> Result<(), HalError> {
        self.send(PacketKind::Command, packet)
    }

    /// Send an ACL data packet (handle, length and payload).
    pub fn send_acl_data(&self, packet: &[u8]) -> Result<(), HalError> {
        self.send(PacketKind::AclData, packet)
    }

    /// Send a SCO data packet (handle, length and payload).
    pub fn send_sco_data(&self, packet: &[u8]) -> Result<(), HalError> {
        self.send(PacketKind::ScoData, packet)
    }

    /// Frame and write one packet. The frame build and the full write are
    /// one critical section, so two concurrent sends can never interleave
    /// their bytes on the wire. The payload is passed through unmodified.
    fn send(&self, kind: PacketKind, payload: &[u8]) -> Result<(), HalError> {
        if *self.shared.state.lock().unwrap() != ConnectionState::Connected {
            return Err(HalError::NotConnected);
        }

        let mut writer = self.shared.writer.lock().unwrap();
        let stream = match writer.as_mut() {
            Some(stream) => stream,
            None => return Err(HalError::NotConnected),
        };

        trace!("Sending {:?} packet: {}", kind, hex::encode(payload));
        let frame = packet::frame(kind, payload);
        // write_all retries short and interrupted writes until the whole
        // frame is on the wire or a hard error occurs.
        if let Err(err) = stream.write_all(&frame) {
            error!("Failed to write packet to controller: {}", err);
            drop(writer);
            self.shared.teardown();
            return Err(HalError::SendError(err));
        }
        Ok(())
    }

    /// Shut the transport down.
    ///
    /// Idempotent and callable from any thread (other than the reader's
    /// own callbacks). Wakes the reader if it is blocked waiting for data,
    /// joins it, and releases the socket and wakeup pipe before returning,
    /// so no reader activity survives this call.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closing;
        }

        if let Some(wake) = self.wake.lock().unwrap().as_ref() {
            wake.wake();
        }

        let handle = self.reader.lock().unwrap().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Reader thread panicked during shutdown");
            }
        }

        if let Some(stream) = self.shared.writer.lock().unwrap().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        *self.wake.lock().unwrap() = None;
        *self.shared.state.lock().unwrap() = ConnectionState::Closed;
        debug!("Transport closed");
    }
}

impl Default for HciHal {
    fn default() -> Self {
        HciHal::new(HalConfig::default())
    }
}

impl Drop for HciHal {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read from the socket, retrying reads interrupted by signals.
fn read_chunk(stream: &mut TcpStream, buf: &mut [u8]) -> Result<usize, HalError> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(HalError::ReceiveError(err)),
        }
    }
}

/// Deliver one packet to the registered callbacks.
///
/// Returns `false` when the packet poisons the connection: a controller
/// never originates Command packets, so receiving one means the stream
/// can no longer be trusted.
fn dispatch(shared: &Shared, packet: HciPacket) -> bool {
    let callbacks = match shared.callbacks.lock().unwrap().as_ref() {
        Some(callbacks) => Arc::clone(callbacks),
        None => {
            // Registration is forced before initialize; unreachable in
            // practice.
            warn!("Dropping packet received without registered callbacks");
            return true;
        }
    };

    trace!(
        "Delivering {:?} packet: {}",
        packet.kind,
        hex::encode(&packet.data)
    );
    match packet.kind {
        PacketKind::Event => callbacks.hci_event_received(packet.data),
        PacketKind::AclData => callbacks.acl_data_received(packet.data),
        PacketKind::ScoData => callbacks.sco_data_received(packet.data),
        PacketKind::Command => {
            error!("Controller sent a command packet; tearing connection down");
            return false;
        }
    }
    true
}

/// The reader loop: wait for readability, read one bounded chunk, feed the
/// reassembler and dispatch every completed packet in order. Runs until
/// the wakeup pipe is signalled, the peer closes the stream, or a hard
/// I/O or protocol error occurs. Partial parse state dies with the loop
/// and is never delivered.
fn reader_loop(shared: Arc<Shared>, mut stream: TcpStream, wake_fd: RawFd) {
    let mut reassembler = H4Reassembler::new();
    let mut buf = [0u8; READ_CHUNK_SIZE];
    let data_fd = stream.as_raw_fd();

    debug!("Reader thread started");
    loop {
        match transport::wait_readable(data_fd, wake_fd) {
            Ok(Readable::Shutdown) => {
                debug!("Reader thread woken for shutdown");
                break;
            }
            Ok(Readable::Data) => {}
            Err(err) => {
                error!("Failed to wait for controller data: {}", err);
                shared.teardown();
                break;
            }
        }

        let n = match read_chunk(&mut stream, &mut buf) {
            Ok(0) => {
                info!("Controller closed the connection");
                shared.teardown();
                break;
            }
            Ok(n) => n,
            Err(err) => {
                error!("{}", err);
                shared.teardown();
                break;
            }
        };

        match reassembler.feed(&buf[..n]) {
            Ok(packets) => {
                let mut poisoned = false;
                for packet in packets {
                    if !dispatch(&shared, packet) {
                        poisoned = true;
                        break;
                    }
                }
                if poisoned {
                    shared.teardown();
                    break;
                }
            }
            Err(err) => {
                error!("Protocol violation from controller: {}", err);
                shared.teardown();
                break;
            }
        }
    }
    debug!("Reader thread stopped");
}
