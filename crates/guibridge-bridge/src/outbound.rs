use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use guibridge_frame::{FrameConfig, FrameWriter};
use parking_lot::{Mutex, RwLock};

use crate::error::{BridgeError, Result};
use crate::protocol::{Event, OutboundMessage};

/// The worker's output stream.
pub type OutputStream = Box<dyn Write + Send>;

/// Serializes outbound messages into frames on the single output stream.
///
/// The whole encode-write-flush of one frame happens under one lock, so
/// concurrent senders never interleave bytes.
pub struct Outbound {
    writer: Mutex<FrameWriter<OutputStream>>,
    frames_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl Outbound {
    pub fn new(output: OutputStream, config: FrameConfig) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::with_config(output, config)),
            frames_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    /// Send one message as one frame.
    ///
    /// Failures are logged here; the error is returned so callers can react,
    /// but the channel stays usable for later sends.
    pub fn send(&self, message: &OutboundMessage) -> Result<()> {
        let payload = match serde_json::to_vec(message) {
            Ok(payload) => payload,
            Err(err) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(kind = message.kind(), error = %err, "dropping unserializable message");
                return Err(BridgeError::Marshal(err));
            }
        };

        let written = self.writer.lock().send(&payload);
        match written {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(kind = message.kind(), size = payload.len(), "frame sent");
                Ok(())
            }
            Err(err) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(kind = message.kind(), size = payload.len(), error = %err, "outbound write failed");
                Err(BridgeError::Frame(err))
            }
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbound")
            .field("frames_sent", &self.frames_sent())
            .field("send_failures", &self.send_failures())
            .finish()
    }
}

enum PumpMessage {
    Event(Event),
    Stop,
}

/// Cloneable handle for emitting Events from any thread.
///
/// A full queue blocks the emitter until the pump catches up.
#[derive(Clone)]
pub struct EventSink {
    tx: SyncSender<PumpMessage>,
    /// Held shared for the whole check-and-enqueue of one emit, so the stop
    /// marker can only be queued after every accepted event.
    closed: Arc<RwLock<bool>>,
}

impl EventSink {
    /// Queue an event for delivery. Fails with [`BridgeError::Closed`] once
    /// shutdown has begun; an `Ok` event is always delivered.
    pub fn emit(&self, event: Event) -> Result<()> {
        let closed = self.closed.read();
        if *closed {
            return Err(BridgeError::Closed);
        }
        self.tx
            .send(PumpMessage::Event(event))
            .map_err(|_| BridgeError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// Refuse further events. Waits for emits already in progress.
    fn close(&self) {
        *self.closed.write() = true;
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The single thread that delivers queued Events to [`Outbound`].
pub struct EventPump {
    sink: EventSink,
    handle: Option<JoinHandle<u64>>,
}

impl EventPump {
    /// Spawn the pump with a queue of `capacity` events.
    pub fn spawn(outbound: Arc<Outbound>, capacity: usize) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let handle = thread::Builder::new()
            .name("guibridge-events".to_string())
            .spawn(move || pump_events(&rx, &outbound))
            .map_err(|source| BridgeError::Spawn {
                name: "event pump",
                source,
            })?;

        Ok(Self {
            sink: EventSink {
                tx,
                closed: Arc::new(RwLock::new(false)),
            },
            handle: Some(handle),
        })
    }

    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Refuse new events, deliver everything already queued, and join the
    /// pump. Returns the number of events delivered over the pump's life.
    /// Later calls return 0.
    pub fn drain_and_stop(&mut self) -> u64 {
        self.sink.close();
        let Some(handle) = self.handle.take() else {
            return 0;
        };

        if self.sink.tx.send(PumpMessage::Stop).is_err() {
            tracing::warn!("event pump exited before stop marker");
        }
        match handle.join() {
            Ok(delivered) => {
                tracing::debug!(delivered, "event pump drained");
                delivered
            }
            Err(_) => {
                tracing::error!("event pump panicked");
                0
            }
        }
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.drain_and_stop();
    }
}

fn pump_events(rx: &Receiver<PumpMessage>, outbound: &Outbound) -> u64 {
    let mut delivered = 0;
    for message in rx.iter() {
        match message {
            PumpMessage::Event(event) => {
                if outbound.send(&OutboundMessage::Event(event)).is_ok() {
                    delivered += 1;
                }
            }
            PumpMessage::Stop => break,
        }
    }
    delivered
}
