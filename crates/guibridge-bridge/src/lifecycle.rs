use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use guibridge_frame::{FrameConfig, ReadFrame};
use parking_lot::Mutex;

use crate::dispatcher::{self, CorruptFramePolicy, Handler, HandlerTable, LoopExit};
use crate::error::{BridgeError, Result};
use crate::outbound::{EventPump, EventSink, Outbound, OutputStream};
use crate::protocol::{Event, Response};
use crate::registry::ObjectRegistry;
use crate::toolkit::Toolkit;

#[cfg(feature = "schema")]
use guibridge_schema::VerbSchemaRegistry;

/// Default bound of the event queue.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Bridge configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Frame limits for both directions.
    pub frame: FrameConfig,
    /// Events that may wait for the output stream before emitters block.
    pub event_queue_capacity: usize,
    pub corrupt_policy: CorruptFramePolicy,
    /// Stop the toolkit when the inbound stream ends without a quit.
    pub exit_on_inbound_close: bool,
    /// Send `{"id":"ready","success":true}` once commands are accepted.
    pub announce_ready: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            corrupt_policy: CorruptFramePolicy::default(),
            exit_on_inbound_close: true,
            announce_ready: true,
        }
    }
}

/// Process-wide bridge state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BridgeState {
    Created = 0,
    Running = 1,
    Quitting = 2,
    Closed = 3,
}

impl BridgeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Quitting,
            _ => Self::Closed,
        }
    }

    pub fn accepts_commands(self) -> bool {
        self == Self::Running
    }
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(BridgeState::Created as u8))
    }

    fn get(&self) -> BridgeState {
        BridgeState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Created -> Running`, or the state that prevented it.
    fn begin(&self) -> std::result::Result<(), BridgeState> {
        self.0
            .compare_exchange(
                BridgeState::Created as u8,
                BridgeState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(BridgeState::from_u8)
    }

    /// Move forward to `to`. Returns `false` if already there or beyond.
    fn advance(&self, to: BridgeState) -> bool {
        self.0.fetch_max(to as u8, Ordering::AcqRel) < to as u8
    }
}

/// Outcome of [`Bridge::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub exit: LoopExit,
    pub commands: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
}

/// The explicitly owned context every handler receives: registries, the
/// output channel, the toolkit and the run state.
pub struct Bridge {
    registry: ObjectRegistry,
    toolkit: Arc<dyn Toolkit>,
    outbound: Arc<Outbound>,
    events: EventSink,
    pump: Mutex<EventPump>,
    handlers: HandlerTable,
    config: BridgeConfig,
    state: StateCell,
    exit: Mutex<Option<LoopExit>>,
    commands: AtomicU64,
    #[cfg(feature = "schema")]
    schemas: Option<VerbSchemaRegistry>,
}

impl Bridge {
    pub fn builder(toolkit: Arc<dyn Toolkit>) -> BridgeBuilder {
        BridgeBuilder::new(toolkit)
    }

    /// Bridge with the built-in handler table.
    pub fn new(
        toolkit: Arc<dyn Toolkit>,
        output: OutputStream,
        config: BridgeConfig,
    ) -> Result<Arc<Self>> {
        Self::builder(toolkit).config(config).build(output)
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn toolkit(&self) -> &dyn Toolkit {
        self.toolkit.as_ref()
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Handle for emitting Events from callbacks on any thread.
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn emit(&self, event: Event) -> Result<()> {
        self.events.emit(event)
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        self.state.get()
    }

    #[cfg(feature = "schema")]
    pub fn schemas(&self) -> Option<&VerbSchemaRegistry> {
        self.schemas.as_ref()
    }

    /// Run the session: spawn the inbound reader, then block in the
    /// toolkit's event loop on the calling thread until it quits.
    pub fn start(self: &Arc<Self>, inbound: Box<dyn ReadFrame + Send>) -> Result<RunSummary> {
        if let Err(state) = self.state.begin() {
            return Err(if state == BridgeState::Running {
                BridgeError::AlreadyStarted
            } else {
                BridgeError::Closed
            });
        }
        tracing::info!(verbs = self.handlers.len(), "bridge running");

        if self.config.announce_ready {
            // Logged by the channel on failure.
            let _ = self.outbound.send(&Response::ready().into());
        }

        let bridge = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("guibridge-reader".to_string())
            .spawn(move || {
                let mut inbound = inbound;
                let exit = dispatcher::run_loop(&bridge, inbound.as_mut());
                if exit != LoopExit::Quit {
                    bridge.inbound_ended(exit);
                }
            });
        let reader = match spawned {
            Ok(reader) => reader,
            Err(source) => {
                self.close();
                return Err(BridgeError::Spawn {
                    name: "reader",
                    source,
                });
            }
        };

        self.toolkit.run();
        self.close();

        // A reader still blocked on input is left detached.
        if reader.is_finished() {
            if reader.join().is_err() {
                tracing::error!("reader thread panicked");
                self.record_exit(LoopExit::Failed("reader thread panicked".to_string()));
            }
        } else {
            tracing::debug!("reader still waiting on input; not joining");
        }

        let summary = RunSummary {
            exit: self.exit.lock().clone().unwrap_or(LoopExit::Quit),
            commands: self.commands.load(Ordering::Relaxed),
            frames_sent: self.outbound.frames_sent(),
            send_failures: self.outbound.send_failures(),
        };
        tracing::info!(
            exit = ?summary.exit,
            commands = summary.commands,
            frames_sent = summary.frames_sent,
            "bridge stopped"
        );
        Ok(summary)
    }

    /// Begin shutdown without a quit Command, e.g. on SIGINT.
    pub fn request_quit(&self) {
        if self.state.advance(BridgeState::Quitting) {
            tracing::info!("quit requested");
            self.record_exit(LoopExit::Quit);
            self.drain_events();
            self.toolkit.quit();
        }
    }

    /// Quit ordering: refuse further Commands, deliver queued Events, write
    /// the final Response, then stop the toolkit.
    pub(crate) fn finish_with(&self, response: Response) {
        self.state.advance(BridgeState::Quitting);
        self.record_exit(LoopExit::Quit);
        self.drain_events();
        // Logged by the channel on failure.
        let _ = self.outbound.send(&response.into());
        self.toolkit.quit();
    }

    fn inbound_ended(&self, exit: LoopExit) {
        self.record_exit(exit);
        if !self.config.exit_on_inbound_close {
            tracing::info!("inbound ended; keeping toolkit alive");
            return;
        }
        if self.state.advance(BridgeState::Quitting) {
            self.drain_events();
            self.toolkit.quit();
        }
    }

    pub(crate) fn count_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    fn record_exit(&self, exit: LoopExit) {
        let mut slot = self.exit.lock();
        if slot.is_none() {
            *slot = Some(exit);
        }
    }

    pub(crate) fn drain_events(&self) {
        self.pump.lock().drain_and_stop();
    }

    fn close(&self) {
        self.state.advance(BridgeState::Closed);
        self.drain_events();
    }

    #[cfg(test)]
    pub(crate) fn mark_running(&self) {
        let _ = self.state.begin();
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("registry", &self.registry)
            .field("outbound", &self.outbound)
            .finish()
    }
}

/// Builder for [`Bridge`].
pub struct BridgeBuilder {
    toolkit: Arc<dyn Toolkit>,
    config: BridgeConfig,
    handlers: HandlerTable,
    #[cfg(feature = "schema")]
    schemas: Option<VerbSchemaRegistry>,
}

impl BridgeBuilder {
    pub fn new(toolkit: Arc<dyn Toolkit>) -> Self {
        Self {
            toolkit,
            config: BridgeConfig::default(),
            handlers: HandlerTable::builtin(),
            #[cfg(feature = "schema")]
            schemas: None,
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the whole handler table.
    pub fn handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    /// Add or replace one verb.
    pub fn handler<H>(mut self, verb: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.handlers.register(verb, handler);
        self
    }

    /// Validate payloads against per-verb schemas before routing.
    #[cfg(feature = "schema")]
    pub fn schemas(mut self, schemas: VerbSchemaRegistry) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Build the bridge and spawn its event pump.
    pub fn build(self, output: OutputStream) -> Result<Arc<Bridge>> {
        let outbound = Arc::new(Outbound::new(output, self.config.frame));
        let pump = EventPump::spawn(Arc::clone(&outbound), self.config.event_queue_capacity)?;
        let events = pump.sink();

        Ok(Arc::new(Bridge {
            registry: ObjectRegistry::new(),
            toolkit: self.toolkit,
            outbound,
            events,
            pump: Mutex::new(pump),
            handlers: self.handlers,
            config: self.config,
            state: StateCell::new(),
            exit: Mutex::new(None),
            commands: AtomicU64::new(0),
            #[cfg(feature = "schema")]
            schemas: self.schemas,
        }))
    }
}
