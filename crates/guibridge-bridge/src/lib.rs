//! The guibridge protocol engine.
//!
//! A host drives a GUI toolkit through framed JSON over a byte stream. This
//! crate owns everything between the frames and the toolkit:
//!
//! - an [`ObjectRegistry`] of windows, widgets, callbacks and widget metadata
//! - the [`Outbound`] channel and the [`EventPump`] that feeds it
//! - the [`dispatcher`], routing each [`Command`] to one [`Handler`]
//! - the [`Bridge`] lifecycle: ready, run, quit
//!
//! The toolkit is reached only through the traits in [`toolkit`];
//! [`HeadlessToolkit`] is an in-memory implementation.

pub mod dispatcher;
pub mod error;
mod handlers;
pub mod headless;
pub mod lifecycle;
pub mod outbound;
pub mod protocol;
pub mod registry;
pub mod toolkit;

#[cfg(test)]
mod testing;

pub use dispatcher::{
    dispatch, run_loop, CorruptFramePolicy, FollowUp, Handler, HandlerResult, HandlerTable,
    LoopExit, Reply,
};
pub use error::{BridgeError, HandlerError, Result};
pub use headless::{DialogPolicy, HeadlessConfig, HeadlessToolkit};
pub use lifecycle::{
    Bridge, BridgeBuilder, BridgeConfig, BridgeState, RunSummary, DEFAULT_EVENT_QUEUE_CAPACITY,
};
pub use outbound::{EventPump, EventSink, Outbound, OutputStream};
pub use protocol::{Command, Event, OutboundMessage, Response, EVENT_CALLBACK, READY_ID};
pub use registry::{Keyspace, ObjectRegistry, WidgetMetadata};
pub use toolkit::{
    Dialog, DialogAnswer, DialogCallback, DialogKind, FieldKind, FieldValue, FormField,
    TapCallback, Tappable, TextHolder, Toolkit, Typeable, Widget, WidgetKind, WidgetSpec,
    WindowHandle,
};
