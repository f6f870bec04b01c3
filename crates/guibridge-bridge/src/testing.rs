//! Shared fixtures for in-crate tests.

use std::io::{self, Write};
use std::sync::Arc;

use bytes::BytesMut;
use guibridge_frame::{decode_frame, encode_frame};
use parking_lot::Mutex;
use serde_json::Value;

use crate::dispatcher::{dispatch, FollowUp, Handler};
use crate::headless::{HeadlessConfig, HeadlessToolkit};
use crate::lifecycle::{Bridge, BridgeBuilder, BridgeConfig};
use crate::protocol::{Command, Event, OutboundMessage, Response};

/// Output stream that keeps every byte written.
#[derive(Clone, Default)]
pub(crate) struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    pub(crate) fn messages(&self) -> Vec<OutboundMessage> {
        let mut buf = BytesMut::from(self.0.lock().as_slice());
        let mut messages = Vec::new();
        while let Some(frame) = decode_frame(&mut buf, usize::MAX).unwrap() {
            messages.push(serde_json::from_slice(&frame.payload).unwrap());
        }
        assert!(buf.is_empty(), "partial frame on the wire");
        messages
    }

    pub(crate) fn responses(&self) -> Vec<Response> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::Response(response) => Some(response),
                OutboundMessage::Event(_) => None,
            })
            .collect()
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::Event(event) => Some(event),
                OutboundMessage::Response(_) => None,
            })
            .collect()
    }
}

/// Encode payloads back to back.
pub(crate) fn framed(payloads: &[&[u8]]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for payload in payloads {
        encode_frame(payload, &mut buf).unwrap();
    }
    buf.to_vec()
}

pub(crate) struct TestBridge {
    pub bridge: Arc<Bridge>,
    pub toolkit: Arc<HeadlessToolkit>,
    pub capture: Capture,
}

impl TestBridge {
    /// A bridge that has not been started.
    pub(crate) fn new() -> Self {
        Self::build(HeadlessConfig::default(), BridgeConfig::default(), |builder| builder)
    }

    /// A bridge in the running state, without a reader thread or event loop.
    pub(crate) fn running() -> Self {
        Self::running_with(|_| {})
    }

    pub(crate) fn running_with(configure: impl FnOnce(&mut BridgeConfig)) -> Self {
        let mut config = BridgeConfig::default();
        configure(&mut config);
        let test = Self::build(HeadlessConfig::default(), config, |builder| builder);
        test.bridge.mark_running();
        test
    }

    pub(crate) fn with_toolkit(toolkit_config: HeadlessConfig) -> Self {
        let test = Self::build(toolkit_config, BridgeConfig::default(), |builder| builder);
        test.bridge.mark_running();
        test
    }

    pub(crate) fn with_handler<H: Handler + 'static>(verb: &str, handler: H) -> Self {
        let test = Self::build(HeadlessConfig::default(), BridgeConfig::default(), |builder| {
            builder.handler(verb, handler)
        });
        test.bridge.mark_running();
        test
    }

    pub(crate) fn build(
        toolkit_config: HeadlessConfig,
        config: BridgeConfig,
        customize: impl FnOnce(BridgeBuilder) -> BridgeBuilder,
    ) -> Self {
        let toolkit = Arc::new(HeadlessToolkit::with_config(toolkit_config));
        let capture = Capture::default();
        let builder = Bridge::builder(toolkit.clone()).config(config);
        let bridge = customize(builder)
            .build(Box::new(capture.clone()))
            .unwrap();
        Self {
            bridge,
            toolkit,
            capture,
        }
    }

    /// Dispatch one command directly and return its Response.
    pub(crate) fn send(&self, id: &str, verb: &str, payload: Value) -> Response {
        self.send_full(id, verb, payload).0
    }

    pub(crate) fn send_full(&self, id: &str, verb: &str, payload: Value) -> (Response, FollowUp) {
        let command: Command = serde_json::from_value(serde_json::json!({
            "id": id,
            "type": verb,
            "payload": payload,
        }))
        .unwrap();
        dispatch(&self.bridge, &command)
    }

    pub(crate) fn responses(&self) -> Vec<Response> {
        self.capture.responses()
    }

    /// Run pending GUI tasks, flush the event pump, and return every Event
    /// written so far. Closes the event path.
    pub(crate) fn flush_events(&self) -> Vec<Event> {
        self.toolkit.run_pending();
        self.bridge.drain_events();
        self.capture.events()
    }
}
