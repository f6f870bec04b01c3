//! Drive a headless bridge from the same process over a socket pair.
//!
//! Run with:
//!   cargo run --example in-process

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::thread;

    use guibridge::bridge::{Bridge, BridgeConfig, HeadlessToolkit};
    use guibridge::frame::{FrameReader, FrameWriter};
    use serde_json::json;

    let (host_commands, worker_commands) = UnixStream::pair()?;
    let (worker_output, host_output) = UnixStream::pair()?;

    let toolkit = Arc::new(HeadlessToolkit::new());
    let bridge = Bridge::new(toolkit, Box::new(worker_output), BridgeConfig::default())?;
    let worker = thread::spawn(move || bridge.start(Box::new(FrameReader::new(worker_commands))));

    let mut commands = FrameWriter::new(host_commands);
    let mut replies = FrameReader::new(host_output);

    let ready = replies.read_frame()?;
    eprintln!("worker: {}", String::from_utf8_lossy(&ready.payload));

    for command in [
        json!({ "id": "1", "type": "createWindow", "payload": { "id": "main", "title": "Demo" } }),
        json!({ "id": "2", "type": "createButton", "payload": { "id": "go", "text": "Go", "callbackId": "on-go" } }),
        json!({ "id": "3", "type": "setContent", "payload": { "windowId": "main", "widgetId": "go" } }),
        json!({ "id": "4", "type": "clickWidget", "payload": { "widgetId": "go" } }),
    ] {
        commands.send(&serde_json::to_vec(&command)?)?;
    }

    // Four responses plus the click callback, in whatever order they land.
    for _ in 0..5 {
        let frame = replies.read_frame()?;
        eprintln!("worker: {}", String::from_utf8_lossy(&frame.payload));
    }

    commands.send(&serde_json::to_vec(&json!({ "id": "5", "type": "quit" }))?)?;
    let last = replies.read_frame()?;
    eprintln!("worker: {}", String::from_utf8_lossy(&last.payload));

    match worker.join() {
        Ok(summary) => eprintln!("session ended: {:?}", summary?),
        Err(_) => eprintln!("worker thread panicked"),
    }
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("this example needs Unix domain sockets");
}
