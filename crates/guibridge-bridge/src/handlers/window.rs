use serde_json::json;

use super::{lookup_widget, lookup_window};
use crate::dispatcher::{HandlerResult, Reply};
use crate::lifecycle::Bridge;
use crate::protocol::Command;

pub(super) fn create_window(bridge: &Bridge, command: &Command) -> HandlerResult {
    let id = command.str_field("id")?;
    let title = command.str_field("title")?;

    let window = bridge.toolkit().create_window(title)?;
    if bridge.registry().windows.put(id, window).is_some() {
        tracing::debug!(window_id = id, "window id reused; previous window replaced");
    }

    Ok(Reply::json(json!({ "windowId": id })))
}

pub(super) fn set_content(bridge: &Bridge, command: &Command) -> HandlerResult {
    let window = lookup_window(bridge, command.str_field("windowId")?)?;
    let widget = lookup_widget(bridge, command.str_field("widgetId")?)?;

    window.set_content(widget);
    Ok(Reply::ok())
}

pub(super) fn show_window(bridge: &Bridge, command: &Command) -> HandlerResult {
    lookup_window(bridge, command.str_field("windowId")?)?.show();
    Ok(Reply::ok())
}

pub(super) fn set_window_title(bridge: &Bridge, command: &Command) -> HandlerResult {
    let window = lookup_window(bridge, command.str_field("windowId")?)?;
    window.set_title(command.str_field("title")?);
    Ok(Reply::ok())
}

pub(super) fn quit(_bridge: &Bridge, _command: &Command) -> HandlerResult {
    Ok(Reply::shutdown())
}
