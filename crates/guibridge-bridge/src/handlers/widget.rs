use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::lookup_widget;
use crate::dispatcher::{HandlerResult, Reply};
use crate::error::HandlerError;
use crate::lifecycle::Bridge;
use crate::protocol::{Command, Event};
use crate::registry::WidgetMetadata;
use crate::toolkit::{TapCallback, Widget, WidgetSpec};

/// Build a widget, then record it and its metadata under `id`.
///
/// Reusing an id replaces the widget but keeps the custom id and parent
/// recorded for it.
fn register(bridge: &Bridge, id: &str, spec: WidgetSpec) -> HandlerResult {
    let mut metadata = WidgetMetadata::from_spec(&spec);
    let widget = bridge.toolkit().create_widget(spec)?;

    let registry = bridge.registry();
    if let Some(previous) = registry.metadata.get(id) {
        metadata.custom_id = previous.custom_id;
        metadata.parent_id = previous.parent_id;
    }
    registry.widgets.put(id, widget);
    registry.metadata.put(id, metadata);

    Ok(Reply::json(json!({ "widgetId": id })))
}

pub(super) fn create_button(bridge: &Bridge, command: &Command) -> HandlerResult {
    let id = command.str_field("id")?;
    let text = command.str_field("text")?;
    let callback_id = command.opt_str_field("callbackId")?;

    let on_tap = callback_id.map(|callback_id| {
        let events = bridge.events().clone();
        let widget_id = id.to_string();
        let mut data = Map::new();
        data.insert("callbackId".to_string(), Value::String(callback_id.to_string()));
        let callback: TapCallback = Arc::new(move || {
            if let Err(err) = events.emit(Event::callback(Some(&widget_id), data.clone())) {
                tracing::debug!(widget_id = %widget_id, error = %err, "tap event dropped");
            }
        });
        callback
    });

    let reply = register(
        bridge,
        id,
        WidgetSpec::Button {
            text: text.to_string(),
            on_tap,
        },
    )?;
    match callback_id {
        Some(callback_id) => {
            bridge.registry().callbacks.put(id, callback_id.to_string());
        }
        None => {
            bridge.registry().callbacks.delete(id);
        }
    }
    Ok(reply)
}

pub(super) fn create_label(bridge: &Bridge, command: &Command) -> HandlerResult {
    let id = command.str_field("id")?;
    let text = command.str_field("text")?.to_string();
    register(bridge, id, WidgetSpec::Label { text })
}

pub(super) fn create_entry(bridge: &Bridge, command: &Command) -> HandlerResult {
    let id = command.str_field("id")?;
    let placeholder = command.opt_str_field("placeholder")?.map(str::to_string);
    register(bridge, id, WidgetSpec::Entry { placeholder })
}

pub(super) fn create_vbox(bridge: &Bridge, command: &Command) -> HandlerResult {
    create_container(bridge, command, |children| WidgetSpec::VBox { children })
}

pub(super) fn create_hbox(bridge: &Bridge, command: &Command) -> HandlerResult {
    create_container(bridge, command, |children| WidgetSpec::HBox { children })
}

fn create_container<F>(bridge: &Bridge, command: &Command, build: F) -> HandlerResult
where
    F: FnOnce(Vec<Arc<dyn Widget>>) -> WidgetSpec,
{
    let id = command.str_field("id")?;
    let child_ids = command.str_list_field("children")?;

    let registry = bridge.registry();
    let mut placed = Vec::with_capacity(child_ids.len());
    let mut children = Vec::with_capacity(child_ids.len());
    for child_id in child_ids {
        match registry.widgets.get(child_id) {
            Some(child) => {
                placed.push(child_id);
                children.push(child);
            }
            None => tracing::debug!(container = id, child = child_id, "unknown child skipped"),
        }
    }

    let reply = register(bridge, id, build(children))?;
    for child_id in placed {
        registry
            .metadata
            .update(child_id, |meta| meta.parent_id = Some(id.to_string()));
    }
    Ok(reply)
}

pub(super) fn set_text(bridge: &Bridge, command: &Command) -> HandlerResult {
    let widget = lookup_widget(bridge, command.str_field("widgetId")?)?;
    let text = command.str_field("text")?;

    widget
        .as_text()
        .ok_or(HandlerError::Unsupported("setText"))?
        .set_text(text);
    Ok(Reply::ok())
}

pub(super) fn get_text(bridge: &Bridge, command: &Command) -> HandlerResult {
    let widget = lookup_widget(bridge, command.str_field("widgetId")?)?;
    let text = widget
        .as_text()
        .ok_or(HandlerError::Unsupported("getText"))?
        .text();
    Ok(Reply::json(json!({ "text": text })))
}

pub(super) fn type_text(bridge: &Bridge, command: &Command) -> HandlerResult {
    let widget = lookup_widget(bridge, command.str_field("widgetId")?)?;
    let text = command.str_field("text")?;

    widget
        .as_typeable()
        .ok_or(HandlerError::Unsupported("typeText"))?
        .type_text(text);
    Ok(Reply::ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::protocol::Response;
    use crate::testing::TestBridge;
    use crate::toolkit::WidgetKind;

    #[test]
    fn label_text_round_trip() {
        let test = TestBridge::running();
        test.send("1", "createLabel", json!({ "id": "l1", "text": "Hello" }));

        assert!(test.send("2", "setText", json!({ "widgetId": "l1", "text": "Bye" })).success);
        let response = test.send("3", "getText", json!({ "widgetId": "l1" }));
        assert_eq!(response.result.unwrap()["text"], json!("Bye"));
    }

    #[test]
    fn containers_do_not_hold_text() {
        let test = TestBridge::running();
        test.send("1", "createVBox", json!({ "id": "v1", "children": [] }));

        assert_eq!(
            test.send("2", "setText", json!({ "widgetId": "v1", "text": "x" })),
            Response::failure("2", "Widget does not support setText")
        );
        assert_eq!(
            test.send("3", "getText", json!({ "widgetId": "v1" })).error.as_deref(),
            Some("Widget does not support getText")
        );
    }

    #[test]
    fn set_text_on_missing_widget_mutates_nothing() {
        let test = TestBridge::running();
        let response = test.send("1", "setText", json!({ "widgetId": "ghost", "text": "x" }));

        assert_eq!(response, Response::failure("1", "Widget not found"));
        assert!(test.bridge.registry().widgets.is_empty());
        assert!(test.bridge.registry().metadata.is_empty());
    }

    #[test]
    fn button_tap_emits_callback_event() {
        let test = TestBridge::running();
        let response = test.send(
            "1",
            "createButton",
            json!({ "id": "b1", "text": "Go", "callbackId": "cb7" }),
        );
        assert_eq!(response.result.unwrap()["widgetId"], json!("b1"));
        assert_eq!(
            test.bridge.registry().callbacks.get("b1").as_deref(),
            Some("cb7")
        );

        test.send("2", "clickWidget", json!({ "widgetId": "b1" }));
        let events = test.flush_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "callback");
        assert_eq!(events[0].widget_id.as_deref(), Some("b1"));
        assert_eq!(events[0].data.as_ref().unwrap()["callbackId"], json!("cb7"));
    }

    #[test]
    fn button_without_callback_is_silent() {
        let test = TestBridge::running();
        test.send("1", "createButton", json!({ "id": "b1", "text": "Go" }));
        test.send("2", "clickWidget", json!({ "widgetId": "b1" }));

        assert!(test.flush_events().is_empty());
        assert!(!test.bridge.registry().callbacks.contains("b1"));
    }

    #[test]
    fn containers_skip_unknown_children_and_record_parents() {
        let test = TestBridge::running();
        test.send("1", "createLabel", json!({ "id": "l1", "text": "A" }));
        test.send("2", "createEntry", json!({ "id": "e1", "placeholder": "Name" }));
        let response = test.send(
            "3",
            "createHBox",
            json!({ "id": "row", "children": ["l1", "ghost", "e1"] }),
        );
        assert!(response.success);

        let registry = test.bridge.registry();
        assert_eq!(registry.metadata.get("row").unwrap().kind, WidgetKind::HBox);
        assert_eq!(
            registry.metadata.get("l1").unwrap().parent_id.as_deref(),
            Some("row")
        );
        assert_eq!(
            registry.metadata.get("e1").unwrap().parent_id.as_deref(),
            Some("row")
        );
        assert!(!registry.widgets.contains("ghost"));
        assert!(!registry.metadata.contains("ghost"));
    }

    #[test]
    fn entry_accepts_typed_text() {
        let test = TestBridge::running();
        test.send("1", "createEntry", json!({ "id": "e1" }));
        test.send("2", "typeText", json!({ "widgetId": "e1", "text": "ab" }));
        test.send("3", "typeText", json!({ "widgetId": "e1", "text": "c" }));

        let response = test.send("4", "getText", json!({ "widgetId": "e1" }));
        assert_eq!(response.result.unwrap()["text"], json!("abc"));

        test.send("5", "createLabel", json!({ "id": "l1", "text": "x" }));
        assert_eq!(
            test.send("6", "typeText", json!({ "widgetId": "l1", "text": "y" })).error.as_deref(),
            Some("Widget does not support typeText")
        );
    }

    #[test]
    fn bad_children_field_is_invalid_payload() {
        let test = TestBridge::running();
        let response = test.send("1", "createVBox", json!({ "id": "v1", "children": "l1" }));
        assert_eq!(
            response.error.as_deref(),
            Some("Invalid payload: children must be an array")
        );
        assert!(test.bridge.registry().widgets.is_empty());
    }

    #[test]
    fn recreating_an_id_keeps_custom_id_and_parent() {
        let test = TestBridge::running();
        test.send("1", "createLabel", json!({ "id": "l1", "text": "A" }));
        test.send("2", "registerCustomId", json!({ "widgetId": "l1", "customId": "greeting" }));
        test.send("3", "createVBox", json!({ "id": "root", "children": ["l1"] }));

        assert!(test.send("4", "createButton", json!({ "id": "l1", "text": "B" })).success);

        let meta = test.bridge.registry().metadata.get("l1").unwrap();
        assert_eq!(meta.kind, WidgetKind::Button);
        assert_eq!(meta.custom_id.as_deref(), Some("greeting"));
        assert_eq!(meta.parent_id.as_deref(), Some("root"));

        let found = test.send("5", "findWidget", json!({ "selector": "greeting", "type": "id" }));
        assert_eq!(found.result.unwrap()["widgetIds"], json!(["l1"]));
    }
}
