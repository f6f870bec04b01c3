//! Introspection verbs used by UI test harnesses.

use serde_json::{json, Map, Value};

use super::lookup_widget;
use crate::dispatcher::{HandlerResult, Reply};
use crate::error::HandlerError;
use crate::lifecycle::Bridge;
use crate::protocol::Command;
use crate::registry::WidgetMetadata;
use crate::toolkit::Widget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    /// Widget text contains the selector.
    Text,
    ExactText,
    /// Entry placeholder contains the selector.
    Placeholder,
    /// Widget kind name equals the selector.
    Type,
    /// Widget id or registered custom id equals the selector.
    Id,
}

impl Selector {
    fn parse(value: &str) -> Result<Self, HandlerError> {
        match value {
            "text" => Ok(Self::Text),
            "exactText" => Ok(Self::ExactText),
            "placeholder" => Ok(Self::Placeholder),
            "type" => Ok(Self::Type),
            "id" => Ok(Self::Id),
            other => Err(HandlerError::InvalidPayload(format!(
                "unknown selector type: {other}"
            ))),
        }
    }

    fn matches(self, needle: &str, id: &str, widget: &dyn Widget, meta: &WidgetMetadata) -> bool {
        match self {
            Self::Text => text_of(widget).is_some_and(|text| text.contains(needle)),
            Self::ExactText => text_of(widget).is_some_and(|text| text == needle),
            Self::Placeholder => meta
                .placeholder
                .as_deref()
                .is_some_and(|placeholder| placeholder.contains(needle)),
            Self::Type => widget.kind().as_str() == needle,
            Self::Id => id == needle || meta.custom_id.as_deref() == Some(needle),
        }
    }
}

fn text_of(widget: &dyn Widget) -> Option<String> {
    widget.as_text().map(|holder| holder.text())
}

fn widget_info(id: &str, widget: &dyn Widget, meta: &WidgetMetadata) -> Value {
    let mut info = Map::new();
    info.insert("id".to_string(), json!(id));
    info.insert("type".to_string(), json!(widget.kind().as_str()));
    if let Some(text) = text_of(widget) {
        info.insert("text".to_string(), json!(text));
    }
    let optional = [
        ("placeholder", &meta.placeholder),
        ("customId", &meta.custom_id),
        ("parentId", &meta.parent_id),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            info.insert(key.to_string(), json!(value));
        }
    }
    Value::Object(info)
}

pub(super) fn register_custom_id(bridge: &Bridge, command: &Command) -> HandlerResult {
    let widget_id = command.str_field("widgetId")?;
    let custom_id = command.str_field("customId")?;
    let widget = lookup_widget(bridge, widget_id)?;

    let metadata = &bridge.registry().metadata;
    let updated = metadata.update(widget_id, |meta| meta.custom_id = Some(custom_id.to_string()));
    if !updated {
        let mut meta = WidgetMetadata::new(widget.kind());
        meta.custom_id = Some(custom_id.to_string());
        metadata.put(widget_id, meta);
    }
    Ok(Reply::ok())
}

pub(super) fn get_parent(bridge: &Bridge, command: &Command) -> HandlerResult {
    let widget_id = command.str_field("widgetId")?;
    let widget = lookup_widget(bridge, widget_id)?;

    let parent_id = bridge
        .registry()
        .metadata_or_default(widget_id, widget.as_ref())
        .parent_id
        .ok_or(HandlerError::NotFound("Parent"))?;
    Ok(Reply::json(json!({ "parentId": parent_id })))
}

pub(super) fn find_widget(bridge: &Bridge, command: &Command) -> HandlerResult {
    let needle = command.str_field("selector")?;
    let selector = Selector::parse(command.str_field("type")?)?;

    let registry = bridge.registry();
    let widget_ids: Vec<String> = registry
        .widgets
        .snapshot()
        .into_iter()
        .filter(|(id, widget)| {
            let meta = registry.metadata_or_default(id, widget.as_ref());
            selector.matches(needle, id, widget.as_ref(), &meta)
        })
        .map(|(id, _)| id)
        .collect();

    Ok(Reply::json(json!({ "widgetIds": widget_ids })))
}

pub(super) fn get_widget_info(bridge: &Bridge, command: &Command) -> HandlerResult {
    let widget_id = command.str_field("widgetId")?;
    let widget = lookup_widget(bridge, widget_id)?;
    let meta = bridge
        .registry()
        .metadata_or_default(widget_id, widget.as_ref());

    Ok(Reply::json(widget_info(widget_id, widget.as_ref(), &meta)))
}

pub(super) fn get_all_widgets(bridge: &Bridge, _command: &Command) -> HandlerResult {
    let registry = bridge.registry();
    let widgets: Vec<Value> = registry
        .widgets
        .snapshot()
        .into_iter()
        .map(|(id, widget)| {
            let meta = registry.metadata_or_default(&id, widget.as_ref());
            widget_info(&id, widget.as_ref(), &meta)
        })
        .collect();

    Ok(Reply::json(json!({ "widgets": widgets })))
}

pub(super) fn click_widget(bridge: &Bridge, command: &Command) -> HandlerResult {
    let widget = lookup_widget(bridge, command.str_field("widgetId")?)?;
    widget
        .as_tappable()
        .ok_or(HandlerError::Unsupported("click"))?
        .tap();
    Ok(Reply::ok())
}
