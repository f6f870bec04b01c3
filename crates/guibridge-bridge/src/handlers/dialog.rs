use serde_json::{Map, Value};

use super::lookup_window;
use crate::dispatcher::{HandlerResult, Reply};
use crate::error::HandlerError;
use crate::lifecycle::Bridge;
use crate::protocol::{Command, Event};
use crate::toolkit::{Dialog, DialogAnswer, DialogCallback, FieldKind, FieldValue, FormField};

type AnswerData = fn(&DialogAnswer, &mut Map<String, Value>);

fn title_and_message(command: &Command) -> Result<(String, String), HandlerError> {
    Ok((
        command.str_field("title")?.to_string(),
        command.str_field("message")?.to_string(),
    ))
}

pub(super) fn show_info(bridge: &Bridge, command: &Command) -> HandlerResult {
    let window = lookup_window(bridge, command.str_field("windowId")?)?;
    let (title, message) = title_and_message(command)?;
    window.show_dialog(Dialog::Info { title, message }, None);
    Ok(Reply::ok())
}

pub(super) fn show_error(bridge: &Bridge, command: &Command) -> HandlerResult {
    let window = lookup_window(bridge, command.str_field("windowId")?)?;
    let (title, message) = title_and_message(command)?;
    window.show_dialog(Dialog::Error { title, message }, None);
    Ok(Reply::ok())
}

/// Show `dialog` and answer later with a callback Event carrying
/// `callbackId` plus whatever `describe` derives from the answer.
///
/// The Response only acknowledges that the dialog is up.
fn show_with_callback(
    bridge: &Bridge,
    command: &Command,
    dialog: Dialog,
    describe: AnswerData,
) -> HandlerResult {
    let window = lookup_window(bridge, command.str_field("windowId")?)?;
    let callback_id = command.str_field("callbackId")?.to_string();

    let events = bridge.events().clone();
    let on_answer: DialogCallback = Box::new(move |answer: DialogAnswer| {
        let mut data = Map::new();
        data.insert("callbackId".to_string(), Value::String(callback_id.clone()));
        describe(&answer, &mut data);
        if let Err(err) = events.emit(Event::callback(None, data)) {
            tracing::debug!(callback_id = %callback_id, error = %err, "dialog answer dropped");
        }
    });

    window.show_dialog(dialog, Some(on_answer));
    Ok(Reply::ok())
}

pub(super) fn show_confirm(bridge: &Bridge, command: &Command) -> HandlerResult {
    let (title, message) = title_and_message(command)?;
    show_with_callback(bridge, command, Dialog::Confirm { title, message }, |answer, data| {
        data.insert(
            "confirmed".to_string(),
            Value::Bool(*answer == DialogAnswer::Confirmed),
        );
    })
}

/// `{<key>: chosen path or "", error: bool}`.
fn picked_path(key: &str, answer: &DialogAnswer, data: &mut Map<String, Value>) {
    let path = match answer {
        DialogAnswer::Picked(path) => path.clone(),
        _ => String::new(),
    };
    data.insert(key.to_string(), Value::String(path));
    data.insert(
        "error".to_string(),
        Value::Bool(matches!(answer, DialogAnswer::Failed(_))),
    );
}

pub(super) fn show_file_open(bridge: &Bridge, command: &Command) -> HandlerResult {
    show_with_callback(bridge, command, Dialog::FileOpen, |answer, data| {
        picked_path("filePath", answer, data)
    })
}

pub(super) fn show_file_save(bridge: &Bridge, command: &Command) -> HandlerResult {
    let file_name = command
        .opt_str_field("fileName")?
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    show_with_callback(bridge, command, Dialog::FileSave { file_name }, |answer, data| {
        picked_path("filePath", answer, data)
    })
}

pub(super) fn show_folder_open(bridge: &Bridge, command: &Command) -> HandlerResult {
    show_with_callback(bridge, command, Dialog::FolderOpen, |answer, data| {
        picked_path("folderPath", answer, data)
    })
}

/// Answers `{submitted, values}`; `values` is empty unless submitted.
pub(super) fn show_form(bridge: &Bridge, command: &Command) -> HandlerResult {
    let dialog = Dialog::Form {
        title: command.str_field("title")?.to_string(),
        confirm_text: command.opt_str_field("confirmText")?.unwrap_or("OK").to_string(),
        dismiss_text: command
            .opt_str_field("dismissText")?
            .unwrap_or("Cancel")
            .to_string(),
        fields: form_fields(command)?,
    };
    show_with_callback(bridge, command, dialog, |answer, data| {
        let values: Map<String, Value> = match answer {
            DialogAnswer::Submitted(values) => values
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        FieldValue::Text(text) => Value::String(text.clone()),
                        FieldValue::Checked(checked) => Value::Bool(*checked),
                    };
                    (name.clone(), value)
                })
                .collect(),
            _ => Map::new(),
        };
        data.insert(
            "submitted".to_string(),
            Value::Bool(matches!(answer, DialogAnswer::Submitted(_))),
        );
        data.insert("values".to_string(), Value::Object(values));
    })
}

fn form_fields(command: &Command) -> Result<Vec<FormField>, HandlerError> {
    let items = match command.payload.get("fields") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid("fields must be an array")),
        None => return Err(invalid("fields is required")),
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| form_field(index, item))
        .collect()
}

fn form_field(index: usize, item: &Value) -> Result<FormField, HandlerError> {
    let Value::Object(field) = item else {
        return Err(invalid(format!("fields[{index}] must be an object")));
    };
    let text = |key: &str| -> Result<Option<String>, HandlerError> {
        match field.get(key) {
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(invalid(format!("fields[{index}].{key} must be a string"))),
        }
    };
    let required = |key: &str| {
        text(key)?.ok_or_else(|| invalid(format!("fields[{index}].{key} is required")))
    };

    // Unrecognized types fall back to a plain entry.
    let kind = text("type")?
        .and_then(|kind| kind.parse::<FieldKind>().ok())
        .unwrap_or_default();
    let options = match field.get("options") {
        Some(Value::Array(options)) => options
            .iter()
            .filter_map(|option| option.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    Ok(FormField {
        name: required("name")?,
        label: required("label")?,
        kind,
        placeholder: text("placeholder")?,
        value: text("value")?,
        hint: text("hint")?,
        options,
    })
}

fn invalid(problem: impl Into<String>) -> HandlerError {
    HandlerError::InvalidPayload(problem.into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use std::path::PathBuf;

    use crate::headless::{DialogPolicy, HeadlessConfig};
    use crate::protocol::Response;
    use crate::testing::TestBridge;
    use crate::toolkit::{Dialog, DialogAnswer, FieldKind};

    fn with_window(config: HeadlessConfig) -> TestBridge {
        let test = TestBridge::with_toolkit(config);
        test.send("1", "createWindow", json!({ "id": "w1", "title": "Main" }));
        test
    }

    fn accepting(path: &str) -> HeadlessConfig {
        HeadlessConfig {
            dialog_policy: DialogPolicy::Confirm,
            picked_path: PathBuf::from(path),
        }
    }

    fn confirm_payload() -> serde_json::Value {
        json!({
            "windowId": "w1",
            "title": "Delete",
            "message": "Really delete?",
            "callbackId": "cb1"
        })
    }

    #[test]
    fn info_on_missing_window_fails() {
        let test = TestBridge::running();
        let response = test.send(
            "1",
            "showInfo",
            json!({ "windowId": "nope", "title": "t", "message": "m" }),
        );
        assert_eq!(response, Response::failure("1", "Window not found"));
    }

    #[test]
    fn info_and_error_acknowledge() {
        let test = TestBridge::running();
        test.send("1", "createWindow", json!({ "id": "w1", "title": "Main" }));
        let payload = json!({ "windowId": "w1", "title": "Oops", "message": "Broken" });

        assert!(test.send("2", "showInfo", payload.clone()).success);
        assert!(test.send("3", "showError", payload).success);
        assert!(test.flush_events().is_empty());
    }

    #[test]
    fn confirm_answer_arrives_as_event() {
        let test = TestBridge::running();
        test.send("1", "createWindow", json!({ "id": "w1", "title": "Main" }));
        assert!(test.send("2", "showConfirm", confirm_payload()).success);
        assert_eq!(test.toolkit.held_dialogs().len(), 1);

        test.toolkit.answer_dialogs(true);
        let events = test.flush_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].widget_id, None);
        assert_eq!(
            events[0].data.clone().unwrap(),
            json!({ "callbackId": "cb1", "confirmed": true })
                .as_object()
                .unwrap()
                .clone()
        );
    }

    #[test]
    fn dismiss_policy_answers_false() {
        let test = TestBridge::with_toolkit(HeadlessConfig {
            dialog_policy: DialogPolicy::Dismiss,
            ..HeadlessConfig::default()
        });
        test.send("1", "createWindow", json!({ "id": "w1", "title": "Main" }));
        test.send("2", "showConfirm", confirm_payload());

        let events = test.flush_events();
        assert_eq!(events[0].data.as_ref().unwrap()["confirmed"], json!(false));
    }

    #[test]
    fn confirm_requires_callback_id() {
        let test = TestBridge::running();
        test.send("1", "createWindow", json!({ "id": "w1", "title": "Main" }));
        let response = test.send(
            "2",
            "showConfirm",
            json!({ "windowId": "w1", "title": "t", "message": "m" }),
        );
        assert_eq!(
            response.error.as_deref(),
            Some("Invalid payload: callbackId is required")
        );
        assert!(test.toolkit.held_dialogs().is_empty());
    }

    #[test]
    fn file_open_answer_carries_the_chosen_path() {
        let test = with_window(accepting("/home/ada/report.pdf"));
        let response = test.send("2", "showFileOpen", json!({ "windowId": "w1", "callbackId": "open" }));
        assert!(response.success);

        let events = test.flush_events();
        assert_eq!(
            serde_json::Value::Object(events[0].data.clone().unwrap()),
            json!({ "callbackId": "open", "filePath": "/home/ada/report.pdf", "error": false })
        );
    }

    #[test]
    fn file_save_suggests_the_file_name() {
        let test = with_window(accepting("/home/ada"));
        test.send(
            "2",
            "showFileSave",
            json!({ "windowId": "w1", "callbackId": "save", "fileName": "notes.txt" }),
        );

        let events = test.flush_events();
        let expected = PathBuf::from("/home/ada").join("notes.txt").display().to_string();
        assert_eq!(events[0].data.as_ref().unwrap()["filePath"], json!(expected));
    }

    #[test]
    fn cancelled_folder_pick_has_empty_path() {
        let test = with_window(HeadlessConfig::default());
        test.send("2", "showFolderOpen", json!({ "windowId": "w1", "callbackId": "dir" }));
        assert!(matches!(test.toolkit.held_dialogs()[..], [Dialog::FolderOpen]));

        test.toolkit.answer_dialogs(false);
        let events = test.flush_events();
        assert_eq!(
            serde_json::Value::Object(events[0].data.clone().unwrap()),
            json!({ "callbackId": "dir", "folderPath": "", "error": false })
        );
    }

    #[test]
    fn failed_picker_reports_error() {
        let test = with_window(HeadlessConfig::default());
        test.send("2", "showFileOpen", json!({ "windowId": "w1", "callbackId": "open" }));

        assert!(test.toolkit.answer_next(DialogAnswer::Failed("portal unavailable".into())));
        let events = test.flush_events();
        assert_eq!(events[0].data.as_ref().unwrap()["error"], json!(true));
        assert_eq!(events[0].data.as_ref().unwrap()["filePath"], json!(""));
    }

    #[test]
    fn picker_on_missing_window_fails() {
        let test = TestBridge::running();
        let response = test.send("1", "showFolderOpen", json!({ "windowId": "nope", "callbackId": "d" }));
        assert_eq!(response, Response::failure("1", "Window not found"));
    }

    fn form_payload() -> serde_json::Value {
        json!({
            "windowId": "w1",
            "title": "Sign up",
            "confirmText": "Create",
            "dismissText": "Back",
            "callbackId": "form",
            "fields": [
                { "name": "user", "label": "User", "value": "ada" },
                { "name": "secret", "label": "Password", "type": "password" },
                { "name": "plan", "label": "Plan", "type": "select", "options": ["free", "pro"], "value": "pro" },
                { "name": "terms", "label": "Accept", "type": "check", "value": "true" },
                { "name": "color", "label": "Colour", "type": "slider" }
            ]
        })
    }

    #[test]
    fn form_is_built_from_fields() {
        let test = with_window(HeadlessConfig::default());
        assert!(test.send("2", "showForm", form_payload()).success);

        let held = test.toolkit.held_dialogs();
        let Dialog::Form {
            confirm_text,
            dismiss_text,
            fields,
            ..
        } = &held[0]
        else {
            panic!("expected a form dialog");
        };
        assert_eq!((confirm_text.as_str(), dismiss_text.as_str()), ("Create", "Back"));
        let kinds: Vec<FieldKind> = fields.iter().map(|field| field.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Entry,
                FieldKind::Password,
                FieldKind::Select,
                FieldKind::Check,
                FieldKind::Entry
            ]
        );
        assert_eq!(fields[2].options, vec!["free".to_string(), "pro".to_string()]);
    }

    #[test]
    fn submitted_form_answers_with_values() {
        let test = with_window(HeadlessConfig::default());
        test.send("2", "showForm", form_payload());

        test.toolkit.answer_dialogs(true);
        let events = test.flush_events();
        assert_eq!(
            serde_json::Value::Object(events[0].data.clone().unwrap()),
            json!({
                "callbackId": "form",
                "submitted": true,
                "values": {
                    "user": "ada",
                    "secret": "",
                    "plan": "pro",
                    "terms": true,
                    "color": ""
                }
            })
        );
    }

    #[test]
    fn dismissed_form_has_no_values() {
        let test = with_window(HeadlessConfig::default());
        test.send("2", "showForm", form_payload());

        test.toolkit.answer_dialogs(false);
        let events = test.flush_events();
        assert_eq!(events[0].data.as_ref().unwrap()["submitted"], json!(false));
        assert_eq!(events[0].data.as_ref().unwrap()["values"], json!({}));
    }

    #[test]
    fn form_field_without_name_is_rejected() {
        let test = with_window(HeadlessConfig::default());
        let response = test.send(
            "2",
            "showForm",
            json!({
                "windowId": "w1",
                "title": "t",
                "callbackId": "f",
                "fields": [{ "label": "Nameless" }]
            }),
        );
        assert_eq!(
            response.error.as_deref(),
            Some("Invalid payload: fields[0].name is required")
        );
        assert!(test.toolkit.held_dialogs().is_empty());
    }
}
