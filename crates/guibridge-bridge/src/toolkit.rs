//! The seam between the protocol engine and a concrete GUI toolkit.
//!
//! Handlers never inspect concrete widget types. A widget advertises what it
//! can do through capability checks such as [`Widget::as_text`], and a missing
//! capability becomes a failure Response.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Result;

/// Invoked on the GUI thread when a tappable widget is activated.
pub type TapCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked once with the user's answer to a dialog.
pub type DialogCallback = Box<dyn FnOnce(DialogAnswer) + Send>;

/// Concrete widget families the built-in verbs create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Button,
    Label,
    Entry,
    VBox,
    HBox,
}

impl WidgetKind {
    /// Wire name as reported by inspection verbs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Label => "label",
            Self::Entry => "entry",
            Self::VBox => "vbox",
            Self::HBox => "hbox",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "button" => Ok(Self::Button),
            "label" => Ok(Self::Label),
            "entry" => Ok(Self::Entry),
            "vbox" => Ok(Self::VBox),
            "hbox" => Ok(Self::HBox),
            other => Err(format!("unknown widget kind: {other}")),
        }
    }
}

/// Everything a toolkit needs to construct one widget.
pub enum WidgetSpec {
    Button {
        text: String,
        on_tap: Option<TapCallback>,
    },
    Label {
        text: String,
    },
    Entry {
        placeholder: Option<String>,
    },
    VBox {
        children: Vec<Arc<dyn Widget>>,
    },
    HBox {
        children: Vec<Arc<dyn Widget>>,
    },
}

impl WidgetSpec {
    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::Button { .. } => WidgetKind::Button,
            Self::Label { .. } => WidgetKind::Label,
            Self::Entry { .. } => WidgetKind::Entry,
            Self::VBox { .. } => WidgetKind::VBox,
            Self::HBox { .. } => WidgetKind::HBox,
        }
    }
}

impl fmt::Debug for WidgetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button { text, on_tap } => f
                .debug_struct("Button")
                .field("text", text)
                .field("on_tap", &on_tap.is_some())
                .finish(),
            Self::Label { text } => f.debug_struct("Label").field("text", text).finish(),
            Self::Entry { placeholder } => f
                .debug_struct("Entry")
                .field("placeholder", placeholder)
                .finish(),
            Self::VBox { children } | Self::HBox { children } => f
                .debug_struct(if matches!(self, Self::VBox { .. }) { "VBox" } else { "HBox" })
                .field("children", &children.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Info,
    Error,
    Confirm,
    FileOpen,
    FileSave,
    FolderOpen,
    Form,
}

/// Input control of one form field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKind {
    #[default]
    Entry,
    Password,
    Multiline,
    Select,
    Check,
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "entry" => Ok(Self::Entry),
            "password" => Ok(Self::Password),
            "multiline" => Ok(Self::Multiline),
            "select" => Ok(Self::Select),
            "check" => Ok(Self::Check),
            other => Err(format!("unknown field type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormField {
    /// Key of this field in the submitted values.
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub placeholder: Option<String>,
    /// Initial value. `"true"` checks a check field.
    pub value: Option<String>,
    pub hint: Option<String>,
    /// Choices of a select field.
    pub options: Vec<String>,
}

impl FormField {
    /// The value this field holds before the user edits it.
    pub fn initial_value(&self) -> FieldValue {
        match self.kind {
            FieldKind::Check => FieldValue::Checked(self.value.as_deref() == Some("true")),
            _ => FieldValue::Text(self.value.clone().unwrap_or_default()),
        }
    }
}

/// One submitted form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Checked(bool),
}

/// A modal dialog request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Info {
        title: String,
        message: String,
    },
    Error {
        title: String,
        message: String,
    },
    Confirm {
        title: String,
        message: String,
    },
    FileOpen,
    FileSave {
        /// Suggested name of the new file.
        file_name: Option<String>,
    },
    FolderOpen,
    Form {
        title: String,
        confirm_text: String,
        dismiss_text: String,
        fields: Vec<FormField>,
    },
}

impl Dialog {
    pub fn kind(&self) -> DialogKind {
        match self {
            Self::Info { .. } => DialogKind::Info,
            Self::Error { .. } => DialogKind::Error,
            Self::Confirm { .. } => DialogKind::Confirm,
            Self::FileOpen => DialogKind::FileOpen,
            Self::FileSave { .. } => DialogKind::FileSave,
            Self::FolderOpen => DialogKind::FolderOpen,
            Self::Form { .. } => DialogKind::Form,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Info { title, .. }
            | Self::Error { title, .. }
            | Self::Confirm { title, .. }
            | Self::Form { title, .. } => Some(title),
            Self::FileOpen | Self::FileSave { .. } | Self::FolderOpen => None,
        }
    }
}

/// How the user closed a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAnswer {
    /// Closed without accepting: cancel, dismiss or the window's close box.
    Dismissed,
    /// Accepted a message or confirm dialog.
    Confirmed,
    /// Chose a file or folder.
    Picked(String),
    /// Submitted a form, keyed by field name.
    Submitted(BTreeMap<String, FieldValue>),
    /// The toolkit could not complete the dialog.
    Failed(String),
}

/// A GUI runtime the bridge drives.
///
/// `run` blocks the calling thread in the toolkit's event loop until `quit`
/// is called from any thread.
pub trait Toolkit: Send + Sync {
    fn create_window(&self, title: &str) -> Result<Arc<dyn WindowHandle>>;
    fn create_widget(&self, spec: WidgetSpec) -> Result<Arc<dyn Widget>>;
    fn run(&self);
    fn quit(&self);
}

/// A top-level window.
pub trait WindowHandle: Send + Sync {
    fn title(&self) -> String;
    fn set_title(&self, title: &str);
    fn set_content(&self, content: Arc<dyn Widget>);
    fn content(&self) -> Option<Arc<dyn Widget>>;
    fn show(&self);
    fn is_visible(&self) -> bool;
    /// Show a dialog over this window. `on_answer`, when given, is called
    /// exactly once from the GUI thread if the user answers.
    fn show_dialog(&self, dialog: Dialog, on_answer: Option<DialogCallback>);
}

/// A visible widget. Capabilities default to absent.
pub trait Widget: Send + Sync {
    fn kind(&self) -> WidgetKind;

    fn as_text(&self) -> Option<&dyn TextHolder> {
        None
    }

    fn as_tappable(&self) -> Option<&dyn Tappable> {
        None
    }

    fn as_typeable(&self) -> Option<&dyn Typeable> {
        None
    }
}

/// Widgets with a settable text.
pub trait TextHolder {
    fn set_text(&self, text: &str);
    fn text(&self) -> String;
}

/// Widgets that react to a tap or click.
pub trait Tappable {
    fn tap(&self);
}

/// Widgets that accept typed keyboard input.
pub trait Typeable {
    fn type_text(&self, text: &str);
}
