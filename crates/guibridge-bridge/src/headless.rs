//! An in-memory toolkit for tests and display-less hosts.
//!
//! `run` is a real event loop: taps and dialog answers are queued as tasks
//! and executed on whichever thread called `run`, so callback Events leave
//! from the GUI thread exactly as they would with a windowing toolkit.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::Result;
use crate::toolkit::{
    Dialog, DialogAnswer, DialogCallback, Tappable, TapCallback, TextHolder, Toolkit, Typeable, Widget,
    WidgetKind, WidgetSpec, WindowHandle,
};

type Task = Box<dyn FnOnce() + Send>;

/// How dialogs that expect an answer are answered without a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DialogPolicy {
    /// Keep dialogs open until [`HeadlessToolkit::answer_dialogs`].
    #[default]
    Hold,
    /// Accept immediately.
    Confirm,
    /// Dismiss immediately.
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    pub dialog_policy: DialogPolicy,
    /// What file and folder pickers choose when accepted. A save dialog
    /// with a suggested name picks that name inside this path.
    pub picked_path: PathBuf,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            dialog_policy: DialogPolicy::default(),
            picked_path: std::env::temp_dir(),
        }
    }
}

impl HeadlessConfig {
    /// The answer an accepting or dismissing user gives to `dialog`.
    /// Forms submit their initial values.
    pub fn answer(&self, dialog: &Dialog, accept: bool) -> DialogAnswer {
        if !accept {
            return DialogAnswer::Dismissed;
        }
        match dialog {
            Dialog::Info { .. } | Dialog::Error { .. } | Dialog::Confirm { .. } => {
                DialogAnswer::Confirmed
            }
            Dialog::FileOpen | Dialog::FolderOpen => {
                DialogAnswer::Picked(self.picked_path.display().to_string())
            }
            Dialog::FileSave { file_name } => {
                let path = match file_name {
                    Some(name) => self.picked_path.join(name),
                    None => self.picked_path.clone(),
                };
                DialogAnswer::Picked(path.display().to_string())
            }
            Dialog::Form { fields, .. } => DialogAnswer::Submitted(
                fields
                    .iter()
                    .map(|field| (field.name.clone(), field.initial_value()))
                    .collect(),
            ),
        }
    }
}

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    quit: bool,
}

#[derive(Default)]
struct EventLoop {
    queue: Mutex<Queue>,
    wake: Condvar,
}

impl EventLoop {
    fn post(&self, task: Task) {
        self.queue.lock().tasks.push_back(task);
        self.wake.notify_one();
    }

    fn next_blocking(&self) -> Option<Task> {
        let mut queue = self.queue.lock();
        loop {
            if queue.quit {
                return None;
            }
            if let Some(task) = queue.tasks.pop_front() {
                return Some(task);
            }
            self.wake.wait(&mut queue);
        }
    }

    fn try_next(&self) -> Option<Task> {
        self.queue.lock().tasks.pop_front()
    }

    fn quit(&self) {
        self.queue.lock().quit = true;
        self.wake.notify_all();
    }

    fn has_quit(&self) -> bool {
        self.queue.lock().quit
    }
}

fn run_task(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        tracing::error!("GUI task panicked");
    }
}

struct HeldDialog {
    dialog: Dialog,
    on_answer: DialogCallback,
}

/// Toolkit whose windows and widgets live only in memory.
pub struct HeadlessToolkit {
    events: Arc<EventLoop>,
    held: Arc<Mutex<Vec<HeldDialog>>>,
    config: Arc<HeadlessConfig>,
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self::with_config(HeadlessConfig::default())
    }

    pub fn with_config(config: HeadlessConfig) -> Self {
        Self {
            events: Arc::new(EventLoop::default()),
            held: Arc::new(Mutex::new(Vec::new())),
            config: Arc::new(config),
        }
    }

    /// Run queued GUI tasks on the calling thread without blocking.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.events.try_next() {
            run_task(task);
            ran += 1;
        }
        ran
    }

    /// Accept or dismiss every held dialog. The callbacks run on the GUI
    /// loop.
    pub fn answer_dialogs(&self, accept: bool) -> usize {
        let held = std::mem::take(&mut *self.held.lock());
        let answered = held.len();
        for entry in held {
            let answer = self.config.answer(&entry.dialog, accept);
            self.deliver(entry, answer);
        }
        answered
    }

    /// Answer the oldest held dialog with `answer`. Returns `false` if none
    /// was waiting.
    pub fn answer_next(&self, answer: DialogAnswer) -> bool {
        let entry = {
            let mut held = self.held.lock();
            if held.is_empty() {
                return false;
            }
            held.remove(0)
        };
        self.deliver(entry, answer);
        true
    }

    fn deliver(&self, entry: HeldDialog, answer: DialogAnswer) {
        tracing::debug!(kind = ?entry.dialog.kind(), answer = ?answer, "answering dialog");
        let on_answer = entry.on_answer;
        self.events.post(Box::new(move || on_answer(answer)));
    }

    /// Dialogs waiting for an answer.
    pub fn held_dialogs(&self) -> Vec<Dialog> {
        self.held
            .lock()
            .iter()
            .map(|entry| entry.dialog.clone())
            .collect()
    }

    pub fn has_quit(&self) -> bool {
        self.events.has_quit()
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }
}

impl Default for HeadlessToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeadlessToolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessToolkit")
            .field("config", &self.config)
            .field("held_dialogs", &self.held.lock().len())
            .finish()
    }
}

impl Toolkit for HeadlessToolkit {
    fn create_window(&self, title: &str) -> Result<Arc<dyn WindowHandle>> {
        Ok(Arc::new(HeadlessWindow {
            title: RwLock::new(title.to_string()),
            content: RwLock::new(None),
            visible: AtomicBool::new(false),
            events: Arc::clone(&self.events),
            held: Arc::clone(&self.held),
            config: Arc::clone(&self.config),
        }))
    }

    fn create_widget(&self, spec: WidgetSpec) -> Result<Arc<dyn Widget>> {
        let kind = spec.kind();
        let mut widget = HeadlessWidget {
            kind,
            text: RwLock::new(String::new()),
            placeholder: None,
            on_tap: None,
            children: Vec::new(),
            events: Arc::clone(&self.events),
        };
        match spec {
            WidgetSpec::Button { text, on_tap } => {
                widget.text = RwLock::new(text);
                widget.on_tap = on_tap;
            }
            WidgetSpec::Label { text } => widget.text = RwLock::new(text),
            WidgetSpec::Entry { placeholder } => widget.placeholder = placeholder,
            WidgetSpec::VBox { children } | WidgetSpec::HBox { children } => {
                widget.children = children;
            }
        }
        Ok(Arc::new(widget))
    }

    fn run(&self) {
        tracing::debug!("headless event loop running");
        while let Some(task) = self.events.next_blocking() {
            run_task(task);
        }
        tracing::debug!("headless event loop stopped");
    }

    fn quit(&self) {
        self.events.quit();
    }
}

struct HeadlessWindow {
    title: RwLock<String>,
    content: RwLock<Option<Arc<dyn Widget>>>,
    visible: AtomicBool,
    events: Arc<EventLoop>,
    held: Arc<Mutex<Vec<HeldDialog>>>,
    config: Arc<HeadlessConfig>,
}

impl WindowHandle for HeadlessWindow {
    fn title(&self) -> String {
        self.title.read().clone()
    }

    fn set_title(&self, title: &str) {
        *self.title.write() = title.to_string();
    }

    fn set_content(&self, content: Arc<dyn Widget>) {
        *self.content.write() = Some(content);
    }

    fn content(&self) -> Option<Arc<dyn Widget>> {
        self.content.read().clone()
    }

    fn show(&self) {
        self.visible.store(true, Ordering::Release);
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    fn show_dialog(&self, dialog: Dialog, on_answer: Option<DialogCallback>) {
        let Some(on_answer) = on_answer else {
            tracing::debug!(kind = ?dialog.kind(), title = dialog.title(), "dialog shown");
            return;
        };
        let accept = match self.config.dialog_policy {
            DialogPolicy::Hold => {
                self.held.lock().push(HeldDialog { dialog, on_answer });
                return;
            }
            DialogPolicy::Confirm => true,
            DialogPolicy::Dismiss => false,
        };
        let answer = self.config.answer(&dialog, accept);
        self.events.post(Box::new(move || on_answer(answer)));
    }
}

struct HeadlessWidget {
    kind: WidgetKind,
    text: RwLock<String>,
    placeholder: Option<String>,
    on_tap: Option<TapCallback>,
    children: Vec<Arc<dyn Widget>>,
    events: Arc<EventLoop>,
}

impl fmt::Debug for HeadlessWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessWidget")
            .field("kind", &self.kind)
            .field("text", &*self.text.read())
            .field("placeholder", &self.placeholder)
            .field("children", &self.children.len())
            .finish()
    }
}

impl Widget for HeadlessWidget {
    fn kind(&self) -> WidgetKind {
        self.kind
    }

    fn as_text(&self) -> Option<&dyn TextHolder> {
        match self.kind {
            WidgetKind::Button | WidgetKind::Label | WidgetKind::Entry => Some(self),
            WidgetKind::VBox | WidgetKind::HBox => None,
        }
    }

    fn as_tappable(&self) -> Option<&dyn Tappable> {
        (self.kind == WidgetKind::Button).then_some(self as &dyn Tappable)
    }

    fn as_typeable(&self) -> Option<&dyn Typeable> {
        (self.kind == WidgetKind::Entry).then_some(self as &dyn Typeable)
    }
}

impl TextHolder for HeadlessWidget {
    fn set_text(&self, text: &str) {
        *self.text.write() = text.to_string();
    }

    fn text(&self) -> String {
        self.text.read().clone()
    }
}

impl Tappable for HeadlessWidget {
    fn tap(&self) {
        if let Some(on_tap) = &self.on_tap {
            let on_tap = Arc::clone(on_tap);
            self.events.post(Box::new(move || on_tap()));
        }
    }
}

impl Typeable for HeadlessWidget {
    fn type_text(&self, text: &str) {
        self.text.write().push_str(text);
    }
}
