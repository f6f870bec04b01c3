//! Built-in verbs.

mod dialog;
mod inspect;
mod widget;
mod window;

use std::sync::Arc;

use crate::dispatcher::HandlerTable;
use crate::error::HandlerError;
use crate::lifecycle::Bridge;
use crate::toolkit::{Widget, WindowHandle};

pub(crate) fn register_builtin(table: &mut HandlerTable) {
    table.register("createWindow", window::create_window);
    table.register("setContent", window::set_content);
    table.register("showWindow", window::show_window);
    table.register("setWindowTitle", window::set_window_title);
    table.register("quit", window::quit);

    table.register("createButton", widget::create_button);
    table.register("createLabel", widget::create_label);
    table.register("createEntry", widget::create_entry);
    table.register("createVBox", widget::create_vbox);
    table.register("createHBox", widget::create_hbox);
    table.register("setText", widget::set_text);
    table.register("getText", widget::get_text);
    table.register("typeText", widget::type_text);

    table.register("showInfo", dialog::show_info);
    table.register("showError", dialog::show_error);
    table.register("showConfirm", dialog::show_confirm);
    table.register("showFileOpen", dialog::show_file_open);
    table.register("showFileSave", dialog::show_file_save);
    table.register("showFolderOpen", dialog::show_folder_open);
    table.register("showForm", dialog::show_form);

    table.register("registerCustomId", inspect::register_custom_id);
    table.register("getParent", inspect::get_parent);
    table.register("findWidget", inspect::find_widget);
    table.register("getWidgetInfo", inspect::get_widget_info);
    table.register("getAllWidgets", inspect::get_all_widgets);
    table.register("clickWidget", inspect::click_widget);
}

fn lookup_window(bridge: &Bridge, id: &str) -> Result<Arc<dyn WindowHandle>, HandlerError> {
    bridge
        .registry()
        .windows
        .get(id)
        .ok_or(HandlerError::NotFound("Window"))
}

fn lookup_widget(bridge: &Bridge, id: &str) -> Result<Arc<dyn Widget>, HandlerError> {
    bridge
        .registry()
        .widgets
        .get(id)
        .ok_or(HandlerError::NotFound("Widget"))
}
