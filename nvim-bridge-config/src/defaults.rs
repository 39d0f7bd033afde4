//! Default values for [`crate::BridgeConfig`] fields.

pub fn bool_false() -> bool {
    false
}

pub fn bool_true() -> bool {
    true
}

/// How long teardown waits for the dispatcher thread to finish.
pub fn join_timeout_ms() -> u64 {
    2000
}

/// Normal-mode mapping that toggles the preview pane from inside the editor.
pub fn preview_toggle_mapping() -> String {
    "<leader>Q".to_string()
}
