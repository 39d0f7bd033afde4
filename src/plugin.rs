//! Editor-side helper injection.
//!
//! Registers a normal-mode mapping that sends `toggle-preview` back to this
//! client, plus two functions that forward font changes as
//! `font-settings-change-size` / `font-settings-change-font` notifications.
//! Each script is written to a temporary file, sourced by the editor and
//! removed again.

use std::io::{self, Write};

use thiserror::Error;

use crate::dispatcher::methods;
use crate::session::{Session, SessionError};

pub const TOGGLE_PREVIEW_FN: &str = "NvimBridgeTogglePreview";
pub const FONT_SIZE_FN: &str = "NvimBridgeFontSize";
pub const FONT_FN: &str = "NvimBridgeFont";

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("could not write helper script: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Write `code` to a temporary file and `:source` it.
///
/// # Errors
/// Returns [`PluginError`] if the file cannot be written or the editor
/// rejects the `source` command.
pub fn source(session: &dyn Session, code: &str) -> Result<(), PluginError> {
    let mut file = tempfile::Builder::new()
        .prefix("nvim-bridge-")
        .suffix(".vim")
        .tempfile()?;
    file.write_all(code.as_bytes())?;
    file.flush()?;

    let command = format!("source {}", escape_path(&file.path().to_string_lossy()));
    log::debug!("plugin: {command}");
    session.command(&command)?;

    file.close()?;
    Ok(())
}

/// Vimscript defining the preview toggle function for `channel`.
pub fn preview_toggle_script(channel: u64) -> String {
    format!(
        "function! {TOGGLE_PREVIEW_FN}()\n    call rpcnotify({channel}, \"{method}\", 1)\nendfunction\n",
        method = methods::TOGGLE_PREVIEW
    )
}

/// Vimscript defining the font forwarding functions for `channel`.
pub fn font_settings_script(channel: u64) -> String {
    format!(
        "function! {FONT_SIZE_FN}(size)\n    call rpcnotify({channel}, \"{size}\", a:size)\nendfunction\n\
         function! {FONT_FN}(name)\n    call rpcnotify({channel}, \"{font}\", a:name)\nendfunction\n",
        size = methods::FONT_SIZE,
        font = methods::FONT
    )
}

/// Define the preview toggle function and bind it to `mapping`.
///
/// # Errors
/// Returns [`PluginError`] if sourcing or the mapping command fails.
pub fn apply_preview_toggle_func(session: &dyn Session, mapping: &str) -> Result<(), PluginError> {
    source(session, &preview_toggle_script(session.channel_id()))?;
    session.command(&format!(
        "nnoremap {mapping} :call {TOGGLE_PREVIEW_FN}()<CR>"
    ))?;
    Ok(())
}

/// Define the font forwarding functions.
///
/// # Errors
/// Returns [`PluginError`] if sourcing fails.
pub fn apply_font_settings_func(session: &dyn Session) -> Result<(), PluginError> {
    source(session, &font_settings_script(session.channel_id()))
}

/// Install every helper the dispatcher has a route for.
///
/// # Errors
/// Returns the first [`PluginError`] encountered.
pub fn install_helpers(session: &dyn Session, mapping: &str) -> Result<(), PluginError> {
    apply_font_settings_func(session)?;
    apply_preview_toggle_func(session, mapping)?;
    log::info!(
        "plugin: helpers installed on channel {}",
        session.channel_id()
    );
    Ok(())
}

fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, ' ' | '%' | '#' | '|' | '"') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
