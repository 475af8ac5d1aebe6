//! OS tagging and notification boundary.
//!
//! Processing never fails because of this layer: every implementation
//! degrades to console output or silently does nothing.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::filetype::TagColor;

/// Sound played with success notifications, where supported.
pub const SUCCESS_SOUND: &str = "Glass";
/// Sound played with failure notifications, where supported.
pub const FAILURE_SOUND: &str = "Basso";

/// A destination for file tags and user notifications.
pub trait Desktop: Send + Sync {
    /// Attach a visual tag to a file.
    fn tag(&self, label: &str, color: TagColor, path: &Path);

    /// Raise a user notification.
    fn notify(&self, message: &str, title: &str, sound: Option<&str>);
}

// ── ConsoleDesktop ──────────────────────────────────────────────────────

/// Prints tags and notifications to the terminal.
pub struct ConsoleDesktop;

impl Desktop for ConsoleDesktop {
    fn tag(&self, label: &str, color: TagColor, path: &Path) {
        println!("[tag:{color}] {label} {}", path.display());
    }

    fn notify(&self, message: &str, title: &str, _sound: Option<&str>) {
        println!("[{title}] {message}");
    }
}

/// Discards everything.
pub struct NullDesktop;

impl Desktop for NullDesktop {
    fn tag(&self, _label: &str, _color: TagColor, _path: &Path) {}

    fn notify(&self, _message: &str, _title: &str, _sound: Option<&str>) {}
}

// ── MacDesktop ──────────────────────────────────────────────────────────

/// Finder user tags via `xattr`, labels and Notification Center via
/// `osascript`.
pub struct MacDesktop;

/// Extended attribute Finder reads user tags from.
const USER_TAGS_XATTR: &str = "com.apple.metadata:_kMDItemUserTags";

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Property list holding one user tag: `"<label>\n<colour number>"`.
fn user_tags_plist(label: &str, color: TagColor) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#,
            r#"<plist version="1.0"><array><string>{}"#,
            "\n",
            r#"{}</string></array></plist>"#
        ),
        xml_escape(label),
        color.user_tag_index()
    )
}

fn user_tag_command(label: &str, color: TagColor, path: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new("xattr");
    cmd.arg("-w")
        .arg(USER_TAGS_XATTR)
        .arg(user_tags_plist(label, color))
        .arg(path);
    cmd
}

fn run_command(mut cmd: std::process::Command) -> Result<(), String> {
    let output = cmd.output().map_err(|e| e.to_string())?;
    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn run_osascript(script: &str) -> Result<(), String> {
    let mut cmd = std::process::Command::new("osascript");
    cmd.arg("-e").arg(script);
    run_command(cmd)
}

impl Desktop for MacDesktop {
    fn tag(&self, label: &str, color: TagColor, path: &Path) {
        let Err(e) = run_command(user_tag_command(label, color, path)) else {
            return;
        };
        tracing::debug!(error = %e, "xattr tagging failed, trying Finder label");
        let script = format!(
            "tell application \"Finder\" to set label index of (POSIX file {} as alias) to {}",
            applescript_quote(&path.to_string_lossy()),
            color.finder_label_index()
        );
        if let Err(e) = run_osascript(&script) {
            tracing::warn!(error = %e, "Finder tagging unavailable");
            ConsoleDesktop.tag(label, color, path);
        }
    }

    fn notify(&self, message: &str, title: &str, sound: Option<&str>) {
        let mut script = format!(
            "display notification {} with title {}",
            applescript_quote(message),
            applescript_quote(title)
        );
        if let Some(sound) = sound {
            script.push_str(&format!(" sound name {}", applescript_quote(sound)));
        }
        if let Err(e) = run_osascript(&script) {
            tracing::warn!(error = %e, "notifications unavailable");
            ConsoleDesktop.notify(message, title, sound);
        }
    }
}

/// The best desktop integration for this platform.
pub fn platform_desktop() -> Box<dyn Desktop> {
    if cfg!(target_os = "macos") {
        Box::new(MacDesktop)
    } else {
        Box::new(ConsoleDesktop)
    }
}

// ── RecordingDesktop ────────────────────────────────────────────────────

/// Something the pipeline asked the desktop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopEvent {
    Tag {
        label: String,
        color: TagColor,
        path: PathBuf,
    },
    Notify {
        message: String,
        title: String,
        sound: Option<String>,
    },
}

/// Collects desktop events in memory for testing.
pub struct RecordingDesktop {
    events: Mutex<Vec<DesktopEvent>>,
}

impl RecordingDesktop {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<DesktopEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Collected tags only.
    pub fn tags(&self) -> Vec<DesktopEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, DesktopEvent::Tag { .. }))
            .collect()
    }

    fn push(&self, event: DesktopEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

impl Default for RecordingDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl Desktop for RecordingDesktop {
    fn tag(&self, label: &str, color: TagColor, path: &Path) {
        self.push(DesktopEvent::Tag {
            label: label.to_string(),
            color,
            path: path.to_path_buf(),
        });
    }

    fn notify(&self, message: &str, title: &str, sound: Option<&str>) {
        self.push(DesktopEvent::Notify {
            message: message.to_string(),
            title: title.to_string(),
            sound: sound.map(str::to_string),
        });
    }
}
