//! Plain-text rendering of workflow snapshots.

use client_core::{Phase, WorkflowState};
use shared::error::Notification;

const FORTUNE_PLACEHOLDER: &str = "Your Fortune Awaits...";
const RETRY_HINT: &str = "hint: submit again or reset to start over";

pub fn render_state(state: &WorkflowState) -> String {
    let mut lines = vec![format!("phase: {}", state.phase)];

    if !state.handle.is_empty() {
        lines.push(format!("handle: {}", state.handle));
    }

    match (&state.fortune_text, state.phase) {
        (Some(text), _) => lines.push(format!("fortune: {text}")),
        (None, Phase::GeneratingFortune) => lines.push(format!("fortune: {FORTUNE_PLACEHOLDER}")),
        (None, _) => {}
    }

    if let Some(url) = &state.hosted_image_url {
        lines.push(format!("card: {url}"));
    }
    if state.downloading {
        lines.push("download: in progress".to_string());
    }
    if let Some(kind) = state.last_error {
        lines.push(format!("error: {}", kind.user_message()));
        if kind.is_pipeline_failure() {
            lines.push(RETRY_HINT.to_string());
        }
    }

    lines.join("\n")
}

pub fn render_notification(notification: &Notification) -> String {
    format!(
        "! {} ({}s)",
        notification.message,
        notification.duration.as_secs()
    )
}
