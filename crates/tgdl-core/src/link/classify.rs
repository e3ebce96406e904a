//! Classify client failure text into the task error taxonomy.
//!
//! Remote clients often only give a message. Link trouble is recognized by
//! its wording so the supervisor can reconnect.

use crate::error::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Disconnect, reset, proxy failure: the link needs a reconnect.
    Transient,
    Cancelled,
    Timeout,
    NotFound,
    Other,
}

const TRANSIENT_MARKERS: &[&str] = &[
    "disconnect",
    "connection reset",
    "connection refused",
    "connection aborted",
    "connection closed",
    "connection lost",
    "broken pipe",
    "proxy",
    "network is unreachable",
    "server closed",
];

/// Classify a failure message.
pub fn classify_message(msg: &str) -> FailureKind {
    let lower = msg.to_lowercase();
    if lower.contains("cancel") {
        return FailureKind::Cancelled;
    }
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return FailureKind::Transient;
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return FailureKind::Timeout;
    }
    if lower.contains("not found") || lower.contains("no such") {
        return FailureKind::NotFound;
    }
    FailureKind::Other
}

/// Turns an unclassified `Remote` failure into a more precise variant based
/// on its text. Other variants pass through unchanged.
pub fn refine(err: TaskError) -> TaskError {
    let TaskError::Remote(msg) = err else {
        return err;
    };
    match classify_message(&msg) {
        FailureKind::Transient => TaskError::Link(msg),
        FailureKind::Cancelled => TaskError::Cancelled,
        FailureKind::NotFound => TaskError::NotFound(msg),
        // Keep the client's own wording; the budget behind it is unknown.
        FailureKind::Timeout | FailureKind::Other => TaskError::Remote(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_failures_are_transient() {
        assert_eq!(classify_message("Server disconnected"), FailureKind::Transient);
        assert_eq!(
            classify_message("Connection reset by peer"),
            FailureKind::Transient
        );
        assert_eq!(
            classify_message("SOCKS proxy handshake failed"),
            FailureKind::Transient
        );
    }

    #[test]
    fn cancel_marker_wins() {
        assert_eq!(
            classify_message("download cancelled after disconnect"),
            FailureKind::Cancelled
        );
    }

    #[test]
    fn other_messages() {
        assert_eq!(classify_message("Read timed out"), FailureKind::Timeout);
        assert_eq!(classify_message("message not found"), FailureKind::NotFound);
        assert_eq!(classify_message("FLOOD_WAIT_30"), FailureKind::Other);
    }

    #[test]
    fn refine_only_touches_remote() {
        assert!(matches!(
            refine(TaskError::Remote("connection lost".into())),
            TaskError::Link(_)
        ));
        assert!(refine(TaskError::Remote("user cancelled".into())).is_cancelled());
        assert!(matches!(
            refine(TaskError::NotFound("x".into())),
            TaskError::NotFound(_)
        ));
        let kept = refine(TaskError::Remote("FILE_REFERENCE_EXPIRED".into()));
        assert_eq!(kept.to_string(), "FILE_REFERENCE_EXPIRED");
    }
}
