//! Content-blocking telemetry.

use storage_access_core::{GrantReason, RejectedReason};
use storage_access_policy::{InnerWindowId, OuterWindowId};

/// Tracing target for telemetry events.
pub const TELEMETRY_TARGET: &str = "storage_access::telemetry";

/// Whether a content-blocking decision blocked or allowed storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockingDecision {
    Block,
    Allow,
}

/// Sink for content-blocking events emitted by the grant coordinator.
pub trait ContentBlockingNotifier: Send + Sync {
    /// A blocking decision was taken for a window.
    fn on_decision(&self, window: InnerWindowId, decision: BlockingDecision, reason: RejectedReason);

    /// Storage access was granted to `tracking_origin` inside `top_window`.
    fn on_event(
        &self,
        top_window: OuterWindowId,
        tracking_origin: &str,
        reason: RejectedReason,
        grant_reason: GrantReason,
    );

    /// Surface the unblocking in the parent window's console.
    fn report_unblocking(
        &self,
        parent_window: InnerWindowId,
        tracking_origin: &str,
        grant_reason: GrantReason,
    );
}

/// Emits every event as a `tracing` event on [`TELEMETRY_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl ContentBlockingNotifier for TracingNotifier {
    fn on_decision(&self, window: InnerWindowId, decision: BlockingDecision, reason: RejectedReason) {
        tracing::info!(
            target: TELEMETRY_TARGET,
            %window,
            ?decision,
            reason = reason.code(),
            "content blocking decision"
        );
    }

    fn on_event(
        &self,
        top_window: OuterWindowId,
        tracking_origin: &str,
        reason: RejectedReason,
        grant_reason: GrantReason,
    ) {
        tracing::info!(
            target: TELEMETRY_TARGET,
            %top_window,
            tracking_origin,
            reason = reason.code(),
            ?grant_reason,
            "storage access granted"
        );
    }

    fn report_unblocking(
        &self,
        parent_window: InnerWindowId,
        tracking_origin: &str,
        grant_reason: GrantReason,
    ) {
        let message = match grant_reason {
            GrantReason::Opener => "opened a popup",
            GrantReason::OpenerAfterUserInteraction => "opened a popup after user interaction",
            GrantReason::StorageAccessApi => "requested storage access",
        };
        tracing::info!(
            target: TELEMETRY_TARGET,
            %parent_window,
            tracking_origin,
            "storage access unblocked because the third party {message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_tracing_notifier_emits_on_telemetry_target() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let notifier = TracingNotifier;
            notifier.on_event(
                OuterWindowId(1),
                "https://tracker.test",
                RejectedReason::Tracker,
                GrantReason::StorageAccessApi,
            );
            notifier.report_unblocking(
                InnerWindowId(2),
                "https://tracker.test",
                GrantReason::Opener,
            );
        });

        let text = capture.text();
        assert!(text.contains(TELEMETRY_TARGET));
        assert!(text.contains("storage access granted"));
        assert!(text.contains("opened a popup"));
        assert!(text.contains("https://tracker.test"));
    }
}
