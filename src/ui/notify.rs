use crate::session::{SessionError, SessionObserver, Snapshot};
use notify_rust::{Notification, Timeout};
use tracing::warn;
use uuid::Uuid;

/// Pops a desktop notification whenever a new track starts playing.
pub struct DesktopNotifier {
    timeout_ms: u32,
    announced: Option<Uuid>,
}

impl DesktopNotifier {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            announced: None,
        }
    }

    fn show(&self, summary: &str, body: &str) {
        if let Err(e) = Notification::new()
            .appname("mixtape")
            .summary(summary)
            .body(body)
            .timeout(Timeout::Milliseconds(self.timeout_ms))
            .show()
        {
            warn!(error = %e, "desktop notification failed");
        }
    }
}

impl SessionObserver for DesktopNotifier {
    fn on_state_changed(&mut self, snapshot: &Snapshot) {
        if !snapshot.is_playing() || snapshot.loaded_track_id == self.announced {
            return;
        }
        self.announced = snapshot.loaded_track_id;
        if let Some(title) = snapshot.title.as_deref() {
            self.show("Now playing", title);
        }
    }

    fn on_error(&mut self, error: &SessionError) {
        if let SessionError::LoadFailed { title, .. } = error {
            self.show("Could not play", title);
        }
    }
}
