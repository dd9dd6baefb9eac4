// Console front end - what the `play` subcommand shows and reads
// Line-based on purpose: the session does the work, this only prints and parses

pub mod input; // stdin line commands -> session commands
#[cfg(feature = "notify")]
pub mod notify; // desktop "now playing" popups

pub use input::{parse_input, Input, HELP};
#[cfg(feature = "notify")]
pub use notify::DesktopNotifier;

use crate::session::{Readiness, SessionError, SessionObserver, Snapshot, Transport};
use std::io::Write;

/// `mm:ss`, minutes are not wrapped into hours.
pub fn format_millis(ms: i64) -> String {
    if ms <= 0 {
        return "00:00".to_string();
    }
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

pub fn status_line(snapshot: &Snapshot) -> String {
    let Some(title) = snapshot.title.as_deref() else {
        return "[idle] nothing loaded".to_string();
    };

    let state = match (snapshot.readiness, snapshot.transport) {
        (Readiness::NotLoaded, _) => "not loaded",
        (Readiness::Loading, _) => "loading",
        (Readiness::Ready, Transport::Playing) => "playing",
        (Readiness::Ready, Transport::Paused) => "paused",
        (Readiness::Ready, Transport::Stopped) => "stopped",
    };

    let mut line = format!("[{state}] {title}");
    if snapshot.readiness == Readiness::Ready {
        line.push_str(&format!(
            "  {} / {}",
            format_millis(snapshot.position_ms as i64),
            format_millis(snapshot.duration_ms as i64)
        ));
    }
    if snapshot.repeat_one {
        line.push_str("  (repeat one)");
    }
    line
}

/// Prints every transition to stdout and errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl SessionObserver for ConsoleReporter {
    fn on_state_changed(&mut self, snapshot: &Snapshot) {
        let mut stdout = std::io::stdout().lock();
        // stdout may already be closed on shutdown
        let _ = writeln!(stdout, "{}", status_line(snapshot));
    }

    fn on_error(&mut self, error: &SessionError) {
        eprintln!("error: {error}");
    }
}
