use std::{
    sync::{mpsc::Receiver, LazyLock},
    thread::JoinHandle,
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use npmirror_events::SyncEvent;

use crate::utils::progress_enabled;

/// Shared spinner. Hidden until a run starts.
static SPINNER: LazyLock<ProgressBar> = LazyLock::new(ProgressBar::hidden);

/// Pause the spinner, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    SPINNER.suspend(f);
}

/// Owns the background thread that turns events into spinner updates.
///
/// The pipeline holding the channel sender must be dropped before
/// [`finish`](ProgressGuard::finish), or the thread never sees the end of
/// the stream.
pub struct ProgressGuard {
    handle: Option<JoinHandle<()>>,
}

impl ProgressGuard {
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
        SPINNER.finish_and_clear();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Counters shown next to the spinner.
#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    packuments: usize,
    declared: usize,
    skipped: usize,
}

impl Tally {
    fn apply(&mut self, event: &SyncEvent) -> Option<String> {
        match event {
            SyncEvent::RootFetched { .. } | SyncEvent::DependencyFetched { .. } => {
                self.packuments += 1;
            }
            SyncEvent::Declared { .. } => self.declared += 1,
            SyncEvent::DependencySkipped { .. } | SyncEvent::ProbeRejected { .. } => {
                self.skipped += 1;
            }
            SyncEvent::Completed { .. } => return None,
        }
        Some(format!(
            "{} packuments, {} declared, {} skipped",
            self.packuments, self.declared, self.skipped
        ))
    }
}

pub fn spawn_event_handler(receiver: Receiver<SyncEvent>) -> ProgressGuard {
    if progress_enabled() {
        SPINNER.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        SPINNER.set_style(spinner_style());
        SPINNER.enable_steady_tick(Duration::from_millis(100));
    }

    let handle = std::thread::spawn(move || {
        let mut tally = Tally::default();

        while let Ok(event) = receiver.recv() {
            if let Some(message) = tally.apply(&event) {
                SPINNER.set_message(message);
            }
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally() {
        let mut tally = Tally::default();
        tally.apply(&SyncEvent::RootFetched {
            url: "https://reg/a".to_string(),
            versions: 2,
        });
        tally.apply(&SyncEvent::Declared {
            name: "a".to_string(),
            version: "1.0.0".to_string(),
            relative_path: "a/-/a-1.0.0.tgz".to_string(),
            deferred: false,
        });
        let message = tally.apply(&SyncEvent::DependencySkipped {
            name: "b".to_string(),
            reason: "HTTP 500".to_string(),
        });

        assert_eq!(
            message.as_deref(),
            Some("1 packuments, 1 declared, 1 skipped")
        );
        assert!(tally
            .apply(&SyncEvent::Completed {
                declared: 1,
                skipped_dependencies: 1
            })
            .is_none());
    }
}
