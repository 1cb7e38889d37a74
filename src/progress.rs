use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Stage spinner on stderr for the CLI. Disabled instances only keep counters.
pub struct Progress {
    enabled: bool,
    start: Instant,
    stage: ProgressBar,
    documents: AtomicU64,
    matches: AtomicU64,
}

impl Progress {
    pub fn new(enabled: bool) -> Arc<Self> {
        let start = Instant::now();

        let stage = if enabled {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}  [{elapsed_precise}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar.set_message("starting");
            bar
        } else {
            ProgressBar::hidden()
        };

        Arc::new(Self {
            enabled,
            start,
            stage,
            documents: AtomicU64::new(0),
            matches: AtomicU64::new(0),
        })
    }

    pub fn set_stage(&self, msg: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.stage.set_message(msg.into());
    }

    pub fn documents_loaded(&self, count: usize) {
        self.documents.store(count as u64, Ordering::Relaxed);
        self.set_stage(format!("indexed {count} documents"));
    }

    pub fn matched(&self, count: usize) {
        self.matches.store(count as u64, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        let documents = self.documents.load(Ordering::Relaxed);
        let matches = self.matches.load(Ordering::Relaxed);
        self.stage.println(format!(
            "{matches} of {documents} documents matched in {}",
            HumanDuration(self.start.elapsed())
        ));
        self.stage.finish_and_clear();
    }
}
