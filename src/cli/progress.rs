//! Real-Time Progress
//!
//! Folds the generator's broadcast [`RunEvent`]s into a progress state and
//! renders it as a single console line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::wiki::{RunEvent, RunPhase};

/// Progress tracker state
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub phase: RunPhase,
    /// Wiki title once the structure is planned
    pub title: String,
    /// Pages settled (success or failure)
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    /// Page most recently started
    pub current_item: String,
    /// Pages settled per second
    pub throughput: f32,
    pub eta_secs: Option<u64>,
    pub is_running: bool,
    pub from_cache: bool,
    pub elapsed_secs: u64,
    pub error: Option<String>,
}

/// Progress tracker fed from a run's event channel
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<RwLock<ProgressState>>,
    start_time: Arc<RwLock<Option<Instant>>>,
    active: Arc<AtomicBool>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ProgressState::default())),
            start_time: Arc::new(RwLock::new(None)),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> ProgressState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn start(&self) {
        self.active.store(true, Ordering::SeqCst);
        *self
            .start_time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Instant::now());
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_running = true;
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_running = false;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn elapsed_secs(&self) -> f32 {
        self.start_time
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|s| s.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    /// Fold one event into the state
    pub fn apply(&self, event: &RunEvent) {
        let elapsed = self.elapsed_secs();
        let finished = {
            let mut state = self
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.elapsed_secs = elapsed as u64;

            match event {
                RunEvent::Phase(phase) => state.phase = *phase,
                RunEvent::CacheHit { pages } => {
                    state.from_cache = true;
                    state.total = *pages;
                    state.completed = *pages;
                }
                RunEvent::StructureReady { title, pages } => {
                    state.title = title.clone();
                    state.total = *pages;
                    state.completed = 0;
                }
                RunEvent::PageStarted { title, .. } => state.current_item = title.clone(),
                RunEvent::PageChunk { .. } => {}
                RunEvent::PageFinished {
                    ok,
                    completed,
                    total,
                    ..
                } => {
                    state.completed = *completed;
                    state.total = *total;
                    if !ok {
                        state.failed += 1;
                    }
                    state.throughput = *completed as f32 / elapsed.max(0.1);
                    let remaining = total.saturating_sub(*completed);
                    state.eta_secs = (state.throughput > 0.0 && remaining > 0)
                        .then(|| (remaining as f32 / state.throughput) as u64);
                }
                RunEvent::Complete { from_cache, failed } => {
                    state.phase = RunPhase::Complete;
                    state.from_cache = *from_cache;
                    state.failed = *failed;
                    state.eta_secs = None;
                }
                RunEvent::Failed { message } => {
                    state.phase = RunPhase::Error;
                    state.error = Some(message.clone());
                }
            }

            matches!(event, RunEvent::Complete { .. } | RunEvent::Failed { .. })
        };

        if finished {
            self.stop();
        }
    }

    /// Consume events until the run completes or the channel closes
    pub fn follow(&self, mut events: broadcast::Receiver<RunEvent>) -> tokio::task::JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracker.apply(&event);
                        if !tracker.is_active() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Progress renderer skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracker.stop();
        })
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Console progress renderer
pub struct ConsoleRenderer {
    tracker: ProgressTracker,
    show_spinner: bool,
    show_eta: bool,
}

impl ConsoleRenderer {
    pub fn new(tracker: ProgressTracker) -> Self {
        Self {
            tracker,
            show_spinner: true,
            show_eta: true,
        }
    }

    pub fn with_spinner(mut self, show: bool) -> Self {
        self.show_spinner = show;
        self
    }

    pub fn with_eta(mut self, show: bool) -> Self {
        self.show_eta = show;
        self
    }

    /// Render current state to one line
    pub fn render(&self) -> String {
        let state = self.tracker.state();

        if !state.is_running {
            return String::new();
        }

        let spinner = if self.show_spinner {
            let chars = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
            let idx = (state.elapsed_secs as usize) % chars.len();
            format!("{} ", chars[idx])
        } else {
            String::new()
        };

        if state.phase != RunPhase::GeneratingPages {
            return format!("{}{}", spinner, phase_label(state.phase));
        }

        let progress_bar = render_progress_bar(state.completed, state.total, 30);

        let eta = if self.show_eta {
            state
                .eta_secs
                .map(|s| format!(" ETA: {}", format_duration(s)))
                .unwrap_or_default()
        } else {
            String::new()
        };

        let failed = if state.failed > 0 {
            format!(" ({} failed)", state.failed)
        } else {
            String::new()
        };

        format!(
            "{}{} {}/{}{}{}  {}",
            spinner,
            progress_bar,
            state.completed,
            state.total,
            failed,
            eta,
            state.current_item
        )
    }

    /// Redraw every 100ms while the tracker is active
    pub fn start_render_loop(&self) -> tokio::task::JoinHandle<()> {
        let tracker = self.tracker.clone();
        let show_spinner = self.show_spinner;
        let show_eta = self.show_eta;

        tokio::spawn(async move {
            let renderer = ConsoleRenderer {
                tracker: tracker.clone(),
                show_spinner,
                show_eta,
            };

            while tracker.is_active() {
                let output = renderer.render();
                if !output.is_empty() {
                    print!("\r\x1B[K{}", output);
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }

            print!("\r\x1B[K");
        })
    }
}

fn phase_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Idle => "Starting...",
        RunPhase::FetchingRepoMeta => "Fetching repository structure...",
        RunPhase::PlanningStructure => "Planning wiki structure...",
        RunPhase::GeneratingPages => "Generating pages...",
        RunPhase::Complete => "Done",
        RunPhase::Error => "Failed",
    }
}

/// Render a simple progress bar
pub fn render_progress_bar(completed: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return format!("[{}]", " ".repeat(width));
    }

    let progress = (completed as f32 / total as f32).min(1.0);
    let filled = (progress * width as f32) as usize;
    let empty = width.saturating_sub(filled);

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format duration as human-readable string
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
