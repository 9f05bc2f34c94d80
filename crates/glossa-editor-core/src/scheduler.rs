//! Debounced analysis passes.
//!
//! [`AnalysisScheduler`] is the state machine. It never sleeps or calls out;
//! it is told about edits and elapsed deadlines and answers with what to do.
//! [`AnalysisDriver`] owns the waiting: it races edit events, the debounce
//! deadline and the in-flight analyzer call on a single task.
//!
//! At most one pass is in flight or applying at any time. A deadline that
//! fires during a pass is dropped, not queued; the next edit arms a new one.

use std::future::{Future, pending};
use std::pin::Pin;

use glossa_common::{Analyzer, AnalyzerError, RecognizedTerm, parse_terms};
use n0_future::FutureExt;
use n0_future::time::{Duration, Instant, sleep};
use tokio::sync::mpsc;

use crate::annotate::rewrite;
use crate::surface::{EditorSurface, PlatformError};

/// Default quiet period after the last edit before analysis runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisPhase {
    /// Nothing scheduled.
    #[default]
    Idle,
    /// Debounce deadline armed.
    Pending,
    /// Waiting on the analyzer.
    InFlight,
    /// Rewriting the surface with the returned terms.
    Applying,
}

/// A pass the caller should start: analyze `text`, report back with `pass`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub pass: u64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisScheduler {
    phase: AnalysisPhase,
    debounce: Duration,
    deadline: Option<Instant>,
    latest_text: String,
    next_pass: u64,
    current_pass: Option<u64>,
}

impl Default for AnalysisScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl AnalysisScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            phase: AnalysisPhase::Idle,
            debounce,
            deadline: None,
            latest_text: String::new(),
            next_pass: 0,
            current_pass: None,
        }
    }

    pub fn phase(&self) -> AnalysisPhase {
        self.phase
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Text the next pass will analyze.
    pub fn latest_text(&self) -> &str {
        &self.latest_text
    }

    /// Record an edit and push the deadline out. Returns the new deadline.
    ///
    /// Accepted in every phase. During a pass this only updates the text and
    /// the deadline; it never starts anything.
    pub fn content_changed(&mut self, text: impl Into<String>, now: Instant) -> Instant {
        let deadline = now + self.debounce;
        self.latest_text = text.into();
        self.deadline = Some(deadline);
        if self.phase == AnalysisPhase::Idle {
            self.phase = AnalysisPhase::Pending;
        }
        tracing::trace!(target: "glossa::scheduler", phase = ?self.phase, "content changed");
        deadline
    }

    /// The debounce timer woke at `now`.
    ///
    /// Returns a request if a pass should start. Early wakes are ignored and
    /// keep the deadline; every other outcome disarms it.
    pub fn deadline_elapsed(&mut self, now: Instant) -> Option<AnalysisRequest> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;

        match self.phase {
            AnalysisPhase::InFlight | AnalysisPhase::Applying => {
                tracing::debug!(
                    target: "glossa::scheduler",
                    phase = ?self.phase,
                    "pass already running, dropping trigger"
                );
                None
            }
            AnalysisPhase::Idle | AnalysisPhase::Pending => {
                if self.latest_text.trim().is_empty() {
                    tracing::trace!(target: "glossa::scheduler", "blank text, nothing to analyze");
                    self.phase = AnalysisPhase::Idle;
                    return None;
                }
                let pass = self.next_pass;
                self.next_pass += 1;
                self.current_pass = Some(pass);
                self.phase = AnalysisPhase::InFlight;
                tracing::debug!(
                    target: "glossa::scheduler",
                    pass,
                    chars = self.latest_text.chars().count(),
                    "starting analysis pass"
                );
                Some(AnalysisRequest {
                    pass,
                    text: self.latest_text.clone(),
                })
            }
        }
    }

    /// Move the current pass from InFlight to Applying.
    ///
    /// Returns false (and changes nothing) if `pass` is not the pass in flight.
    pub fn begin_apply(&mut self, pass: u64) -> bool {
        if self.phase != AnalysisPhase::InFlight || self.current_pass != Some(pass) {
            tracing::warn!(
                target: "glossa::scheduler",
                pass,
                current = ?self.current_pass,
                phase = ?self.phase,
                "ignoring result for a pass that is not in flight"
            );
            return false;
        }
        self.phase = AnalysisPhase::Applying;
        true
    }

    /// The current pass is over, whether it applied, failed or found nothing.
    pub fn finish_pass(&mut self) {
        self.current_pass = None;
        self.phase = if self.deadline.is_some() {
            AnalysisPhase::Pending
        } else {
            AnalysisPhase::Idle
        };
        tracing::trace!(target: "glossa::scheduler", phase = ?self.phase, "pass finished");
    }
}

/// Annotate the surface with `terms`, keeping the cursor where it was.
///
/// Returns whether the markup changed. Unchanged markup is never written back.
pub fn apply_pass<S: EditorSurface>(
    surface: &mut S,
    terms: &[RecognizedTerm],
) -> Result<bool, PlatformError> {
    let cursor = surface.capture_cursor();
    let before = surface.markup();
    let after = rewrite(&before, terms);
    if after == before {
        return Ok(false);
    }

    surface.set_markup(&after)?;
    if let Some(cursor) = cursor {
        surface.restore_cursor(cursor)?;
    }
    tracing::debug!(
        target: "glossa::scheduler",
        terms = terms.len(),
        cursor = ?cursor,
        "applied annotations"
    );
    Ok(true)
}

type AnalysisFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AnalyzerError>> + 'a>>;

enum Wake {
    Edit(Option<String>),
    Deadline,
    Analyzed(u64, Result<String, AnalyzerError>),
}

/// Sends edits to a running [`AnalysisDriver`].
#[derive(Debug, Clone)]
pub struct AnalysisHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl AnalysisHandle {
    /// Report new plain text. Returns false if the driver has stopped.
    pub fn content_changed(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }
}

/// Runs the scheduler against an analyzer and a surface.
pub struct AnalysisDriver<A, S> {
    scheduler: AnalysisScheduler,
    analyzer: A,
    surface: S,
    edits: mpsc::UnboundedReceiver<String>,
}

impl<A, S> AnalysisDriver<A, S>
where
    A: Analyzer,
    S: EditorSurface,
{
    pub fn new(analyzer: A, surface: S, debounce: Duration) -> (Self, AnalysisHandle) {
        let (tx, edits) = mpsc::unbounded_channel();
        let driver = Self {
            scheduler: AnalysisScheduler::new(debounce),
            analyzer,
            surface,
            edits,
        };
        (driver, AnalysisHandle { tx })
    }

    /// Drive passes until every [`AnalysisHandle`] is dropped.
    ///
    /// Returns the scheduler in its final state.
    pub async fn run(self) -> AnalysisScheduler {
        let Self {
            mut scheduler,
            analyzer,
            mut surface,
            mut edits,
        } = self;
        let mut in_flight: Option<(u64, AnalysisFuture<'_>)> = None;

        loop {
            let wake = {
                let edit = async { Wake::Edit(edits.recv().await) };
                let deadline = scheduler.deadline();
                let timer = async move {
                    match deadline {
                        Some(at) => {
                            sleep(at.saturating_duration_since(Instant::now())).await;
                            Wake::Deadline
                        }
                        None => pending().await,
                    }
                };
                let analysis = async {
                    match in_flight.as_mut() {
                        Some((pass, fut)) => Wake::Analyzed(*pass, fut.await),
                        None => pending().await,
                    }
                };
                edit.race(timer).race(analysis).await
            };

            match wake {
                Wake::Edit(Some(text)) => {
                    scheduler.content_changed(text, Instant::now());
                }
                Wake::Edit(None) => {
                    tracing::debug!(target: "glossa::scheduler", "edit channel closed, stopping");
                    break;
                }
                Wake::Deadline => {
                    if let Some(request) = scheduler.deadline_elapsed(Instant::now()) {
                        let fut: AnalysisFuture<'_> = Box::pin(analyzer.analyze(request.text));
                        in_flight = Some((request.pass, fut));
                    }
                }
                Wake::Analyzed(pass, result) => {
                    in_flight = None;
                    match result {
                        Ok(payload) => {
                            let terms = parse_terms(&payload);
                            if scheduler.begin_apply(pass) {
                                if let Err(e) = apply_pass(&mut surface, &terms) {
                                    tracing::warn!(
                                        target: "glossa::scheduler",
                                        pass,
                                        error = %e,
                                        "failed to write annotations"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                target: "glossa::scheduler",
                                pass,
                                error = %e,
                                "analysis failed, skipping pass"
                            );
                        }
                    }
                    scheduler.finish_pass();
                }
            }
        }

        scheduler
    }
}
