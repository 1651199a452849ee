//! The dispatch loop: scan, load, render, persist, repeat.
//!
//! A [`Worker`] owns everything one loop needs: the scanner, the handled-ID
//! ledger, the mask registry, and a [`Renderer`]. Nothing is global, so tests
//! build a worker over a temp directory and a mock renderer.
//!
//! ## Iteration
//!
//! ```text
//! Idle ── scanner finds new id ──▶ Processing
//!   ▲                                  │ load JSON
//!   │                                  │ look up mask
//!   │                                  │ render + write PNG
//!   └──────── ledger persisted ◀───────┘
//! ```
//!
//! ## Recording and failures
//!
//! With [`RecordPolicy::OnScan`] the id enters the in-memory ledger the moment
//! the scanner matches it. With [`RecordPolicy::AfterRender`] only successful
//! requests are recorded.
//!
//! With [`ErrorPolicy::FailFast`] the first failure is returned before the
//! ledger is persisted for that iteration. With
//! [`ErrorPolicy::LogAndContinue`] the failure is logged, the ledger is
//! persisted, and the id is skipped for the rest of the run even when it was
//! not recorded.
//!
//! So a failed request is skipped across restarts only for `OnScan` together
//! with `LogAndContinue`. Under `FailFast` the failing id never reaches disk
//! and the next start retries it.

use crate::config::{ErrorPolicy, RecordPolicy, WorkerConfig};
use crate::ledger::{Ledger, LedgerError, ledger_path};
use crate::masks::MaskRegistry;
use crate::naming::{IdentifierPattern, output_file_name};
use crate::render::{RenderError, Renderer, save_png};
use crate::request::{RequestError, load_frequencies};
use crate::scan::{ScanError, ScannedRequest, Scanner};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Ledger failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Everything the loop needs to know, resolved from config and CLI.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub watch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub pattern: IdentifierPattern,
    pub poll_interval: Duration,
    pub masks_enabled: bool,
    pub record: RecordPolicy,
    pub errors: ErrorPolicy,
}

impl WorkerSettings {
    pub fn from_config(config: &WorkerConfig, watch_dir: &Path, output_dir: &Path) -> Self {
        Self {
            watch_dir: watch_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            ledger_file: ledger_path(watch_dir, &config.ledger.file_name),
            pattern: config.requests.identifier_pattern,
            poll_interval: config.requests.poll_interval(),
            masks_enabled: config.masks.enabled,
            record: config.ledger.record,
            errors: config.errors.policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No request in flight.
    Idle,
    /// A request was found and is being loaded, rendered, or recorded.
    Processing,
}

/// Progress reported to whoever is listening (the CLI printer thread).
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Found {
        id: String,
        path: PathBuf,
    },
    Loaded {
        id: String,
        words: usize,
    },
    /// The request named a mask the registry does not have; rendered unmasked.
    MaskMissing {
        id: String,
        mask: String,
    },
    Rendered {
        id: String,
        output: PathBuf,
    },
    Failed {
        id: String,
        error: String,
    },
    LedgerPersisted {
        entries: usize,
    },
}

/// Result of handling one request when the worker keeps going after errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rendered { id: String, output: PathBuf },
    Failed { id: String },
}

pub struct Worker<R: Renderer> {
    settings: WorkerSettings,
    scanner: Scanner,
    ledger: Ledger,
    masks: MaskRegistry,
    renderer: R,
    state: WorkerState,
    /// Ids that failed this run and were not recorded; never rescanned.
    deferred: HashSet<String>,
    events: Option<Sender<WorkerEvent>>,
}

impl<R: Renderer> Worker<R> {
    pub fn new(settings: WorkerSettings, ledger: Ledger, masks: MaskRegistry, renderer: R) -> Self {
        let scanner = Scanner::new(&settings.watch_dir, settings.pattern, settings.poll_interval);
        Self {
            settings,
            scanner,
            ledger,
            masks,
            renderer,
            state: WorkerState::Idle,
            deferred: HashSet::new(),
            events: None,
        }
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: Sender<WorkerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Loop forever. Returns only on a fail-fast error.
    pub fn run(&mut self) -> Result<(), WorkerError> {
        info!(
            watch_dir = %self.settings.watch_dir.display(),
            output_dir = %self.settings.output_dir.display(),
            "worker started"
        );
        loop {
            self.step()?;
        }
    }

    /// One full iteration: block until a new request appears, then handle it.
    pub fn step(&mut self) -> Result<Outcome, WorkerError> {
        let request = {
            let ledger = &self.ledger;
            let deferred = &self.deferred;
            self.scanner
                .wait_for_request(|id| ledger.contains(id) || deferred.contains(id))?
        };
        self.handle(request)
    }

    /// Handle every request currently waiting, then return how many were
    /// handled. Never sleeps.
    pub fn drain(&mut self) -> Result<usize, WorkerError> {
        let mut handled = 0;
        loop {
            let request = {
                let ledger = &self.ledger;
                let deferred = &self.deferred;
                self.scanner
                    .find_request(|id| ledger.contains(id) || deferred.contains(id))?
            };
            let Some(request) = request else {
                return Ok(handled);
            };
            self.handle(request)?;
            handled += 1;
        }
    }

    fn handle(&mut self, request: ScannedRequest) -> Result<Outcome, WorkerError> {
        self.state = WorkerState::Processing;
        self.emit(WorkerEvent::Found {
            id: request.id.clone(),
            path: request.path.clone(),
        });
        if self.settings.record == RecordPolicy::OnScan {
            self.ledger.insert(&request.id);
        }

        let outcome = match self.process(&request) {
            Ok(output) => {
                if self.settings.record == RecordPolicy::AfterRender {
                    self.ledger.insert(&request.id);
                }
                Outcome::Rendered {
                    id: request.id,
                    output,
                }
            }
            Err(e) => match self.settings.errors {
                ErrorPolicy::FailFast => {
                    self.state = WorkerState::Idle;
                    return Err(e);
                }
                ErrorPolicy::LogAndContinue => {
                    error!(id = %request.id, error = %e, "request failed, continuing");
                    self.emit(WorkerEvent::Failed {
                        id: request.id.clone(),
                        error: e.to_string(),
                    });
                    if !self.ledger.contains(&request.id) {
                        self.deferred.insert(request.id.clone());
                    }
                    Outcome::Failed { id: request.id }
                }
            },
        };

        let persisted = self.persist();
        self.state = WorkerState::Idle;
        persisted?;
        Ok(outcome)
    }

    /// Load, render, and write one already-scanned request. Does not touch
    /// the ledger.
    pub fn process(&self, request: &ScannedRequest) -> Result<PathBuf, WorkerError> {
        let table = load_frequencies(&request.path)?;
        debug!(id = %request.id, words = table.len(), "request loaded");
        self.emit(WorkerEvent::Loaded {
            id: request.id.clone(),
            words: table.len(),
        });

        let mask = match (&request.mask, self.settings.masks_enabled) {
            (Some(name), true) => {
                let found = self.masks.get(name);
                if found.is_none() {
                    warn!(id = %request.id, mask = %name, "unknown mask, rendering without one");
                    self.emit(WorkerEvent::MaskMissing {
                        id: request.id.clone(),
                        mask: name.clone(),
                    });
                }
                found
            }
            _ => None,
        };

        let image = self.renderer.render(&table, mask)?;
        let output = self.settings.output_dir.join(output_file_name(&request.id));
        save_png(&image, &output)?;
        info!(id = %request.id, output = %output.display(), "word cloud written");
        self.emit(WorkerEvent::Rendered {
            id: request.id.clone(),
            output: output.clone(),
        });
        Ok(output)
    }

    fn persist(&self) -> Result<(), LedgerError> {
        self.ledger.save(&self.settings.ledger_file)?;
        debug!(entries = self.ledger.len(), "ledger persisted");
        self.emit(WorkerEvent::LedgerPersisted {
            entries: self.ledger.len(),
        });
        Ok(())
    }

    fn emit(&self, event: WorkerEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::Mask;
    use crate::render::backend::tests::MockRenderer;
    use crate::test_helpers::{UUID_A, UUID_B, UUID_C, file_names, silhouette, write_request};
    use tempfile::TempDir;

    struct Dirs {
        _tmp: TempDir,
        watch: PathBuf,
        out: PathBuf,
    }

    fn dirs() -> Dirs {
        let tmp = TempDir::new().unwrap();
        let watch = tmp.path().join("in");
        let out = tmp.path().join("out");
        std::fs::create_dir(&watch).unwrap();
        std::fs::create_dir(&out).unwrap();
        Dirs {
            _tmp: tmp,
            watch,
            out,
        }
    }

    fn settings(d: &Dirs, config: &WorkerConfig) -> WorkerSettings {
        let mut s = WorkerSettings::from_config(config, &d.watch, &d.out);
        s.poll_interval = Duration::from_millis(5);
        s
    }

    fn masks() -> MaskRegistry {
        MaskRegistry::empty().with_mask("shield", Mask::new(silhouette(40, 30)))
    }

    fn worker(d: &Dirs, config: &WorkerConfig, renderer: MockRenderer) -> Worker<MockRenderer> {
        let ledger = Ledger::load(&d.watch.join("ids_handled.txt")).unwrap();
        Worker::new(settings(d, config), ledger, masks(), renderer)
    }

    fn ledger_lines(d: &Dirs) -> Vec<String> {
        std::fs::read_to_string(d.watch.join("ids_handled.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    // =========================================================================
    // Request scenarios
    // =========================================================================

    #[test]
    fn masked_request_renders_and_records() {
        let d = dirs();
        write_request(&d.watch, UUID_A, Some("shield"), r#"{"dragon": 10, "sword": 3}"#);
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new());

        let outcome = w.step().unwrap();
        let expected = d.out.join(format!("{UUID_A}.generated.png"));
        assert_eq!(
            outcome,
            Outcome::Rendered {
                id: UUID_A.to_string(),
                output: expected.clone(),
            }
        );
        assert!(expected.is_file());
        assert_eq!(ledger_lines(&d), vec![UUID_A]);

        let calls = w.renderer().get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].words, vec!["dragon", "sword"]);
        assert_eq!(calls[0].mask, Some((40, 30)));
        assert_eq!(w.state(), WorkerState::Idle);
    }

    #[test]
    fn malformed_id_is_never_processed_under_strict() {
        let d = dirs();
        std::fs::write(d.watch.join("not-a-uuid.generate.json"), "{}").unwrap();
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new());

        assert_eq!(w.drain().unwrap(), 0);
        assert!(w.renderer().get_calls().is_empty());
        assert!(file_names(&d.out).is_empty());
    }

    #[test]
    fn ledgered_id_is_never_picked_up() {
        let d = dirs();
        std::fs::write(d.watch.join("ids_handled.txt"), format!("{UUID_A}\n")).unwrap();
        write_request(&d.watch, UUID_A, None, r#"{"dragon": 1}"#);
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new());

        assert_eq!(w.drain().unwrap(), 0);
        assert!(file_names(&d.out).is_empty());
        assert_eq!(ledger_lines(&d), vec![UUID_A]);
    }

    #[test]
    fn invalid_json_fails_fast_without_output_or_persist() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, "{not json");
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new());

        let err = w.step().unwrap_err();
        assert!(matches!(err, WorkerError::Request(RequestError::Parse(_))));
        assert!(file_names(&d.out).is_empty());
        assert!(w.ledger().contains(UUID_A));
        assert!(!d.watch.join("ids_handled.txt").exists());
        assert_eq!(w.state(), WorkerState::Idle);
    }

    #[test]
    fn fail_fast_restart_retries_the_failed_request() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, r#"{"a": 1}"#);

        let mut crashed = worker(&d, &WorkerConfig::default(), MockRenderer::failing());
        assert!(crashed.step().is_err());
        drop(crashed);

        let mut restarted = worker(&d, &WorkerConfig::default(), MockRenderer::new());
        assert!(!restarted.ledger().contains(UUID_A));
        assert_eq!(restarted.drain().unwrap(), 1);
        assert_eq!(ledger_lines(&d), vec![UUID_A]);
    }

    #[test]
    fn invalid_json_after_render_policy_leaves_id_unrecorded() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, "[1, 2]");
        let mut config = WorkerConfig::default();
        config.ledger.record = RecordPolicy::AfterRender;
        let mut w = worker(&d, &config, MockRenderer::new());

        assert!(w.step().is_err());
        assert!(!w.ledger().contains(UUID_A));
    }

    // =========================================================================
    // Ledger behaviour
    // =========================================================================

    #[test]
    fn rerun_over_handled_directory_is_idempotent() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, r#"{"a": 1}"#);
        write_request(&d.watch, UUID_B, None, r#"{"b": 1}"#);

        let mut first = worker(&d, &WorkerConfig::default(), MockRenderer::new());
        assert_eq!(first.drain().unwrap(), 2);
        let ledger_before = std::fs::read_to_string(d.watch.join("ids_handled.txt")).unwrap();
        let outputs_before = file_names(&d.out);

        let mut second = worker(&d, &WorkerConfig::default(), MockRenderer::new());
        assert_eq!(second.drain().unwrap(), 0);
        assert!(second.renderer().get_calls().is_empty());
        assert_eq!(
            std::fs::read_to_string(d.watch.join("ids_handled.txt")).unwrap(),
            ledger_before
        );
        assert_eq!(file_names(&d.out), outputs_before);
    }

    #[test]
    fn same_id_with_two_masks_is_handled_once() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, r#"{"a": 1}"#);
        write_request(&d.watch, UUID_A, Some("shield"), r#"{"a": 1}"#);
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new());

        assert_eq!(w.drain().unwrap(), 1);
        assert_eq!(ledger_lines(&d), vec![UUID_A]);
    }

    #[test]
    fn ledger_is_persisted_after_each_request() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, r#"{"a": 1}"#);
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new());
        w.step().unwrap();
        assert_eq!(ledger_lines(&d), vec![UUID_A]);

        write_request(&d.watch, UUID_B, None, r#"{"b": 1}"#);
        w.step().unwrap();
        assert_eq!(ledger_lines(&d), vec![UUID_A, UUID_B]);
    }

    // =========================================================================
    // Masks
    // =========================================================================

    #[test]
    fn unknown_mask_renders_unmasked() {
        let d = dirs();
        write_request(&d.watch, UUID_A, Some("kraken"), r#"{"a": 1}"#);
        let (tx, rx) = std::sync::mpsc::channel();
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new()).with_events(tx);

        w.step().unwrap();
        assert_eq!(w.renderer().get_calls()[0].mask, None);
        drop(w);
        let events: Vec<WorkerEvent> = rx.iter().collect();
        assert!(events.contains(&WorkerEvent::MaskMissing {
            id: UUID_A.to_string(),
            mask: "kraken".to_string(),
        }));
    }

    #[test]
    fn disabled_masks_ignore_mask_segment() {
        let d = dirs();
        write_request(&d.watch, UUID_A, Some("shield"), r#"{"a": 1}"#);
        let mut config = WorkerConfig::default();
        config.masks.enabled = false;
        let mut w = worker(&d, &config, MockRenderer::new());

        w.step().unwrap();
        assert_eq!(w.renderer().get_calls()[0].mask, None);
    }

    // =========================================================================
    // Error policy
    // =========================================================================

    #[test]
    fn keep_going_records_failure_on_scan_and_continues() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, "garbage");
        write_request(&d.watch, UUID_B, None, r#"{"b": 1}"#);
        let mut config = WorkerConfig::default();
        config.errors.policy = ErrorPolicy::LogAndContinue;
        let mut w = worker(&d, &config, MockRenderer::new());

        assert_eq!(w.drain().unwrap(), 2);
        let mut lines = ledger_lines(&d);
        lines.sort();
        let mut expected = vec![UUID_A.to_string(), UUID_B.to_string()];
        expected.sort();
        assert_eq!(lines, expected);
        assert_eq!(file_names(&d.out), vec![format!("{UUID_B}.generated.png")]);
    }

    #[test]
    fn keep_going_after_render_defers_failed_id_for_the_run() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, r#"{"a": 1}"#);
        let mut config = WorkerConfig::default();
        config.errors.policy = ErrorPolicy::LogAndContinue;
        config.ledger.record = RecordPolicy::AfterRender;
        let mut w = worker(&d, &config, MockRenderer::failing());

        assert_eq!(w.drain().unwrap(), 1);
        assert_eq!(w.renderer().get_calls().len(), 1);
        assert!(!w.ledger().contains(UUID_A));
        assert!(ledger_lines(&d).is_empty());

        // A fresh worker retries it.
        let mut retry = worker(&d, &config, MockRenderer::new());
        assert_eq!(retry.drain().unwrap(), 1);
        assert_eq!(ledger_lines(&d), vec![UUID_A]);
    }

    #[test]
    fn render_failure_fails_fast() {
        let d = dirs();
        write_request(&d.watch, UUID_C, None, r#"{"a": 1}"#);
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::failing());
        let err = w.step().unwrap_err();
        assert!(matches!(err, WorkerError::Render(RenderError::EmptyTable)));
    }

    #[test]
    fn missing_output_dir_is_render_io_error() {
        let d = dirs();
        write_request(&d.watch, UUID_A, None, r#"{"a": 1}"#);
        std::fs::remove_dir(&d.out).unwrap();
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new());
        assert!(matches!(
            w.step(),
            Err(WorkerError::Render(RenderError::Io(_)))
        ));
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn events_follow_iteration_order() {
        let d = dirs();
        let path = write_request(&d.watch, UUID_A, None, r#"{"a": 1, "b": 2}"#);
        let (tx, rx) = std::sync::mpsc::channel();
        let mut w = worker(&d, &WorkerConfig::default(), MockRenderer::new()).with_events(tx);
        w.step().unwrap();
        drop(w);

        let events: Vec<WorkerEvent> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                WorkerEvent::Found {
                    id: UUID_A.to_string(),
                    path,
                },
                WorkerEvent::Loaded {
                    id: UUID_A.to_string(),
                    words: 2,
                },
                WorkerEvent::Rendered {
                    id: UUID_A.to_string(),
                    output: d.out.join(format!("{UUID_A}.generated.png")),
                },
                WorkerEvent::LedgerPersisted { entries: 1 },
            ]
        );
    }

    #[test]
    fn permissive_id_with_spaces_is_skipped_after_restart() {
        let d = dirs();
        std::fs::write(d.watch.join(" job.generate.json"), r#"{"a": 1}"#).unwrap();
        let mut config = WorkerConfig::default();
        config.requests.identifier_pattern = IdentifierPattern::Permissive;

        let mut first = worker(&d, &config, MockRenderer::new());
        assert_eq!(first.drain().unwrap(), 1);
        assert_eq!(ledger_lines(&d), vec![" job"]);

        let mut restarted = worker(&d, &config, MockRenderer::new());
        assert!(restarted.ledger().contains(" job"));
        assert_eq!(restarted.drain().unwrap(), 0);
        assert!(restarted.renderer().get_calls().is_empty());
    }

    #[test]
    fn permissive_pattern_accepts_any_prefix() {
        let d = dirs();
        std::fs::write(d.watch.join("job-42.generate.json"), r#"{"a": 1}"#).unwrap();
        let mut config = WorkerConfig::default();
        config.requests.identifier_pattern = IdentifierPattern::Permissive;
        let mut w = worker(&d, &config, MockRenderer::new());

        assert_eq!(w.drain().unwrap(), 1);
        assert_eq!(file_names(&d.out), vec!["job-42.generated.png"]);
        assert_eq!(ledger_lines(&d), vec!["job-42"]);
    }
}
