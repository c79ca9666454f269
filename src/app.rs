//! Diagnostic session: the boundary observers talk to
//!
//! Holds the latest report snapshot in a `watch` channel and delivers
//! one-shot notifications on a separate queue. Each run is tagged with a
//! generation number; a snapshot is only written while its generation is
//! still the current one, so a superseded run can never overwrite newer
//! state.

use crate::{
    diagnostics::DiagnosticOrchestrator,
    models::Report,
    output::{OutputFormatter, PlainFormatter},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// One-shot messages for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ShowError(String),
    ShareText(String),
}

pub struct DiagnosticSession {
    orchestrator: Arc<DiagnosticOrchestrator>,
    state: Arc<watch::Sender<Report>>,
    generation: Arc<AtomicU64>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    notify_rx: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
    /// Generation and task of the live run
    current: Mutex<Option<(u64, JoinHandle<()>)>>,
    domain: Mutex<String>,
}

impl DiagnosticSession {
    pub fn new(orchestrator: Arc<DiagnosticOrchestrator>) -> Self {
        Self::with_domain(orchestrator, crate::defaults::DEFAULT_DOMAIN)
    }

    /// Session whose domain field starts out as `domain`
    pub fn with_domain<S: Into<String>>(orchestrator: Arc<DiagnosticOrchestrator>, domain: S) -> Self {
        let domain = domain.into();
        let (state, _) = watch::channel(Report::idle(domain.clone()));
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            notify_tx,
            notify_rx: Mutex::new(Some(notify_rx)),
            current: Mutex::new(None),
            domain: Mutex::new(domain),
        }
    }

    /// Receiver of report snapshots; starts at the current one
    pub fn subscribe(&self) -> watch::Receiver<Report> {
        self.state.subscribe()
    }

    /// The notification queue; only the first caller gets it
    pub fn notifications(&self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.notify_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    pub fn snapshot(&self) -> Report {
        self.state.borrow().clone()
    }

    /// Domain currently entered
    pub fn domain(&self) -> String {
        self.domain
            .lock()
            .map(|domain| domain.clone())
            .unwrap_or_default()
    }

    /// Edit the entered domain without starting a run
    pub fn update_domain<S: Into<String>>(&self, text: S) {
        if let Ok(mut domain) = self.domain.lock() {
            *domain = text.into();
        }
    }

    /// Start a run for `domain`, superseding any run in flight
    ///
    /// Returns the run's generation, or `None` when the domain is blank.
    /// Must be called from within a tokio runtime.
    pub fn run_diagnostic(&self, domain: &str) -> Option<u64> {
        let domain = domain.trim().to_string();
        if domain.is_empty() {
            self.notify(Notification::ShowError("Please enter a domain".to_string()));
            return None;
        }
        self.update_domain(domain.clone());

        // Held until the new handle is stored so concurrent starts serialize
        let mut live = self.lock_current();
        let generation = self.supersede(&mut live);
        self.state.send_replace(Report::loading(domain.clone()));

        let orchestrator = self.orchestrator.clone();
        let state = self.state.clone();
        let current = self.generation.clone();
        let handle = tokio::spawn(async move {
            orchestrator
                .run(&domain, generation, move |report| {
                    publish_if_current(&state, &current, generation, report)
                })
                .await;
        });

        *live = Some((generation, handle));
        Some(generation)
    }

    /// Back to IDLE, keeping the entered domain
    pub fn clear_results(&self) {
        let mut live = self.lock_current();
        self.supersede(&mut live);
        self.state.send_replace(Report::idle(self.domain()));
    }

    /// Emit the plain-text digest of the current report
    pub fn share_report(&self) {
        let report = self.snapshot();
        match PlainFormatter::new().format_report(&report) {
            Ok(text) => self.notify(Notification::ShareText(text)),
            Err(e) => self.notify(Notification::ShowError(e.user_friendly_message())),
        }
    }

    /// Stop publications of the live run
    pub fn cancel(&self) {
        let mut live = self.lock_current();
        self.supersede(&mut live);
    }

    /// Generation of the most recent run
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<(u64, JoinHandle<()>)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidate the live run and abort its task; caller holds `current`
    fn supersede(&self, live: &mut Option<(u64, JoinHandle<()>)>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((_, handle)) = live.take() {
            handle.abort();
        }
        generation
    }

    fn notify(&self, notification: Notification) {
        // Dropped receiver means nobody is listening
        let _ = self.notify_tx.send(notification);
    }
}

/// Write `report` only while `generation` is current
///
/// The check runs under the channel's write lock, which makes it atomic
/// with the write.
fn publish_if_current(
    state: &watch::Sender<Report>,
    current: &AtomicU64,
    generation: u64,
    report: &Report,
) -> bool {
    state.send_if_modified(|snapshot| {
        if current.load(Ordering::SeqCst) == generation {
            *snapshot = report.clone();
            true
        } else {
            false
        }
    })
}
