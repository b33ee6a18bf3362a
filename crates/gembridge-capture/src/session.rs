//! Capture session: one prompt in, one cleaned answer out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gembridge_core::{Error, Result};
use tracing::{info, warn};

use crate::config::CaptureConfig;
use crate::extract::ExtractionPipeline;
use crate::monitor::{GenerationMonitor, StartOutcome};
use crate::noise::NoiseTable;
use crate::page::ChatPage;
use crate::probe::DomProbe;
use crate::scheduler::Scheduler;
use crate::submit::SubmissionProtocol;
use crate::types::{
    CaptureReport, ExtractionMethod, GenerationState, PageSnapshot, PromptRequest,
};

/// Marks the page as busy until dropped.
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Drives one chat page. At most one prompt runs at a time.
pub struct CaptureSession {
    page: Arc<dyn ChatPage>,
    scheduler: Arc<dyn Scheduler>,
    config: CaptureConfig,
    probe: DomProbe,
    noise: NoiseTable,
    busy: Arc<AtomicBool>,
}

impl CaptureSession {
    pub fn new(
        page: Arc<dyn ChatPage>,
        scheduler: Arc<dyn Scheduler>,
        config: CaptureConfig,
    ) -> Result<Self> {
        let noise = NoiseTable::compile(&config.noise_rules)?;
        let probe = DomProbe::from_config(&config);
        Ok(Self {
            page,
            scheduler,
            config,
            probe,
            noise,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claim the page, or fail if another prompt holds it.
    pub fn try_begin(&self) -> Result<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::RequestAlreadyInFlight)?;
        Ok(InFlightGuard {
            busy: self.busy.clone(),
        })
    }

    /// Submit the prompt and capture the answer.
    pub async fn run(&self, request: &PromptRequest) -> Result<CaptureReport> {
        let guard = self.try_begin()?;
        self.run_claimed(guard, request).await
    }

    /// Like [`run`](Self::run), with the page already claimed by the caller.
    pub async fn run_claimed(
        &self,
        _guard: InFlightGuard,
        request: &PromptRequest,
    ) -> Result<CaptureReport> {
        let mut states = vec![GenerationState::Idle];

        let result = self.drive(request, &mut states).await;
        if let Err(e) = &result {
            warn!(
                "Capture failed in state {}: {}",
                states.last().copied().unwrap_or(GenerationState::Idle),
                e
            );
        }
        result
    }

    async fn drive(
        &self,
        request: &PromptRequest,
        states: &mut Vec<GenerationState>,
    ) -> Result<CaptureReport> {
        let page = self.page.as_ref();
        let scheduler = self.scheduler.as_ref();
        let prompt = request.text.as_str();

        let input = self.probe.find_input(page).await?;
        let snapshot = PageSnapshot::new(
            page.body_text().await?,
            self.probe.answer_elements(page).await?.len(),
        );
        info!(
            "Snapshot taken ({} chars, {} answer elements)",
            snapshot.text_len(),
            snapshot.answer_element_count
        );

        let submission = SubmissionProtocol::new(&self.probe, &self.config, scheduler)
            .submit(page, &input, prompt)
            .await?;
        states.push(GenerationState::Submitted);

        let monitor = GenerationMonitor::new(&self.probe, &self.config, scheduler);
        let pipeline = ExtractionPipeline::new(&self.config, &self.noise);

        states.push(GenerationState::AwaitingStart);
        let start_signal = match monitor.await_start(page, &snapshot, prompt).await {
            StartOutcome::Started { signal, .. } => signal,
            StartOutcome::TimedOut { .. } => {
                // An answer that finished between polls still counts; a
                // positional guess over unchanged text does not.
                states.push(GenerationState::TimedOut);
                return match pipeline.extract(page, &self.probe, &snapshot, prompt).await {
                    Ok(answer) if answer.extraction_method != ExtractionMethod::TextDiff => {
                        warn!("No start signal seen but a new answer element is present");
                        Ok(CaptureReport {
                            answer,
                            submission,
                            start_signal: None,
                            states: std::mem::take(states),
                        })
                    }
                    _ => {
                        states.push(GenerationState::Failed);
                        Err(Error::GenerationNeverStarted(self.config.start_timeout_secs))
                    }
                };
            }
        };

        states.push(GenerationState::InProgress);
        let stable = monitor.await_stable(page, &snapshot).await;
        states.push(stable.state);

        match pipeline.extract(page, &self.probe, &snapshot, prompt).await {
            Ok(answer) => Ok(CaptureReport {
                answer,
                submission,
                start_signal: Some(start_signal),
                states: std::mem::take(states),
            }),
            Err(e) => {
                states.push(GenerationState::Failed);
                Err(e)
            }
        }
    }
}
