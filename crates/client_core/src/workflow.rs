//! Session state machine driving fortune -> card -> hosted image.
//!
//! ```text
//! Idle -> GeneratingFortune -> FortuneReady -> RenderingAndHosting -> Ready
//!              \                                   \
//!               `-> Failed <------------------------'
//! ```
//!
//! `reset` returns to `Idle` from anywhere. Every transition that follows an
//! await re-checks the run counter, so completions from a run that has been
//! reset or resubmitted are dropped instead of applied.

use std::{fmt, path::PathBuf, sync::Arc};

use serde::Serialize;
use shared::{
    domain::{FortuneText, Handle, HostedImageUrl, RunId},
    error::{ErrorKind, Notification, ServiceError},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    config::ClientSettings,
    error::{SettingsError, WorkflowError},
    services::{AssetHost, CardRenderer, FortuneService, HttpServices, ImageFetcher},
    share::{ShareIntent, ShareTemplate},
    sink::{DirectorySink, ImageSink},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    GeneratingFortune,
    FortuneReady,
    RenderingAndHosting,
    Ready,
    Failed,
}

impl Phase {
    pub fn accepts_submit(self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }

    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::GeneratingFortune | Self::FortuneReady | Self::RenderingAndHosting
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::GeneratingFortune => "generating fortune",
            Self::FortuneReady => "fortune ready",
            Self::RenderingAndHosting => "rendering and hosting",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Read snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    pub handle: String,
    pub phase: Phase,
    pub fortune_text: Option<FortuneText>,
    pub hosted_image_url: Option<HostedImageUrl>,
    pub last_error: Option<ErrorKind>,
    /// Set while a download of the hosted image is in flight; never changes `phase`.
    pub downloading: bool,
    pub run: RunId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ready(WorkflowState),
    Failed(WorkflowState),
    /// The run was reset or resubmitted while a call was in flight.
    Superseded { run: RunId },
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    PhaseChanged(WorkflowState),
    Notification(Notification),
}

pub struct WorkflowDependencies {
    pub fortunes: Arc<dyn FortuneService>,
    pub renderer: Arc<dyn CardRenderer>,
    pub host: Arc<dyn AssetHost>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub sink: Arc<dyn ImageSink>,
}

impl WorkflowDependencies {
    pub fn http(services: HttpServices, sink: Arc<dyn ImageSink>) -> Self {
        let services = Arc::new(services);
        Self {
            fortunes: services.clone(),
            renderer: services.clone(),
            host: services.clone(),
            fetcher: services,
            sink,
        }
    }
}

pub struct WorkflowController {
    fortunes: Arc<dyn FortuneService>,
    renderer: Arc<dyn CardRenderer>,
    host: Arc<dyn AssetHost>,
    fetcher: Arc<dyn ImageFetcher>,
    sink: Arc<dyn ImageSink>,
    share: ShareTemplate,
    download_file_name: String,
    inner: Mutex<WorkflowState>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl WorkflowController {
    /// Controller wired to the real HTTP endpoints and a directory sink.
    pub fn from_settings(settings: &ClientSettings) -> Result<Arc<Self>, SettingsError> {
        let services =
            HttpServices::new(settings).map_err(|err| SettingsError::HttpClient(err.to_string()))?;
        let sink = Arc::new(DirectorySink::new(settings.download_dir.clone()));
        Self::new_with_dependencies(settings, WorkflowDependencies::http(services, sink))
    }

    pub fn new_with_dependencies(
        settings: &ClientSettings,
        deps: WorkflowDependencies,
    ) -> Result<Arc<Self>, SettingsError> {
        let share = ShareTemplate::new(&settings.share_intent_url, settings.share_text.clone())?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Arc::new(Self {
            fortunes: deps.fortunes,
            renderer: deps.renderer,
            host: deps.host,
            fetcher: deps.fetcher,
            sink: deps.sink,
            share,
            download_file_name: settings.download_file_name.clone(),
            inner: Mutex::new(WorkflowState::default()),
            events,
        }))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> WorkflowState {
        self.inner.lock().await.clone()
    }

    /// Runs one full pipeline for `raw_handle`.
    ///
    /// Remote failures are folded into [`SubmitOutcome::Failed`]; `Err` is
    /// only returned for input that never reaches the network.
    pub async fn submit(&self, raw_handle: &str) -> Result<SubmitOutcome, WorkflowError> {
        let handle = match Handle::parse(raw_handle) {
            Ok(handle) => handle,
            Err(err) => {
                warn!("workflow: submit rejected reason={err}");
                self.notify(ErrorKind::Validation);
                return Err(err.into());
            }
        };

        let run = {
            let mut state = self.inner.lock().await;
            if !state.phase.accepts_submit() {
                return Err(WorkflowError::InvalidTransition {
                    action: "submit",
                    phase: state.phase,
                });
            }
            let run = state.run.next();
            *state = WorkflowState {
                handle: handle.as_str().to_string(),
                phase: Phase::GeneratingFortune,
                run,
                ..WorkflowState::default()
            };
            self.publish(&state);
            run
        };
        info!("workflow: submit accepted run={} handle={}", run, handle);

        let fortune = match self.fortunes.request_fortune(&handle).await {
            Ok(fortune) => fortune,
            Err(err) => {
                return Ok(self
                    .fail(run, ErrorKind::FortuneGenerationFailed, &err)
                    .await)
            }
        };

        {
            let mut state = self.inner.lock().await;
            if state.run != run {
                return Ok(self.superseded(run, "fortune"));
            }
            state.fortune_text = Some(fortune.clone());
            state.phase = Phase::FortuneReady;
            self.publish(&state);
        }
        debug!(run = %run, "fortune ready, advancing");

        Ok(self.advance(run, &handle, fortune).await)
    }

    /// The single outward transition of `FortuneReady`.
    async fn advance(&self, run: RunId, handle: &Handle, fortune: FortuneText) -> SubmitOutcome {
        {
            let mut state = self.inner.lock().await;
            if state.run != run || state.phase != Phase::FortuneReady {
                return self.superseded(run, "advance");
            }
            state.phase = Phase::RenderingAndHosting;
            self.publish(&state);
        }

        let image = match self.renderer.render_card(&fortune).await {
            Ok(image) => image,
            Err(err) => return self.fail(run, ErrorKind::CardRenderingFailed, &err).await,
        };

        if self.inner.lock().await.run != run {
            return self.superseded(run, "render");
        }

        let url = match self.host.host_image(image, &handle.upload_name()).await {
            Ok(url) => url,
            Err(err) => return self.fail(run, ErrorKind::AssetHostingFailed, &err).await,
        };

        let mut state = self.inner.lock().await;
        if state.run != run {
            return self.superseded(run, "host");
        }
        state.hosted_image_url = Some(url);
        state.phase = Phase::Ready;
        self.publish(&state);
        info!(
            "workflow: ready run={} url={}",
            run,
            state
                .hosted_image_url
                .as_ref()
                .map(HostedImageUrl::as_str)
                .unwrap_or_default()
        );
        SubmitOutcome::Ready(state.clone())
    }

    async fn fail(&self, run: RunId, kind: ErrorKind, err: &ServiceError) -> SubmitOutcome {
        let mut state = self.inner.lock().await;
        if state.run != run {
            return self.superseded(run, "failure");
        }
        warn!("workflow: run={} failed kind={:?} error={}", run, kind, err);
        state.phase = Phase::Failed;
        state.last_error = Some(kind);
        state.hosted_image_url = None;
        self.publish(&state);
        self.notify(kind);
        SubmitOutcome::Failed(state.clone())
    }

    fn superseded(&self, run: RunId, stage: &str) -> SubmitOutcome {
        debug!(run = %run, stage, "dropping stale completion");
        SubmitOutcome::Superseded { run }
    }

    /// Saves the hosted card locally. Leaves phase, fortune, and URL untouched.
    pub async fn download(&self) -> Result<PathBuf, WorkflowError> {
        let (run, url) = {
            let mut state = self.inner.lock().await;
            let url = match (state.phase, &state.hosted_image_url) {
                (Phase::Ready, Some(url)) => url.clone(),
                (phase, _) => {
                    return Err(WorkflowError::InvalidTransition {
                        action: "download",
                        phase,
                    })
                }
            };
            if state.downloading {
                return Err(WorkflowError::DownloadInProgress);
            }
            state.downloading = true;
            self.publish(&state);
            (state.run, url)
        };

        let result = self.fetch_and_save(run, &url).await;

        {
            let mut state = self.inner.lock().await;
            if state.run == run {
                state.downloading = false;
                self.publish(&state);
            }
        }

        match result {
            Ok(path) => {
                info!("workflow: downloaded run={} path={}", run, path.display());
                Ok(path)
            }
            Err(WorkflowError::Superseded) => Err(WorkflowError::Superseded),
            Err(err) => {
                warn!("workflow: download failed run={} error={}", run, err);
                self.notify(ErrorKind::DownloadFailed);
                Err(err)
            }
        }
    }

    async fn fetch_and_save(
        &self,
        run: RunId,
        url: &HostedImageUrl,
    ) -> Result<PathBuf, WorkflowError> {
        let fetched = self.fetcher.fetch_image(url).await;

        // Checked before the fetch result so a failure from an abandoned run stays silent.
        if self.inner.lock().await.run != run {
            return Err(WorkflowError::Superseded);
        }
        let bytes = fetched.map_err(|err| WorkflowError::Download(err.to_string()))?;

        self.sink
            .save(&self.download_file_name, &bytes)
            .await
            .map_err(|err| WorkflowError::Download(err.to_string()))
    }

    pub async fn share(&self) -> Result<ShareIntent, WorkflowError> {
        let state = self.inner.lock().await;
        match (state.phase, &state.hosted_image_url) {
            (Phase::Ready, Some(url)) => Ok(self.share.intent_for(url)),
            (phase, _) => Err(WorkflowError::InvalidTransition {
                action: "share",
                phase,
            }),
        }
    }

    /// Returns to `Idle` and invalidates whatever run is in flight.
    pub async fn reset(&self) -> WorkflowState {
        let mut state = self.inner.lock().await;
        let run = state.run.next();
        if state.phase.is_busy() {
            info!("workflow: reset abandons in-flight run={}", state.run);
        }
        *state = WorkflowState {
            run,
            ..WorkflowState::default()
        };
        self.publish(&state);
        state.clone()
    }

    fn publish(&self, state: &WorkflowState) {
        let _ = self.events.send(WorkflowEvent::PhaseChanged(state.clone()));
    }

    fn notify(&self, kind: ErrorKind) {
        let _ = self
            .events
            .send(WorkflowEvent::Notification(Notification::new(kind)));
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
