use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{watch, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapter::BackendAdapter;
use crate::config::PollPolicy;
use crate::encoder::{self, ImageFile};
use crate::error::{GenerationError, Result};
use crate::types::{ClientState, ClientStatus, GenerationJob, GenerationRequest, JobStatus};
use crate::viewer::Viewer;

struct Inner {
    /// Bumped by every accepted request. Only the request holding the
    /// current epoch may write state.
    epoch: u64,
    token: Option<CancellationToken>,
    job: Option<GenerationJob>,
    /// Stage named in a failure message. Follows the published state, except
    /// for steps that have no state of their own.
    stage: &'static str,
}

/// Drives one image through a backend and hands the result to a viewer.
///
/// At most one job is active per client. A new [`request`](Self::request)
/// cancels the previous job (its in-flight HTTP call or delay is dropped),
/// clears the viewer, and takes over the status line. Share the client with
/// `Arc` to issue requests from several tasks.
///
/// # Example
/// ```no_run
/// use image3d_rs::*;
///
/// # async fn example() -> image3d_rs::Result<()> {
/// let adapter = AnyAdapter::from_env(Backend::Meshy)?;
/// let client = GenerationClient::new(adapter, ModelViewer::new());
///
/// let url = client.request(Some(ImageFile::path("chair.png"))).await?;
/// println!("Model at {}", url);
/// # Ok(())
/// # }
/// ```
pub struct GenerationClient<A, V> {
    adapter: A,
    viewer: AsyncMutex<V>,
    policy: PollPolicy,
    inner: Mutex<Inner>,
    status: watch::Sender<ClientStatus>,
}

impl<A, V> GenerationClient<A, V>
where
    A: BackendAdapter,
    V: Viewer,
{
    pub fn new(adapter: A, viewer: V) -> Self {
        let (status, _) = watch::channel(ClientStatus::default());
        Self {
            adapter,
            viewer: AsyncMutex::new(viewer),
            policy: PollPolicy::default(),
            inner: Mutex::new(Inner {
                epoch: 0,
                token: None,
                job: None,
                stage: ClientState::Idle.stage(),
            }),
            status,
        }
    }

    /// Bound polling by attempts and/or wall-clock time.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    /// Current state and status message.
    pub fn status(&self) -> ClientStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ClientState {
        self.status.borrow().state
    }

    /// Receive every status change.
    pub fn subscribe(&self) -> watch::Receiver<ClientStatus> {
        self.status.subscribe()
    }

    /// Snapshot of the active (or last finished) job.
    pub fn current_job(&self) -> Option<GenerationJob> {
        self.lock_inner().job.clone()
    }

    /// Exclusive access to the viewer, e.g. to save or resize.
    pub async fn viewer(&self) -> AsyncMutexGuard<'_, V> {
        self.viewer.lock().await
    }

    /// Cancel the active job. Returns `false` if nothing was running.
    pub fn cancel(&self) -> bool {
        let inner = self.lock_inner();
        match &inner.token {
            Some(token) if !token.is_cancelled() => {
                info!(epoch = inner.epoch, "Cancelling generation");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Run the full lifecycle for `file` and return the loaded model URL.
    ///
    /// `None` means no file was selected: the request is rejected with
    /// [`GenerationError::NoImageSelected`], the state is left as is and no
    /// network call is made.
    ///
    /// Every failure is also written to the status line as one message
    /// naming the stage, the error kind and any vendor detail. Nothing is
    /// retried.
    pub async fn request(&self, file: Option<ImageFile>) -> Result<String> {
        let Some(file) = file else {
            warn!("Generation requested without an image");
            self.status.send_modify(|status| {
                status.message = format!("Error: {}", GenerationError::NoImageSelected);
            });
            return Err(GenerationError::NoImageSelected);
        };

        let (epoch, token) = self.begin();
        self.viewer.lock().await.clear_model();

        let result = self.run(epoch, &token, file).await;
        self.finish(epoch, result)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Supersede any active job and enter `Encoding`.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut inner = self.lock_inner();
        if let Some(previous) = inner.token.take() {
            if !previous.is_cancelled() {
                info!(epoch = inner.epoch, "Superseding active generation");
            }
            previous.cancel();
        }

        inner.epoch += 1;
        inner.job = None;
        inner.stage = ClientState::Encoding.stage();
        let token = CancellationToken::new();
        inner.token = Some(token.clone());

        self.status.send_replace(ClientStatus {
            state: ClientState::Encoding,
            message: "Processing image...".to_string(),
        });
        (inner.epoch, token)
    }

    fn transition(&self, epoch: u64, state: ClientState, message: impl Into<String>) -> Result<()> {
        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            return Err(GenerationError::Cancelled);
        }
        inner.stage = state.stage();
        self.status.send_replace(ClientStatus {
            state,
            message: message.into(),
        });
        Ok(())
    }

    fn set_stage(&self, epoch: u64, stage: &'static str) {
        let mut inner = self.lock_inner();
        if inner.epoch == epoch {
            inner.stage = stage;
        }
    }

    fn set_message(&self, epoch: u64, message: String) {
        let inner = self.lock_inner();
        if inner.epoch == epoch {
            self.status.send_modify(|status| status.message = message);
        }
    }

    fn record_job(&self, epoch: u64, job: &GenerationJob) {
        let mut inner = self.lock_inner();
        if inner.epoch == epoch {
            inner.job = Some(job.clone());
        }
    }

    async fn run(&self, epoch: u64, token: &CancellationToken, file: ImageFile) -> Result<String> {
        let backend = self.adapter.backend();

        let image = tokio::select! {
            _ = token.cancelled() => return Err(GenerationError::Cancelled),
            image = encoder::encode(&file, self.adapter.encoding()) => image?,
        };
        let request = GenerationRequest::new(image, backend);

        self.transition(
            epoch,
            ClientState::Submitting,
            format!("Image processed. Sending to {}...", backend),
        )?;
        info!(
            %backend,
            file = %request.image.file_name,
            size = request.image.len(),
            "Submitting generation request"
        );

        let submitted = tokio::select! {
            _ = token.cancelled() => return Err(GenerationError::Cancelled),
            job = self.adapter.submit(&request.image) => job?,
        };
        self.record_job(epoch, &submitted);

        let job = if self.adapter.is_terminal(&submitted) {
            submitted
        } else {
            self.transition(
                epoch,
                ClientState::Polling,
                format!("Generating 3D model with {}...", backend),
            )?;
            self.poll_until_terminal(epoch, token, submitted).await?
        };

        if job.status != JobStatus::Succeeded {
            return Err(GenerationError::JobFailed {
                status: job.status,
                detail: job
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "no detail reported".to_string()),
            });
        }

        self.set_stage(epoch, "result extraction");
        let url = self.adapter.extract_result(&job)?;
        self.transition(
            epoch,
            ClientState::Succeeded,
            "Generation complete! Loading 3D model...",
        )?;
        info!(
            %backend,
            url = %url,
            elapsed_ms = (Utc::now() - request.created_at).num_milliseconds(),
            "Generation complete"
        );

        let mut viewer = self.viewer.lock().await;
        if token.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        let mut on_progress = |fraction: f32| {
            self.set_message(epoch, format!("Loading model... {:.2}%", fraction * 100.0));
        };
        tokio::select! {
            _ = token.cancelled() => return Err(GenerationError::Cancelled),
            loaded = viewer.load_model(&url, &mut on_progress) => loaded?,
        }

        Ok(url)
    }

    async fn poll_until_terminal(
        &self,
        epoch: u64,
        token: &CancellationToken,
        mut job: GenerationJob,
    ) -> Result<GenerationJob> {
        let interval = self.adapter.poll_interval();
        let started = Instant::now();
        let deadline = self.policy.deadline.map(|d| started + d);
        let mut attempts: u32 = 0;

        loop {
            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    return Err(GenerationError::Timeout {
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(GenerationError::Cancelled),
                _ = deadline_reached(deadline) => {
                    return Err(GenerationError::Timeout { attempts, elapsed: started.elapsed() });
                }
                _ = tokio::time::sleep(interval) => {}
            }

            attempts += 1;
            debug!(job = job.label(), attempt = attempts, "Checking job status");

            let updated = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(GenerationError::Cancelled),
                _ = deadline_reached(deadline) => {
                    return Err(GenerationError::Timeout { attempts, elapsed: started.elapsed() });
                }
                polled = self.adapter.poll(&job) => polled?,
            };
            job = updated;
            self.record_job(epoch, &job);

            if self.adapter.is_terminal(&job) {
                debug!(job = job.label(), status = %job.status, attempts, "Job reached terminal state");
                return Ok(job);
            }
            if let Some(progress) = job.progress {
                self.set_message(epoch, format!("Generating 3D model... {}%", progress));
            }
        }
    }

    /// Write the outcome of request `epoch`, unless a newer request owns the
    /// client by now.
    fn finish(&self, epoch: u64, result: Result<String>) -> Result<String> {
        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            debug!(epoch, "Superseded generation finished");
            return result;
        }
        inner.token = None;

        match &result {
            Ok(_) => {
                self.status.send_replace(ClientStatus {
                    state: ClientState::Succeeded,
                    message: "Model loaded!".to_string(),
                });
            }
            Err(err) => {
                let cancelled = matches!(err, GenerationError::Cancelled);
                if let Some(job) = inner.job.as_mut().filter(|j| !j.is_terminal()) {
                    job.status = if cancelled {
                        JobStatus::Canceled
                    } else {
                        JobStatus::Failed
                    };
                    job.error_message = Some(err.to_string());
                }

                let stage = inner.stage;
                let message = if cancelled {
                    "Generation was cancelled.".to_string()
                } else {
                    format!("Error during {} ({}): {}", stage, err.kind(), err)
                };
                if cancelled {
                    info!(epoch, "Generation cancelled");
                } else {
                    error!(epoch, stage, kind = err.kind(), error = %err, "Generation failed");
                }
                self.status.send_replace(ClientStatus {
                    state: ClientState::Failed,
                    message,
                });
            }
        }

        result
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
