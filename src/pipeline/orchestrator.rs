// src/pipeline/orchestrator.rs
//! Runs a [`PipelineState`] on a single task.
//!
//! User commands and effect completions share one channel, so they are
//! applied strictly one at a time. Effects run on their own tasks and post
//! their results back through a weak sender. Once the handle is dropped the
//! loop ends and cancels every effect still in flight.

use crate::errors::CampaignError;
use crate::models::{CampaignBrief, SlotId, VideoArtifact};
use crate::pipeline::state::{Action, Effect, PipelineSnapshot, PipelineState, Stage};
use crate::services::credentials::{CredentialGate, CredentialOutcome};
use crate::services::generation::{GenerationClient, VideoRequest};
use crate::services::media_store::MediaStore;
use log::{debug, info, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// External collaborators the pipeline drives.
#[derive(Clone)]
pub struct PipelineServices {
    pub client: Arc<dyn GenerationClient>,
    pub credentials: Arc<dyn CredentialGate>,
    pub media: Arc<dyn MediaStore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum CommandOutcome {
    Applied,
    Ignored(&'static str),
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied)
    }
}

enum Message {
    Command {
        action: Action,
        reply: oneshot::Sender<CommandOutcome>,
    },
    Completion(Action),
}

type WeakSender = mpsc::WeakUnboundedSender<Message>;

/// Handle to one running campaign pipeline.
pub struct CampaignOrchestrator {
    tx: mpsc::UnboundedSender<Message>,
    snapshot: watch::Receiver<PipelineSnapshot>,
}

impl CampaignOrchestrator {
    /// Start the pipeline loop on the current tokio runtime.
    pub fn spawn(services: PipelineServices) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(PipelineSnapshot::default());

        let runtime = Runtime {
            state: PipelineState::new(),
            services,
            completions: tx.downgrade(),
            snapshot: snapshot_tx,
            cancel: CancellationToken::new(),
        };
        tokio::spawn(runtime.run(rx));

        Self {
            tx,
            snapshot: snapshot_rx,
        }
    }

    /// Validates the brief before anything is queued, so an invalid brief
    /// never reaches the generation service.
    pub async fn submit(&self, brief: CampaignBrief) -> Result<CommandOutcome, CampaignError> {
        brief.validate()?;
        self.command(Action::Submit(brief)).await
    }

    pub async fn select_image(&self, slot: SlotId) -> Result<CommandOutcome, CampaignError> {
        self.command(Action::SelectImage(slot)).await
    }

    pub async fn request_preview(&self) -> Result<CommandOutcome, CampaignError> {
        self.command(Action::RequestPreview).await
    }

    pub async fn confirm_final(&self) -> Result<CommandOutcome, CampaignError> {
        self.command(Action::ConfirmFinal).await
    }

    pub async fn discard_preview(&self) -> Result<CommandOutcome, CampaignError> {
        self.command(Action::DiscardPreview).await
    }

    pub async fn reset(&self) -> Result<CommandOutcome, CampaignError> {
        self.command(Action::Reset).await
    }

    pub async fn dismiss_error(&self) -> Result<CommandOutcome, CampaignError> {
        self.command(Action::DismissError).await
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Current stage without cloning the rest of the snapshot.
    pub fn stage(&self) -> Stage {
        self.snapshot.borrow().stage
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot.clone()
    }

    async fn command(&self, action: Action) -> Result<CommandOutcome, CampaignError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(Message::Command { action, reply })
            .map_err(|_| CampaignError::PipelineStopped)?;
        outcome.await.map_err(|_| CampaignError::PipelineStopped)
    }
}

struct Runtime {
    state: PipelineState,
    services: PipelineServices,
    completions: WeakSender,
    snapshot: watch::Sender<PipelineSnapshot>,
    /// Cancelled when the loop exits so abandoned jobs stop polling.
    cancel: CancellationToken,
}

impl Runtime {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        let _stop = self.cancel.clone().drop_guard();
        while let Some(message) = rx.recv().await {
            match message {
                Message::Command { action, reply } => {
                    let outcome = self.apply(action);
                    let _ = reply.send(outcome);
                }
                Message::Completion(action) => {
                    self.apply(action);
                }
            }
        }
        debug!("Campaign pipeline stopped");
    }

    fn apply(&mut self, action: Action) -> CommandOutcome {
        let transition = self.state.apply(action);
        for effect in transition.effects {
            self.dispatch(effect);
        }

        match transition.ignored {
            None => {
                self.snapshot.send_replace(self.state.snapshot());
                CommandOutcome::Applied
            }
            Some(reason) => {
                debug!("Ignored action: {}", reason);
                CommandOutcome::Ignored(reason)
            }
        }
    }

    fn dispatch(&self, effect: Effect) {
        let services = self.services.clone();
        let completions = self.completions.clone();
        let cancel = self.cancel.clone();

        match effect {
            Effect::Analyze { epoch, brief } => {
                tokio::spawn(async move {
                    info!("Analyzing campaign {}", brief.id);
                    let Some(result) = until_closed(&cancel, services.client.analyze(&brief)).await
                    else {
                        return;
                    };
                    complete(&completions, Action::AnalysisFinished { epoch, result });
                });
            }
            Effect::SynthesizeImage {
                epoch,
                prompt,
                brief,
            } => {
                tokio::spawn(async move {
                    let work = services.client.synthesize_image(
                        &prompt.prompt_text,
                        &prompt.style_name,
                        &brief.source_image,
                        brief.aspect_ratio,
                    );
                    let Some(result) = until_closed(&cancel, work).await else {
                        return;
                    };
                    complete(
                        &completions,
                        Action::ImageFinished {
                            epoch,
                            style_name: prompt.style_name,
                            result,
                        },
                    );
                });
            }
            Effect::AcquireCredential { epoch, attempt } => {
                tokio::spawn(async move {
                    let gate = &services.credentials;
                    let mut result = if gate.has_credential().await {
                        Ok(CredentialOutcome::Selected)
                    } else {
                        complete(&completions, Action::CredentialMissing { epoch, attempt });
                        match until_closed(&cancel, gate.prompt_for_credential()).await {
                            Some(result) => result,
                            None => return,
                        }
                    };
                    if matches!(result, Ok(CredentialOutcome::Selected))
                        && gate.credential().await.is_none()
                    {
                        result = Err(CampaignError::Credential(
                            "selection reported success but no credential is available"
                                .to_string(),
                        ));
                    }
                    info!("Credential gate resolved for attempt {}: {:?}", attempt, result);
                    complete(
                        &completions,
                        Action::CredentialResolved {
                            epoch,
                            attempt,
                            result,
                        },
                    );
                });
            }
            Effect::SynthesizeVideo {
                epoch,
                attempt,
                tier,
                image,
                brief,
            } => {
                tokio::spawn(async move {
                    let request = VideoRequest {
                        image,
                        aspect_ratio: brief.aspect_ratio,
                        camera_movement: brief.camera_movement,
                        tier,
                        credential: services.credentials.credential().await,
                    };
                    let Some(rendered) =
                        until_closed(&cancel, services.client.synthesize_video(request)).await
                    else {
                        info!("Pipeline closed; abandoned {} video job", tier);
                        return;
                    };
                    let result = match rendered {
                        Ok(media) => {
                            let mime_type = media.mime_type.clone();
                            services
                                .media
                                .put(media)
                                .await
                                .map(|handle| VideoArtifact::new(handle, mime_type, tier))
                        }
                        Err(e) => Err(e),
                    };

                    if let Err(e) = &result {
                        warn!("{} video job failed: {}", tier, e);
                    }
                    let stored = result.as_ref().ok().map(|artifact| artifact.handle);
                    let delivered = complete(
                        &completions,
                        Action::VideoFinished {
                            epoch,
                            attempt,
                            result,
                        },
                    );
                    // Nobody is left to release it.
                    if let (false, Some(handle)) = (delivered, stored) {
                        if let Err(e) = services.media.release(&handle).await {
                            warn!("Failed to release orphaned media {}: {}", handle, e);
                        }
                    }
                });
            }
            Effect::ReleaseMedia(handle) => {
                tokio::spawn(async move {
                    if let Err(e) = services.media.release(&handle).await {
                        warn!("Failed to release media {}: {}", handle, e);
                    }
                });
            }
        }
    }
}

/// Returns false when the pipeline is gone and the completion was dropped.
fn complete(completions: &WeakSender, action: Action) -> bool {
    let delivered = completions
        .upgrade()
        .is_some_and(|tx| tx.send(Message::Completion(action)).is_ok());
    if !delivered {
        debug!("Pipeline closed; dropping completion");
    }
    delivered
}

async fn until_closed<F: Future>(cancel: &CancellationToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = work => Some(output),
    }
}
