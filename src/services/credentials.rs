// src/services/credentials.rs
use crate::errors::CampaignError;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialOutcome {
    Selected,
    Cancelled,
}

/// Precondition for the paid video-generation calls.
#[async_trait]
pub trait CredentialGate: Send + Sync {
    async fn has_credential(&self) -> bool;

    /// Ask the user to pick a credential and wait for the answer.
    async fn prompt_for_credential(&self) -> Result<CredentialOutcome, CampaignError>;

    /// The currently selected credential, if any.
    async fn credential(&self) -> Option<String>;
}

/// Credential gate answered out-of-band by the presentation layer.
///
/// A prompt parks a one-shot request until [`provide`](Self::provide) or
/// [`cancel`](Self::cancel) is called, or the prompt timeout elapses.
pub struct InteractiveCredentialGate {
    selected: RwLock<Option<String>>,
    pending: Mutex<Option<oneshot::Sender<Option<String>>>>,
    prompt_timeout: Duration,
}

impl InteractiveCredentialGate {
    pub fn new(preselected: Option<String>, prompt_timeout: Duration) -> Self {
        Self {
            selected: RwLock::new(preselected),
            pending: Mutex::new(None),
            prompt_timeout,
        }
    }

    /// Store a credential, answering the open prompt if there is one.
    /// Returns whether a prompt was waiting.
    pub async fn provide(&self, key: String) -> Result<bool, CampaignError> {
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(CampaignError::Validation(
                "Credential must not be empty".to_string(),
            ));
        }

        *self.selected.write().await = Some(key.clone());

        match self.pending.lock().await.take() {
            Some(sender) => Ok(sender.send(Some(key)).is_ok()),
            None => Ok(false),
        }
    }

    /// Cancel the open prompt. Returns whether a prompt was waiting.
    pub async fn cancel(&self) -> bool {
        match self.pending.lock().await.take() {
            Some(sender) => sender.send(None).is_ok(),
            None => false,
        }
    }

    pub async fn is_prompt_open(&self) -> bool {
        self.pending.lock().await.is_some()
    }
}

#[async_trait]
impl CredentialGate for InteractiveCredentialGate {
    async fn has_credential(&self) -> bool {
        self.selected.read().await.is_some()
    }

    async fn prompt_for_credential(&self) -> Result<CredentialOutcome, CampaignError> {
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.pending.lock().await.replace(tx) {
            let _ = previous.send(None);
        }

        info!("Waiting for a video credential to be selected");

        match tokio::time::timeout(self.prompt_timeout, rx).await {
            Ok(Ok(Some(_))) => Ok(CredentialOutcome::Selected),
            Ok(Ok(None)) | Ok(Err(_)) => Ok(CredentialOutcome::Cancelled),
            Err(_) => {
                warn!(
                    "Credential prompt unanswered after {}s",
                    self.prompt_timeout.as_secs()
                );
                self.pending.lock().await.take();
                Ok(CredentialOutcome::Cancelled)
            }
        }
    }

    async fn credential(&self) -> Option<String> {
        self.selected.read().await.clone()
    }
}
