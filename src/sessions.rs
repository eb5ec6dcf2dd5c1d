// src/sessions.rs
use crate::errors::CampaignError;
use crate::pipeline::{CampaignOrchestrator, PipelineServices, Stage};
use crate::services::credentials::InteractiveCredentialGate;
use crate::services::generation::GenerationClient;
use crate::services::media_store::MediaStore;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One user's campaign pipeline and the credential prompt that feeds it.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub pipeline: CampaignOrchestrator,
    pub credentials: Arc<InteractiveCredentialGate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    client: Arc<dyn GenerationClient>,
    media: Arc<dyn MediaStore>,
    default_credential: Option<String>,
    prompt_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        media: Arc<dyn MediaStore>,
        default_credential: Option<String>,
        prompt_timeout: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            client,
            media,
            default_credential,
            prompt_timeout,
        }
    }

    pub fn media(&self) -> &Arc<dyn MediaStore> {
        &self.media
    }

    pub async fn create(&self) -> Arc<Session> {
        let credentials = Arc::new(InteractiveCredentialGate::new(
            self.default_credential.clone(),
            self.prompt_timeout,
        ));
        let pipeline = CampaignOrchestrator::spawn(PipelineServices {
            client: self.client.clone(),
            credentials: credentials.clone(),
            media: self.media.clone(),
        });

        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            pipeline,
            credentials,
        });

        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        info!("Created session {}", session.id);
        session
    }

    pub async fn get(&self, id: &Uuid) -> Result<Arc<Session>, CampaignError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CampaignError::SessionNotFound(id.to_string()))
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| SessionSummary {
                session_id: s.id,
                created_at: s.created_at,
                stage: s.pipeline.stage(),
            })
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    /// Resets the pipeline, releasing any stored video, then forgets it.
    pub async fn remove(&self, id: &Uuid) -> Result<(), CampaignError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| CampaignError::SessionNotFound(id.to_string()))?;

        session.credentials.cancel().await;
        session.pipeline.reset().await?;
        info!("Removed session {}", id);
        Ok(())
    }
}
