// src/services/media_store.rs
use crate::errors::CampaignError;
use crate::models::{MediaHandle, VideoMedia};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Holds fetched video bytes behind locally addressable handles.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, media: VideoMedia) -> Result<MediaHandle, CampaignError>;
    async fn get(&self, handle: &MediaHandle) -> Result<Option<VideoMedia>, CampaignError>;
    async fn release(&self, handle: &MediaHandle) -> Result<(), CampaignError>;
}

pub struct RedisMediaStore {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisMediaStore {
    pub async fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, CampaignError> {
        let client = Client::open(redis_url).map_err(|e| CampaignError::Media(e.to_string()))?;

        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CampaignError::Media(e.to_string()))?;

        // Test connection
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| CampaignError::Media(e.to_string()))?;

        info!("Connected to Redis media store");
        Ok(Self { conn, ttl_secs })
    }

    fn keys(handle: &MediaHandle) -> (String, String) {
        (
            format!("media:{}:data", handle),
            format!("media:{}:mime", handle),
        )
    }
}

#[async_trait]
impl MediaStore for RedisMediaStore {
    async fn put(&self, media: VideoMedia) -> Result<MediaHandle, CampaignError> {
        let mut conn = self.conn.clone();
        let handle = MediaHandle::new();
        let (data_key, mime_key) = Self::keys(&handle);
        let ttl = self.ttl_secs as usize;

        conn.set_ex::<_, _, ()>(&data_key, media.bytes.to_vec(), ttl)
            .await
            .map_err(|e| CampaignError::Media(e.to_string()))?;
        conn.set_ex::<_, _, ()>(&mime_key, &media.mime_type, ttl)
            .await
            .map_err(|e| CampaignError::Media(e.to_string()))?;

        debug!("Stored {} bytes of media as {}", media.bytes.len(), handle);
        Ok(handle)
    }

    async fn get(&self, handle: &MediaHandle) -> Result<Option<VideoMedia>, CampaignError> {
        let mut conn = self.conn.clone();
        let (data_key, mime_key) = Self::keys(handle);

        let data: Option<Vec<u8>> = conn
            .get(&data_key)
            .await
            .map_err(|e| CampaignError::Media(e.to_string()))?;
        let Some(data) = data else {
            return Ok(None);
        };

        let mime_type: Option<String> = conn
            .get(&mime_key)
            .await
            .map_err(|e| CampaignError::Media(e.to_string()))?;

        Ok(Some(VideoMedia {
            mime_type: mime_type.unwrap_or_else(|| "video/mp4".to_string()),
            bytes: Bytes::from(data),
        }))
    }

    async fn release(&self, handle: &MediaHandle) -> Result<(), CampaignError> {
        let mut conn = self.conn.clone();
        let (data_key, mime_key) = Self::keys(handle);

        conn.del::<_, ()>(vec![data_key, mime_key])
            .await
            .map_err(|e| CampaignError::Media(e.to_string()))?;

        debug!("Released media {}", handle);
        Ok(())
    }
}

/// Process-local store, used when no Redis URL is configured.
#[derive(Default)]
pub struct InMemoryMediaStore {
    entries: RwLock<HashMap<MediaHandle, VideoMedia>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn put(&self, media: VideoMedia) -> Result<MediaHandle, CampaignError> {
        let handle = MediaHandle::new();
        self.entries.write().await.insert(handle, media);
        Ok(handle)
    }

    async fn get(&self, handle: &MediaHandle) -> Result<Option<VideoMedia>, CampaignError> {
        Ok(self.entries.read().await.get(handle).cloned())
    }

    async fn release(&self, handle: &MediaHandle) -> Result<(), CampaignError> {
        self.entries.write().await.remove(handle);
        Ok(())
    }
}
