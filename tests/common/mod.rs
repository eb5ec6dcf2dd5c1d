#![allow(dead_code)]

use adfusion::errors::CampaignError;
use adfusion::models::*;
use adfusion::services::{GenerationClient, InMemoryMediaStore, MediaStore, VideoRequest};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

pub const STYLES: [&str; 6] = [
    "Surreal Dream",
    "Neo Futurism",
    "Cinematic Noir",
    "Clean Minimal",
    "Abstract Burst",
    "Symbolic Story",
];

type Reply<T> = oneshot::Receiver<Result<T, CampaignError>>;

/// Generation client whose results are released by the test.
pub struct ScriptedClient {
    analysis: Mutex<Option<Result<CreativeAnalysis, CampaignError>>>,
    images: Mutex<HashMap<String, Reply<ImageData>>>,
    videos: Mutex<VecDeque<Reply<VideoMedia>>>,
    pub analyze_calls: AtomicUsize,
    pub video_requests: Mutex<Vec<VideoRequest>>,
}

impl ScriptedClient {
    /// Returns the client and one sender per style name.
    pub fn new(
        analysis: CreativeAnalysis,
    ) -> (Self, HashMap<String, oneshot::Sender<Result<ImageData, CampaignError>>>) {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for prompt in &analysis.prompts {
            let (tx, rx) = oneshot::channel();
            senders.insert(prompt.style_name.clone(), tx);
            receivers.insert(prompt.style_name.clone(), rx);
        }

        let client = Self {
            analysis: Mutex::new(Some(Ok(analysis))),
            images: Mutex::new(receivers),
            videos: Mutex::new(VecDeque::new()),
            analyze_calls: AtomicUsize::new(0),
            video_requests: Mutex::new(Vec::new()),
        };
        (client, senders)
    }

    pub fn failing_analysis(error: CampaignError) -> Self {
        Self {
            analysis: Mutex::new(Some(Err(error))),
            images: Mutex::new(HashMap::new()),
            videos: Mutex::new(VecDeque::new()),
            analyze_calls: AtomicUsize::new(0),
            video_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue the next video job; its result is whatever the test sends.
    pub fn next_video(&self) -> oneshot::Sender<Result<VideoMedia, CampaignError>> {
        let (tx, rx) = oneshot::channel();
        self.videos.lock().unwrap().push_back(rx);
        tx
    }

    pub fn video_requests(&self) -> Vec<VideoRequest> {
        self.video_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn analyze(&self, _brief: &CampaignBrief) -> Result<CreativeAnalysis, CampaignError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.analysis
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(CampaignError::Analysis("analysis already used".into())))
    }

    async fn synthesize_image(
        &self,
        _prompt_text: &str,
        style_name: &str,
        _source_image: &ImageData,
        _aspect_ratio: AspectRatio,
    ) -> Result<ImageData, CampaignError> {
        let reply = self.images.lock().unwrap().remove(style_name);
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(CampaignError::ImageSynthesis("dropped".into()))),
            None => Err(CampaignError::ImageSynthesis(format!(
                "no script for {}",
                style_name
            ))),
        }
    }

    async fn synthesize_video(&self, request: VideoRequest) -> Result<VideoMedia, CampaignError> {
        self.video_requests.lock().unwrap().push(request);
        let reply = self.videos.lock().unwrap().pop_front();
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(CampaignError::VideoSynthesis("dropped".into()))),
            None => Err(CampaignError::VideoSynthesis("no script".into())),
        }
    }
}

/// In-memory media store that also counts what went through it.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryMediaStore,
    pub puts: AtomicUsize,
    pub releases: AtomicUsize,
}

impl CountingStore {
    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }
}

#[async_trait]
impl MediaStore for CountingStore {
    async fn put(&self, media: VideoMedia) -> Result<MediaHandle, CampaignError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(media).await
    }

    async fn get(&self, handle: &MediaHandle) -> Result<Option<VideoMedia>, CampaignError> {
        self.inner.get(handle).await
    }

    async fn release(&self, handle: &MediaHandle) -> Result<(), CampaignError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(handle).await
    }
}

pub fn analysis(names: &[&str]) -> CreativeAnalysis {
    CreativeAnalysis {
        category: "Beverage".to_string(),
        audience: "Urban commuters".to_string(),
        emotion: "Alert calm".to_string(),
        marketing_copy: MarketingCopy {
            instagram_caption: "Brewed cold, served bold.".to_string(),
            linkedin_post: "Our new cold brew keeps teams sharp.".to_string(),
            tiktok_hook: "POV: your 3pm slump never shows up".to_string(),
            hashtags: vec!["coldbrew".to_string(), "coffee".to_string()],
            one_liner: "Cold brew, warm focus.".to_string(),
        },
        prompts: names
            .iter()
            .map(|name| StylePrompt {
                style_name: name.to_string(),
                prompt_text: format!("{} shot of a matte black can", name),
                marketing_hook: format!("{} energy", name),
            })
            .collect(),
    }
}

pub fn brief() -> CampaignBrief {
    CampaignBrief::new(
        "Cold brew coffee in a matte black can",
        ImageData::new("image/png", vec![0x89, b'P', b'N', b'G']),
        StyleSetId::CinematicAd,
        AspectRatio::Portrait,
        CameraMovement::CraneUp,
    )
}

pub fn rendered(tag: u8) -> ImageData {
    ImageData::new("image/png", vec![tag; 4])
}

pub fn video(label: &'static str) -> VideoMedia {
    VideoMedia {
        mime_type: "video/mp4".to_string(),
        bytes: Bytes::from_static(label.as_bytes()),
    }
}

/// Poll `check` until it returns true, failing the test after five seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
