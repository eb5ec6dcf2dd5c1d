// src/services/mod.rs
pub mod credentials;
pub mod generation;
pub mod image_processor;
pub mod media_store;
pub mod poller;
pub mod prompts;

pub use credentials::{CredentialGate, CredentialOutcome, InteractiveCredentialGate};
pub use generation::{GeminiClient, GenerationClient, VideoRequest};
pub use image_processor::ImageProcessor;
pub use media_store::{InMemoryMediaStore, MediaStore, RedisMediaStore};
pub use poller::{PollConfig, PollOutcome};
