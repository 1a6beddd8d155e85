//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use motivate_core::engine::EngineStores;
use motivate_core::{
    Feedback, FeedbackEvent, HashingEmbedder, MotivateError, OceanVector, PreferenceEngine,
    ResponseGenerator, Result, Settings,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const EMBEDDING_DIMS: usize = 128;

/// Generator that answers deterministically in a style derived from the profile
#[derive(Default)]
pub struct ScriptedGenerator {
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, profile: &OceanVector) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tone = if profile.agreeableness >= 0.5 {
            "You are doing great, be kind to yourself"
        } else {
            "Stop making excuses and get it done"
        };
        Ok(format!("{} about {}.", tone, prompt))
    }
}

/// Generator that is never reachable
pub struct OfflineGenerator;

#[async_trait]
impl ResponseGenerator for OfflineGenerator {
    async fn generate(&self, _prompt: &str, _profile: &OceanVector) -> Result<String> {
        Err(MotivateError::CollaboratorUnavailable(
            "connection refused".to_string(),
        ))
    }
}

pub fn hashing_embedder() -> Arc<HashingEmbedder> {
    Arc::new(HashingEmbedder::new("hashing-v1", EMBEDDING_DIMS).unwrap())
}

/// Settings with auto-training off and a test-sized embedder
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.pipeline.auto_train = false;
    settings.embedding.dimensions = EMBEDDING_DIMS;
    settings
}

/// In-memory engine with the given generator
pub fn memory_engine(generator: Arc<dyn ResponseGenerator>) -> PreferenceEngine {
    PreferenceEngine::new(
        &test_settings(),
        EngineStores::in_memory(),
        generator,
        hashing_embedder(),
    )
    .unwrap()
}

pub fn feedback(
    prompt: &str,
    response: &str,
    profile: [f64; 5],
    feedback: Feedback,
) -> FeedbackEvent {
    FeedbackEvent::new(
        prompt,
        response,
        OceanVector::from_array(profile).unwrap(),
        feedback,
    )
    .unwrap()
}

/// Two positive and one negative event with distinct prompts and profiles
pub fn mixed_feedback() -> Vec<FeedbackEvent> {
    vec![
        feedback(
            "I can't finish my thesis",
            "You are doing great, one paragraph at a time.",
            [0.9, 0.5, 0.7, 0.8, 0.3],
            Feedback::Positive,
        ),
        feedback(
            "I keep skipping the gym",
            "Quit whining and go lift.",
            [0.3, 0.8, 0.6, 0.1, 0.2],
            Feedback::Negative,
        ),
        feedback(
            "Starting a new job tomorrow",
            "Be gentle with yourself, you earned this.",
            [0.6, 0.4, 0.3, 0.9, 0.7],
            Feedback::Positive,
        ),
    ]
}
