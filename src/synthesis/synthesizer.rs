//! Contrastive pair synthesizer
//!
//! Walks the unprocessed tail of the feedback ledger and turns every event
//! into a preference pair: the response the user saw against a response to
//! the same prompt generated under a contrasting profile.

use crate::error::Result;
use crate::services::ResponseGenerator;
use crate::storage::FeedbackLedger;
use crate::synthesis::strategy::ContrastStrategy;
use crate::types::{
    Feedback, FeedbackEvent, LedgerCursor, OceanVector, PairSource, Preference, PreferencePair,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of one synthesis run
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    /// New pairs, in ledger order
    pub pairs: Vec<PreferencePair>,
    /// Cursor after this run; `since` advanced by the number of events consumed
    pub cursor: LedgerCursor,
    /// How many pairs carry the placeholder instead of a generated response
    pub placeholders_used: usize,
}

impl SynthesisOutcome {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Build the pair for one feedback event
///
/// `text_a` is always the response the user rated. Positive feedback prefers
/// it; negative feedback prefers the contrasting response.
pub fn contrastive_pair(
    event: &FeedbackEvent,
    contrast_profile: OceanVector,
    contrast_response: String,
) -> PreferencePair {
    let (preferred, source) = match event.feedback {
        Feedback::Positive => (Preference::A, PairSource::OceanFeedbackPositive),
        Feedback::Negative => (Preference::B, PairSource::OceanFeedbackNegative),
    };

    PreferencePair {
        text_a: event.response.clone(),
        text_b: contrast_response,
        profile_a: event.ocean_profile,
        profile_b: contrast_profile,
        preferred,
        prompt: Some(event.prompt.clone()),
        source,
    }
}

pub struct PairSynthesizer {
    ledger: Arc<FeedbackLedger>,
    generator: Arc<dyn ResponseGenerator>,
    strategy: Arc<dyn ContrastStrategy>,
    placeholder: String,
    generation_timeout: Duration,
}

impl PairSynthesizer {
    pub fn new(
        ledger: Arc<FeedbackLedger>,
        generator: Arc<dyn ResponseGenerator>,
        strategy: Arc<dyn ContrastStrategy>,
        placeholder: impl Into<String>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            generator,
            strategy,
            placeholder: placeholder.into(),
            generation_timeout,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Generate the contrasting response, falling back to the placeholder
    async fn contrast_response(
        &self,
        index: u64,
        prompt: &str,
        profile: &OceanVector,
    ) -> Option<String> {
        let generation = self.generator.generate(prompt, profile);
        match timeout(self.generation_timeout, generation).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                warn!(
                    "Generator returned empty text for ledger entry {}, using placeholder",
                    index
                );
                None
            }
            Ok(Err(e)) => {
                warn!("Generator failed for ledger entry {}: {}, using placeholder", index, e);
                None
            }
            Err(_) => {
                warn!(
                    "Generator timed out after {:?} for ledger entry {}, using placeholder",
                    self.generation_timeout, index
                );
                None
            }
        }
    }

    /// Turn every ledger entry at or after `since` into a preference pair
    ///
    /// Only reads: persisting the pairs and the returned cursor is up to the
    /// caller. Calling again with the returned cursor yields nothing until
    /// more feedback is appended.
    pub async fn synthesize(&self, since: LedgerCursor) -> Result<SynthesisOutcome> {
        let events = self.ledger.tail_since(since).await?;
        if events.is_empty() {
            debug!("No unprocessed feedback at cursor {}", since);
            return Ok(SynthesisOutcome {
                pairs: Vec::new(),
                cursor: since,
                placeholders_used: 0,
            });
        }

        let mut pairs = Vec::with_capacity(events.len());
        let mut placeholders_used = 0;

        for (index, event) in &events {
            let contrast_profile = self.strategy.contrast(&event.ocean_profile);
            let response = match self
                .contrast_response(*index, &event.prompt, &contrast_profile)
                .await
            {
                Some(text) => text,
                None => {
                    placeholders_used += 1;
                    self.placeholder.clone()
                }
            };
            pairs.push(contrastive_pair(event, contrast_profile, response));
        }

        let cursor = since.advance(events.len() as u64);
        info!(
            "Synthesized {} pairs ({} placeholders, strategy {}), cursor {} -> {}",
            pairs.len(),
            placeholders_used,
            self.strategy.name(),
            since,
            cursor
        );

        Ok(SynthesisOutcome {
            pairs,
            cursor,
            placeholders_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MotivateError;
    use crate::services::generator::MockResponseGenerator;
    use crate::storage::{AppendLog, MemoryLog};
    use crate::synthesis::strategy::OppositeStrategy;
    use async_trait::async_trait;

    const PLACEHOLDER: &str = "Contrastive response (generator unavailable)";

    async fn ledger_with(events: Vec<(&str, Feedback)>) -> Arc<MemoryLog<FeedbackEvent>> {
        let ledger = Arc::new(MemoryLog::<FeedbackEvent>::new());
        for (i, (prompt, feedback)) in events.into_iter().enumerate() {
            let profile = OceanVector::new(0.9, 0.2 + 0.1 * i as f64, 0.7, 0.8, 0.3).unwrap();
            let response = format!("shown response {}", i);
            let event = FeedbackEvent::new(prompt, response, profile, feedback).unwrap();
            ledger.append(event).await.unwrap();
        }
        ledger
    }

    fn synthesizer(
        ledger: Arc<MemoryLog<FeedbackEvent>>,
        generator: impl ResponseGenerator + 'static,
    ) -> PairSynthesizer {
        PairSynthesizer::new(
            ledger,
            Arc::new(generator),
            Arc::new(OppositeStrategy),
            PLACEHOLDER,
            Duration::from_secs(5),
        )
    }

    fn echo_generator() -> MockResponseGenerator {
        let mut generator = MockResponseGenerator::new();
        generator
            .expect_generate()
            .returning(|prompt, profile| Ok(format!("{} @ O={:.2}", prompt, profile.openness)));
        generator
    }

    #[tokio::test]
    async fn test_pairs_follow_feedback_polarity() {
        let ledger = ledger_with(vec![
            ("stuck on my thesis", Feedback::Positive),
            ("can't get up early", Feedback::Negative),
            ("want to run a marathon", Feedback::Positive),
        ])
        .await;
        let synth = synthesizer(ledger.clone(), echo_generator());

        let outcome = synth.synthesize(LedgerCursor(0)).await.unwrap();
        assert_eq!(outcome.pairs.len(), 3);
        assert_eq!(outcome.cursor, LedgerCursor(3));
        assert_eq!(outcome.placeholders_used, 0);

        let events = ledger.read_all().await.unwrap();
        for (pair, event) in outcome.pairs.iter().zip(&events) {
            assert_eq!(pair.text_a, event.response);
            assert_eq!(pair.profile_a, event.ocean_profile);
            assert_eq!(pair.profile_b, event.ocean_profile.opposite());
            assert_eq!(pair.prompt.as_deref(), Some(event.prompt.as_str()));
            assert!(pair.text_b.starts_with(&event.prompt));
        }

        assert_eq!(outcome.pairs[0].preferred, Preference::A);
        assert_eq!(outcome.pairs[0].source, PairSource::OceanFeedbackPositive);
        assert_eq!(outcome.pairs[1].preferred, Preference::B);
        assert_eq!(outcome.pairs[1].source, PairSource::OceanFeedbackNegative);
        assert_eq!(outcome.pairs[1].preferred_text(), outcome.pairs[1].text_b);
    }

    #[tokio::test]
    async fn test_second_run_at_advanced_cursor_is_empty() {
        let ledger = ledger_with(vec![("a", Feedback::Positive), ("b", Feedback::Negative)]).await;
        let synth = synthesizer(ledger.clone(), echo_generator());

        let first = synth.synthesize(LedgerCursor(0)).await.unwrap();
        let second = synth.synthesize(first.cursor).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(second.cursor, first.cursor);

        let late =
            FeedbackEvent::new("c", "r", OceanVector::balanced(), Feedback::Positive).unwrap();
        ledger.append(late).await.unwrap();
        let third = synth.synthesize(first.cursor).await.unwrap();
        assert_eq!(third.pairs.len(), 1);
        assert_eq!(third.cursor, LedgerCursor(3));
    }

    #[tokio::test]
    async fn test_generator_failure_uses_placeholder_and_still_advances() {
        let ledger = ledger_with(vec![
            ("one", Feedback::Positive),
            ("two", Feedback::Negative),
            ("three", Feedback::Positive),
        ])
        .await;

        let mut generator = MockResponseGenerator::new();
        generator.expect_generate().returning(|prompt, _| {
            if prompt == "two" {
                Err(MotivateError::CollaboratorUnavailable("connection refused".to_string()))
            } else {
                Ok(format!("contrast for {}", prompt))
            }
        });

        let outcome = synthesizer(ledger, generator)
            .synthesize(LedgerCursor(0))
            .await
            .unwrap();

        assert_eq!(outcome.pairs.len(), 3);
        assert_eq!(outcome.cursor, LedgerCursor(3));
        assert_eq!(outcome.placeholders_used, 1);
        assert_eq!(outcome.pairs[1].text_b, PLACEHOLDER);
        assert_eq!(outcome.pairs[0].text_b, "contrast for one");
    }

    struct StallingGenerator;

    #[async_trait]
    impl ResponseGenerator for StallingGenerator {
        async fn generate(&self, _prompt: &str, _profile: &OceanVector) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_generator_timeout_uses_placeholder() {
        let ledger = ledger_with(vec![("slow", Feedback::Positive)]).await;
        let synth = PairSynthesizer::new(
            ledger,
            Arc::new(StallingGenerator),
            Arc::new(OppositeStrategy),
            PLACEHOLDER,
            Duration::from_millis(50),
        );

        let outcome = synth.synthesize(LedgerCursor(0)).await.unwrap();
        assert_eq!(outcome.placeholders_used, 1);
        assert_eq!(outcome.pairs[0].text_b, PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_cursor_beyond_ledger_is_rejected() {
        let ledger = ledger_with(vec![("only", Feedback::Positive)]).await;
        let synth = synthesizer(ledger, MockResponseGenerator::new());
        let err = synth.synthesize(LedgerCursor(5)).await.unwrap_err();
        assert!(matches!(err, MotivateError::Storage(_)));
    }
}
