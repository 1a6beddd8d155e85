//! End-to-end tests for the feedback → pairs → reward model pipeline

mod common;

use common::{memory_engine, mixed_feedback, OfflineGenerator, ScriptedGenerator};
use motivate_core::storage::{AppendLog, MemoryLog};
use motivate_core::synthesis::{OppositeStrategy, PairSynthesizer};
use motivate_core::{
    Dimension, FeedbackEvent, LedgerCursor, MotivateError, OceanVector, PipelineStatus,
    Preference, RewardTrainer, TrainOptions, TrainingOutcome,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_three_events_to_scored_model() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = memory_engine(generator.clone());

    for event in mixed_feedback() {
        engine.record_feedback(event).await.unwrap();
    }

    let report = engine.train_from_feedback(TrainOptions::default()).await.unwrap();
    assert_eq!(report.status, PipelineStatus::Success);
    assert_eq!(report.new_pairs, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.cursor, LedgerCursor(3));
    assert_eq!(generator.calls(), 3);
    assert!(matches!(
        report.training,
        Some(TrainingOutcome::Trained { pair_count: 3, .. })
    ));

    let profile = engine.profile().await.unwrap().current;
    let score = engine
        .score("Take a short walk and breathe.", &profile)
        .await
        .unwrap();
    assert!((0.0..=1.0).contains(&score));

    let again = engine
        .score("Take a short walk and breathe.", &profile)
        .await
        .unwrap();
    assert_eq!(score, again);
}

#[tokio::test]
async fn test_second_run_produces_no_duplicates() {
    let engine = memory_engine(Arc::new(ScriptedGenerator::default()));
    for event in mixed_feedback() {
        engine.record_feedback(event).await.unwrap();
    }

    engine.train_from_feedback(TrainOptions::default()).await.unwrap();
    let second = engine.train_from_feedback(TrainOptions::default()).await.unwrap();

    assert_eq!(second.status, PipelineStatus::NoNewData);
    assert_eq!(second.new_pairs, 0);
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.total_pairs, 3);
    assert_eq!(stats.cursor, LedgerCursor(3));
}

#[tokio::test]
async fn test_offline_generator_still_advances_cursor() {
    let engine = memory_engine(Arc::new(OfflineGenerator));
    for event in mixed_feedback() {
        engine.record_feedback(event).await.unwrap();
    }

    let report = engine.train_from_feedback(TrainOptions::default()).await.unwrap();
    assert_eq!(report.status, PipelineStatus::Success);
    assert_eq!(report.new_pairs, 3);
    assert_eq!(report.placeholders_used, 3);
    assert_eq!(report.cursor, LedgerCursor(3));
    // placeholders still carry a label, so the model trains
    assert!(matches!(report.training, Some(TrainingOutcome::Trained { .. })));
}

#[tokio::test]
async fn test_min_feedback_override() {
    let engine = memory_engine(Arc::new(ScriptedGenerator::default()));
    let events = mixed_feedback();
    engine.record_feedback(events[0].clone()).await.unwrap();
    engine.record_feedback(events[1].clone()).await.unwrap();

    let report = engine
        .train_from_feedback(TrainOptions {
            min_feedback: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

    // two pairs are synthesized but the trainer needs three
    assert_eq!(report.new_pairs, 2);
    assert!(matches!(report.training, Some(TrainingOutcome::Failed { .. })));

    let err = engine
        .score("anything", &OceanVector::balanced())
        .await
        .unwrap_err();
    assert!(matches!(err, MotivateError::ModelNotTrained));
}

#[tokio::test]
async fn test_synthesized_pairs_are_exact_opposites() {
    let ledger = Arc::new(MemoryLog::<FeedbackEvent>::new());
    for event in mixed_feedback() {
        ledger.append(event).await.unwrap();
    }

    let synthesizer = PairSynthesizer::new(
        ledger.clone(),
        Arc::new(ScriptedGenerator::default()),
        Arc::new(OppositeStrategy),
        "placeholder",
        Duration::from_secs(5),
    );
    let outcome = synthesizer.synthesize(LedgerCursor(0)).await.unwrap();

    let preferred: Vec<Preference> = outcome.pairs.iter().map(|p| p.preferred).collect();
    assert_eq!(preferred, vec![Preference::A, Preference::B, Preference::A]);

    for pair in &outcome.pairs {
        for dim in Dimension::ALL {
            assert_eq!(pair.profile_b.get(dim), 1.0 - pair.profile_a.get(dim));
        }
    }

    let trainer = RewardTrainer::new(common::hashing_embedder(), Default::default());
    let model = trainer.train(&outcome.pairs).await.unwrap();
    assert_eq!(model.pair_count, 3);
    assert_eq!(model.dimensions, common::EMBEDDING_DIMS);

    let err = trainer.train(&outcome.pairs[..2]).await.unwrap_err();
    assert!(matches!(err, MotivateError::InsufficientData { have: 2, need: 3 }));
}
