mod common;

use common::{buy, history, now, sell, temp_dir};
use insidex::application::ml::classifier::{Classifier, LinearModel};
use insidex::application::ml::{ModelTrainer, TrainingOptions};
use insidex::application::signals::SignalService;
use insidex::config::ScoringEnvConfig;
use insidex::domain::ml::artifact::{ModelKind, ModelMetadata, ModelMetrics};
use insidex::domain::signal::{Confidence, SignalSource};
use insidex::domain::trade::TradeRecord;
use insidex::infrastructure::{ArtifactStore, InMemoryTradeStore};
use std::path::Path;
use std::sync::Arc;

fn service(trades: Vec<TradeRecord>, artifacts_dir: &Path) -> SignalService {
    SignalService::new(
        Arc::new(InMemoryTradeStore::new(trades)),
        ArtifactStore::new(artifacts_dir),
        ScoringEnvConfig::default(),
    )
}

fn train_into(dir: &Path, kind: ModelKind) {
    let mut trainer = ModelTrainer::new(ArtifactStore::new(dir));
    let options = TrainingOptions {
        model_kind: kind,
        ..TrainingOptions::default()
    };
    trainer.train(&history(150), &options, now()).unwrap();
}

fn recent_batch() -> Vec<TradeRecord> {
    vec![
        buy("ACME", "Pat Doe", "CEO", 1_500_000.0, 12),
        buy("ACME", "Lee Ray", "Director", 40_000.0, 15),
        buy("BOLT", "Kim Fox", "CFO", 600_000.0, 3),
        buy("CRUX", "Ana Roe", "VP Operations", 8_000.0, 20),
        sell("BOLT", "Kim Fox", 900_000.0, 5),
    ]
}

#[test]
fn test_missing_artifacts_degrade_to_heuristics() {
    let svc = service(Vec::new(), &temp_dir("missing"));

    let info = svc.model_info();
    assert!(!info.model_loaded);
    assert_eq!(info.model_type, "Unknown");
    assert_eq!(info.n_features, 0);
    assert!(info.model_timestamp.is_none());

    let signals = svc.score_batch(&recent_batch(), now(), None);
    assert_eq!(signals.len(), 4);
    assert!(signals.iter().all(|s| s.source == SignalSource::Heuristic));
}

#[test]
fn test_heuristic_tiering() {
    let svc = service(Vec::new(), &temp_dir("tiering"));
    let trades = vec![
        buy("ACME", "Pat Doe", "Senior Vice President", 1_200_000.0, 20),
        buy("ACME", "Chris Poe", "Chief Executive Officer", 1_200_000.0, 20),
    ];

    let signals = svc.score_batch(&trades, now(), None);
    assert_eq!(signals.len(), 2);

    // "Senior Vice President" matches the CEO-level "president" keyword.
    let ceo_like = &signals[0];
    assert!((ceo_like.score - 0.80).abs() < 1e-9);

    let plain = vec![buy("ACME", "Pat Doe", "VP Sales", 1_200_000.0, 20)];
    let signals = svc.score_batch(&plain, now(), None);
    assert!((signals[0].score - 0.65).abs() < 1e-9);
    assert_eq!(signals[0].confidence, Confidence::Medium);

    let ceo = vec![buy("ACME", "Chris Poe", "CEO", 1_200_000.0, 20)];
    let signals = svc.score_batch(&ceo, now(), None);
    assert!((signals[0].score - 0.80).abs() < 1e-9);
    assert_eq!(signals[0].confidence, Confidence::High);
    assert!(signals[0].score < 0.95);
}

#[test]
fn test_sells_and_empty_batches_yield_nothing() {
    let svc = service(Vec::new(), &temp_dir("sells"));
    assert!(svc.score_batch(&[], now(), None).is_empty());
    assert!(
        svc.score_batch(&[sell("ACME", "Pat Doe", 5_000_000.0, 2)], now(), None)
            .is_empty()
    );
}

#[test]
fn test_scores_are_bounded_and_bucketed_on_both_paths() {
    let dir = temp_dir("bounded");
    let heuristic = service(Vec::new(), &dir);
    train_into(&dir, ModelKind::RandomForest);
    let model = service(Vec::new(), &dir);
    assert!(model.model_info().model_loaded);

    let batch = history(60);
    for svc in [&heuristic, &model] {
        for signal in svc.score_batch(&batch, now(), None) {
            assert!((0.0..=1.0).contains(&signal.score));
            assert_eq!(signal.confidence, Confidence::from_score(signal.score));
            assert!(!signal.reasons.is_empty() && signal.reasons.len() <= 4);
        }
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_scoring_is_deterministic() {
    let dir = temp_dir("determinism");
    train_into(&dir, ModelKind::LogisticRegression);
    let svc = service(Vec::new(), &dir);

    let batch = history(40);
    let first = svc.score_batch(&batch, now(), Some(10));
    let second = svc.score_batch(&batch, now(), Some(10));
    assert_eq!(first, second);

    let fallback = service(Vec::new(), &temp_dir("determinism_none"));
    assert_eq!(
        fallback.score_batch(&batch, now(), None),
        fallback.score_batch(&batch, now(), None)
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_model_signals_are_tagged_and_explained() {
    let dir = temp_dir("model_path");
    train_into(&dir, ModelKind::LogisticRegression);
    let svc = service(Vec::new(), &dir);

    let info = svc.model_info();
    assert_eq!(info.model_type, "logistic_regression");
    assert!(info.scaler_used);
    assert_eq!(info.model_timestamp.as_deref(), Some("20240601_120000"));

    for signal in svc.score_batch(&history(60), now(), None) {
        assert_eq!(signal.source, SignalSource::Model);
        assert!(signal.score >= 0.30);
        assert!(signal.reasons.last().unwrap().starts_with("Model confidence:"));
        assert!((signal.expected_return - signal.score * 0.15).abs() < 1e-12);
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_artifact_without_usable_features_falls_back() {
    let dir = temp_dir("no_overlap");
    let metadata = ModelMetadata {
        timestamp: "20240501_000000".to_string(),
        model_type: ModelKind::LogisticRegression,
        feature_names: vec!["retired_feature".to_string()],
        n_features: 1,
        metrics: ModelMetrics::default(),
        scaler_used: false,
    };
    let classifier = Classifier::LogisticRegression(LinearModel {
        coefficients: vec![1.0],
        intercept: 0.0,
    });
    ArtifactStore::new(&dir)
        .publish(&classifier, None, &metadata)
        .unwrap();

    let svc = service(Vec::new(), &dir);
    assert!(svc.model_info().model_loaded);

    let signals = svc.score_batch(&recent_batch(), now(), None);
    assert_eq!(signals.len(), 4);
    assert!(signals.iter().all(|s| s.source == SignalSource::Heuristic));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_corrupt_artifact_is_not_fatal() {
    let dir = temp_dir("corrupt");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("metadata.json"), b"{\"timestamp\": 3").unwrap();

    let svc = service(Vec::new(), &dir);
    assert!(!svc.model_info().model_loaded);
    assert!(!svc.score_batch(&recent_batch(), now(), None).is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_forest_with_truncated_feature_list_falls_back() {
    let dir = temp_dir("truncated_features");
    train_into(&dir, ModelKind::RandomForest);

    let path = dir.join("metadata.json");
    let mut metadata: ModelMetadata =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    metadata.feature_names.truncate(3);
    std::fs::write(&path, serde_json::to_vec_pretty(&metadata).unwrap()).unwrap();

    let svc = service(Vec::new(), &dir);
    assert!(!svc.model_info().model_loaded);

    let signals = svc.score_batch(&recent_batch(), now(), None);
    assert_eq!(signals.len(), 4);
    assert!(signals.iter().all(|s| s.source == SignalSource::Heuristic));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_reload_picks_up_new_model() {
    let dir = temp_dir("reload");
    let mut svc = service(Vec::new(), &dir);
    assert!(!svc.has_model());

    train_into(&dir, ModelKind::RandomForest);
    // Loaded once at construction; nothing changes until reload.
    assert!(!svc.has_model());
    assert!(svc.reload());
    assert_eq!(svc.model_info().model_type, "random_forest");

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_generate_signals_window_and_limit() {
    let mut trades = recent_batch();
    trades.push(buy("OLD", "Pat Doe", "CEO", 9_000_000.0, 45));
    let svc = service(trades, &temp_dir("generate"));

    let batch = svc.generate_signals(30, 3, now()).await.unwrap();
    assert_eq!(batch.window_days, 30);
    assert_eq!(batch.generated_at, now());
    assert_eq!(batch.total, 3);
    assert_eq!(batch.signals.len(), 3);
    assert!(batch.signals.iter().all(|s| s.ticker != "OLD"));
    assert!(batch.signals.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_score_for_ticker() {
    let svc = service(recent_batch(), &temp_dir("ticker"));

    let signals = svc.score_for_ticker("acme", 30, now()).await.unwrap();
    assert_eq!(signals.len(), 2);
    assert!(signals.iter().all(|s| s.ticker == "ACME"));
    assert!(signals[0].score >= signals[1].score);

    // Only a sell in the window
    let bolt = svc.score_for_ticker("BOLT", 4, now()).await.unwrap();
    assert_eq!(bolt.len(), 1);
    assert_eq!(bolt[0].insider_name, "Kim Fox");

    assert!(svc.score_for_ticker("NONE", 30, now()).await.unwrap().is_empty());
}
