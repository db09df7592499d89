mod harness;

use arbiter_config::Mode;
use arbiter_embeddings::cosine_similarity;
use arbiter_routing::Outcome;
use harness::config::ConfigBuilder;
use harness::engine::TestEngine;
use harness::mock_llm::{MockLlm, letter_embedding};

const QUESTION: &str = "Name three mountain ranges in the US";
const MOUNTAINS: &str = "- The Rocky Mountains\n- The Sierra Nevada\n- The Cascade Range";

#[tokio::test]
async fn semantic_similarity_contributes_to_the_score() {
    let local = MockLlm::start_with_response(MOUNTAINS).await.unwrap();
    let embedder = MockLlm::start().await.unwrap();

    let config = ConfigBuilder::new()
        .with_mode(Mode::LocalOnly)
        .with_local(&local.base_url())
        .with_semantic(&embedder.base_url())
        .build();
    let engine = TestEngine::new(&config);

    let outcome = engine.ask(QUESTION, Mode::LocalOnly).await;

    let Outcome::Answer { score, .. } = outcome else {
        panic!("expected an answer, got {outcome:?}");
    };

    let expected = cosine_similarity(
        &letter_embedding(&QUESTION.to_lowercase()),
        &letter_embedding(&MOUNTAINS.to_lowercase()),
    );
    assert_eq!(score.semantic_similarity, expected);
    assert!(score.semantic_term.abs() > 0.0);
    assert_eq!(embedder.embedding_count(), 2);
}

#[tokio::test]
async fn repeated_texts_hit_the_cache() {
    let local = MockLlm::start_with_response(MOUNTAINS).await.unwrap();
    let embedder = MockLlm::start().await.unwrap();

    let config = ConfigBuilder::new()
        .with_mode(Mode::LocalOnly)
        .with_local(&local.base_url())
        .with_semantic(&embedder.base_url())
        .build();
    let engine = TestEngine::new(&config);

    engine.ask(QUESTION, Mode::LocalOnly).await;
    engine.ask(&QUESTION.to_uppercase(), Mode::LocalOnly).await;

    assert_eq!(local.completion_count(), 2);
    assert_eq!(embedder.embedding_count(), 2);

    let stats = engine.embeddings.as_ref().unwrap().stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn embeddings_outage_still_answers() {
    let local = MockLlm::start_with_response(MOUNTAINS).await.unwrap();
    let embedder = MockLlm::start().await.unwrap();
    embedder.fail_embeddings();

    let config = ConfigBuilder::new()
        .with_mode(Mode::LocalOnly)
        .with_local(&local.base_url())
        .with_semantic(&embedder.base_url())
        .build();
    let engine = TestEngine::new(&config);

    let outcome = engine.ask(QUESTION, Mode::LocalOnly).await;

    let Outcome::Answer { score, .. } = outcome else {
        panic!("expected an answer, got {outcome:?}");
    };
    assert_eq!(score.semantic_similarity, None);
    assert!(embedder.embedding_count() >= 1);
}

#[tokio::test]
async fn disabled_semantic_scoring_never_embeds() {
    let local = MockLlm::start_with_response(MOUNTAINS).await.unwrap();
    let embedder = MockLlm::start().await.unwrap();

    let config = ConfigBuilder::new()
        .with_mode(Mode::LocalOnly)
        .with_local(&local.base_url())
        .with_policy(&format!(
            "[embeddings]\nbase_url = \"{}\"\nmodel = \"mock-embed\"",
            embedder.base_url()
        ))
        .build();
    let engine = TestEngine::new(&config);

    engine.ask(QUESTION, Mode::LocalOnly).await;

    assert!(engine.embeddings.is_none());
    assert_eq!(embedder.embedding_count(), 0);
}
