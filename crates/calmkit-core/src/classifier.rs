//! Emotion classification.
//!
//! Two paths produce a [`Classification`]:
//! - a deterministic keyword scan, always available;
//! - an optional model call asking for a JSON judgment.
//!
//! The model path never fails outward. Every failure is mapped to a
//! [`ClassifyError`], logged, and answered by the keyword scan on the same text.

use std::sync::Arc;
use std::time::Duration;

use calmkit_provider::{LlmProvider, LlmRequest};
use calmkit_schema::{Classification, Emotion, MAX_INTENSITY};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{CalmkitConfig, ClassifierConfig};
use crate::orchestrator::configured_provider;

/// Keyword lists in scan order. The first emotion with a matching keyword wins.
pub const FALLBACK_KEYWORDS: &[(Emotion, &[&str])] = &[
    (
        Emotion::Panic,
        &["panic", "can't breathe", "chest racing", "heart racing"],
    ),
    (
        Emotion::Anxious,
        &["anxious", "anxiety", "worried", "nervous"],
    ),
    (Emotion::Stressed, &["stressed", "overwhelmed"]),
    (Emotion::Sad, &["sad", "depressed", "down"]),
    (Emotion::Positive, &["good", "great", "okay", "well"]),
];

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification call timed out after {0:?}")]
    Timeout(Duration),
    #[error("classification provider failed: {0}")]
    Provider(String),
    #[error("classification reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("classification reply rejected: {0}")]
    Invalid(String),
}

/// Deterministic keyword classification.
pub fn classify_keywords(text: &str) -> Classification {
    let lowered = text.to_lowercase();
    let emotion = FALLBACK_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(emotion, _)| *emotion)
        .unwrap_or(Emotion::Neutral);
    Classification::derived(emotion, emotion.base_intensity())
}

pub fn build_classification_prompt(text: &str) -> String {
    format!(
        r#"Classify emotion from text. Return ONLY JSON:
{{"emotion": "panic|anxious|stressed|sad|neutral|positive", "intensity": 0-5, "trigger_tags": [], "needs_intervention": true|false}}

Text: "{text}"

JSON:"#
    )
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

#[derive(Debug, Deserialize)]
struct ExternalClassification {
    emotion: String,
    intensity: i64,
    #[serde(default)]
    trigger_tags: Vec<String>,
    needs_intervention: bool,
}

/// Parse a model reply into a classification, rejecting anything outside the schema.
pub fn parse_classification(raw: &str) -> Result<Classification, ClassifyError> {
    let cleaned = strip_code_fences(raw);
    let external: ExternalClassification = serde_json::from_str(&cleaned)?;

    let emotion: Emotion = external
        .emotion
        .parse()
        .map_err(ClassifyError::Invalid)?;
    let intensity = u8::try_from(external.intensity)
        .ok()
        .filter(|i| *i <= MAX_INTENSITY)
        .ok_or_else(|| {
            ClassifyError::Invalid(format!(
                "intensity {} outside 0..={MAX_INTENSITY}",
                external.intensity
            ))
        })?;

    Ok(Classification {
        emotion,
        intensity,
        trigger_tags: external.trigger_tags,
        needs_intervention: external.needs_intervention,
    })
}

pub struct EmotionClassifier {
    config: ClassifierConfig,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl EmotionClassifier {
    pub fn new(config: ClassifierConfig, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { config, provider }
    }

    /// Classifier wired from config alone, without touching any data paths.
    pub fn from_config(config: &CalmkitConfig) -> Self {
        let provider = config
            .classifier
            .use_llm
            .then(|| configured_provider(config))
            .flatten();
        Self::new(config.classifier.clone(), provider)
    }

    /// Classifier that never leaves the process.
    pub fn keyword_only() -> Self {
        Self::new(
            ClassifierConfig {
                use_llm: false,
                ..ClassifierConfig::default()
            },
            None,
        )
    }

    pub fn uses_llm(&self) -> bool {
        self.config.use_llm && self.provider.is_some()
    }

    pub async fn classify(&self, text: &str) -> Classification {
        let provider = match (&self.provider, self.config.use_llm) {
            (Some(provider), true) => provider,
            _ => return classify_keywords(text),
        };

        match self.classify_external(provider.as_ref(), text).await {
            Ok(classification) => {
                tracing::debug!(
                    emotion = %classification.emotion,
                    intensity = classification.intensity,
                    "model classification"
                );
                classification
            }
            Err(error) => {
                tracing::warn!(%error, "model classification unavailable, using keyword fallback");
                classify_keywords(text)
            }
        }
    }

    async fn classify_external(
        &self,
        provider: &dyn LlmProvider,
        text: &str,
    ) -> Result<Classification, ClassifyError> {
        let request = LlmRequest::simple(
            self.config.model.clone(),
            None,
            build_classification_prompt(text),
        )
        .with_max_tokens(self.config.max_output_tokens)
        .with_temperature(self.config.temperature);

        let timeout = self.config.timeout();
        let response = tokio::time::timeout(timeout, provider.chat(request))
            .await
            .map_err(|_| ClassifyError::Timeout(timeout))?
            .map_err(|e| ClassifyError::Provider(format!("{e:#}")))?;

        parse_classification(&response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use calmkit_provider::LlmResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        reply: String,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn chat(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.max_tokens, 512);
            assert_eq!(request.temperature, Some(0.0));
            assert!(request.last_user_text().contains("Return ONLY JSON"));
            Ok(LlmResponse::text(self.reply.clone()))
        }
    }

    struct FailProvider;

    #[async_trait]
    impl LlmProvider for FailProvider {
        async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
            Err(anyhow!("gemini api error (503 Service Unavailable) [retryable]: busy"))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(LlmResponse::text(
                r#"{"emotion":"sad","intensity":2,"needs_intervention":false}"#,
            ))
        }
    }

    fn llm_classifier(provider: Arc<dyn LlmProvider>) -> EmotionClassifier {
        EmotionClassifier::new(ClassifierConfig::default(), Some(provider))
    }

    #[test]
    fn panic_keyword_always_wins() {
        for text in ["PANIC attack", "i think i'm panicking", "Panic and sad and good"] {
            let c = classify_keywords(text);
            assert_eq!(c.emotion, Emotion::Panic, "{text}");
            assert_eq!(c.intensity, 5);
            assert!(c.needs_intervention);
        }
    }

    #[test]
    fn unmatched_text_is_neutral() {
        let c = classify_keywords("the bus was on time");
        assert_eq!(c, Classification::neutral());
        assert_eq!(c.intensity, 0);
        assert!(!c.needs_intervention);
    }

    #[test]
    fn scan_order_is_category_order() {
        // "worried" (anxious) and "sad" both match; anxious is scanned first.
        assert_eq!(classify_keywords("sad and worried").emotion, Emotion::Anxious);
        assert_eq!(
            classify_keywords("feeling good but overwhelmed").emotion,
            Emotion::Stressed
        );
        assert_eq!(classify_keywords("I can't breathe").emotion, Emotion::Panic);
    }

    #[test]
    fn intensity_table() {
        assert_eq!(classify_keywords("so nervous").intensity, 3);
        assert_eq!(classify_keywords("stressed out").intensity, 3);
        assert_eq!(classify_keywords("feeling depressed").intensity, 2);
        assert_eq!(classify_keywords("pretty great day").intensity, 1);
    }

    #[test]
    fn keyword_results_follow_intervention_rule() {
        for text in [
            "panic",
            "anxious",
            "overwhelmed",
            "down",
            "okay",
            "nothing here",
        ] {
            let c = classify_keywords(text);
            assert_eq!(
                c.needs_intervention,
                c.intensity >= 4 || c.emotion == Emotion::Panic
            );
            assert!(c.trigger_tags.is_empty());
        }
    }

    #[test]
    fn parse_accepts_fenced_json() {
        let raw = "```json\n{\"emotion\": \"stressed\", \"intensity\": 4, \"trigger_tags\": [\"work\"], \"needs_intervention\": false}\n```";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.emotion, Emotion::Stressed);
        assert_eq!(c.intensity, 4);
        assert_eq!(c.trigger_tags, vec!["work"]);
        assert!(!c.needs_intervention);
    }

    #[test]
    fn parse_rejects_malformed_and_out_of_schema_replies() {
        assert!(matches!(
            parse_classification("I think you are sad"),
            Err(ClassifyError::Parse(_))
        ));
        assert!(matches!(
            parse_classification(r#"{"emotion":"sad","intensity":2}"#),
            Err(ClassifyError::Parse(_))
        ));
        assert!(matches!(
            parse_classification(
                r#"{"emotion":"furious","intensity":2,"needs_intervention":false}"#
            ),
            Err(ClassifyError::Invalid(_))
        ));
        assert!(matches!(
            parse_classification(r#"{"emotion":"sad","intensity":9,"needs_intervention":false}"#),
            Err(ClassifyError::Invalid(_))
        ));
        assert!(matches!(
            parse_classification(r#"{"emotion":"sad","intensity":-1,"needs_intervention":false}"#),
            Err(ClassifyError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn keyword_only_never_calls_out() {
        let classifier = EmotionClassifier::keyword_only();
        assert!(!classifier.uses_llm());
        let c = classifier.classify("Heart racing again").await;
        assert_eq!(c.emotion, Emotion::Panic);
    }

    #[tokio::test]
    async fn disabled_llm_skips_provider() {
        let provider = FixedProvider::new("not json");
        let classifier = EmotionClassifier::new(
            ClassifierConfig {
                use_llm: false,
                ..ClassifierConfig::default()
            },
            Some(provider.clone()),
        );
        classifier.classify("hello").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn external_classification_is_trusted_as_is() {
        let provider = FixedProvider::new(
            r#"{"emotion":"sad","intensity":2,"trigger_tags":["breakup"],"needs_intervention":true}"#,
        );
        let classifier = llm_classifier(provider.clone());
        let c = classifier.classify("panic").await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.emotion, Emotion::Sad);
        assert_eq!(c.trigger_tags, vec!["breakup"]);
        assert!(c.needs_intervention);
    }

    #[tokio::test]
    async fn malformed_reply_falls_back() {
        let classifier = llm_classifier(FixedProvider::new("sorry, I can't do that"));
        let c = classifier.classify("I'm so worried").await;
        assert_eq!(c, classify_keywords("I'm so worried"));
    }

    #[tokio::test]
    async fn provider_error_falls_back() {
        let classifier = llm_classifier(Arc::new(FailProvider));
        let c = classifier.classify("panic!").await;
        assert_eq!(c.emotion, Emotion::Panic);
        assert_eq!(c.intensity, 5);
        assert!(c.needs_intervention);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let classifier = EmotionClassifier::new(
            ClassifierConfig {
                timeout_secs: 2,
                ..ClassifierConfig::default()
            },
            Some(Arc::new(SlowProvider)),
        );
        let c = classifier.classify("feeling down").await;
        assert_eq!(c.emotion, Emotion::Sad);
        assert!(c.trigger_tags.is_empty());

        let err = classifier
            .classify_external(&SlowProvider, "feeling down")
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Timeout(d) if d == Duration::from_secs(2)));
    }

    #[test]
    fn from_config_wires_provider_only_when_usable() {
        let mut config = CalmkitConfig::default();
        config.provider = calmkit_provider::ProviderConfig::new(
            "offline",
            calmkit_provider::ProviderType::Stub,
        );
        assert!(EmotionClassifier::from_config(&config).uses_llm());

        config.classifier.use_llm = false;
        assert!(!EmotionClassifier::from_config(&config).uses_llm());

        let mut keyless = CalmkitConfig::default();
        keyless.provider.api_key = Some(String::new());
        assert!(!EmotionClassifier::from_config(&keyless).uses_llm());
    }
}
