use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use calmkit_memory::{MoodLog, TechniqueIndex};
use calmkit_provider::{create_provider, LlmProvider, LlmRequest};
use calmkit_schema::{Classification, MoodEntry};

use crate::classifier::EmotionClassifier;
use crate::config::{CalmkitConfig, ResponderConfig};
use crate::reply::{reply_context, template_reply, COMPANION_PROMPT};
use crate::severity::Severity;

/// Everything produced by one user turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// `None` for history requests, which skip classification.
    pub classification: Option<Classification>,
    pub technique: Option<String>,
    pub entry: Option<MoodEntry>,
    pub reply: String,
}

struct Responder {
    provider: Arc<dyn LlmProvider>,
    config: ResponderConfig,
}

/// Runs one turn: classify, pick a technique, save the mood entry, reply.
pub struct Orchestrator {
    classifier: EmotionClassifier,
    techniques: Arc<TechniqueIndex>,
    mood_log: Arc<MoodLog>,
    responder: Option<Responder>,
    history_window: usize,
}

/// The model provider the config asks for, or `None` when no model path is
/// enabled or the provider cannot be built.
pub fn configured_provider(config: &CalmkitConfig) -> Option<Arc<dyn LlmProvider>> {
    if !config.wants_provider() {
        return None;
    }
    match create_provider(&config.provider) {
        Ok(provider) => Some(provider),
        Err(error) => {
            tracing::warn!(%error, "no usable model provider, using keyword classification and template replies");
            None
        }
    }
}

pub fn is_history_request(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("how am i doing") || lowered.contains("mood history")
}

impl Orchestrator {
    pub fn new(
        classifier: EmotionClassifier,
        techniques: Arc<TechniqueIndex>,
        mood_log: Arc<MoodLog>,
    ) -> Self {
        Self {
            classifier,
            techniques,
            mood_log,
            responder: None,
            history_window: ResponderConfig::default().history_window,
        }
    }

    pub fn with_responder(mut self, provider: Arc<dyn LlmProvider>, config: ResponderConfig) -> Self {
        self.history_window = config.history_window;
        self.responder = Some(Responder { provider, config });
        self
    }

    /// Wire every component from configuration rooted at `root`.
    pub async fn from_config(config: &CalmkitConfig, root: &Path) -> Result<Self> {
        let data = config.resolved_data(root);
        let techniques = Arc::new(TechniqueIndex::load(&data.techniques_dir)?);
        let mood_log = Arc::new(MoodLog::open(&data.mood_log).await?);

        let provider = configured_provider(config);

        let classifier = EmotionClassifier::new(config.classifier.clone(), provider.clone());
        let mut orchestrator = Self::new(classifier, techniques, mood_log);
        orchestrator.history_window = config.responder.history_window;
        if let (Some(provider), true) = (provider, config.responder.use_llm) {
            orchestrator = orchestrator.with_responder(provider, config.responder.clone());
        }
        Ok(orchestrator)
    }

    pub fn classifier(&self) -> &EmotionClassifier {
        &self.classifier
    }

    pub fn techniques(&self) -> &TechniqueIndex {
        &self.techniques
    }

    pub fn mood_log(&self) -> &MoodLog {
        &self.mood_log
    }

    /// Technique text for the given intensity. `None` below the retrieval
    /// threshold or when the corpus has nothing to share.
    pub fn retrieve_technique(&self, intensity: u8) -> Option<String> {
        let query = Severity::from_intensity(intensity).retrieval_query()?;
        self.techniques
            .retrieve(query, 1)
            .into_iter()
            .next()
            .filter(|text| !text.trim().is_empty())
    }

    pub async fn handle_turn(&self, user_id: &str, text: &str) -> Result<TurnOutcome> {
        if is_history_request(text) {
            let reply = self.mood_log.history_report(self.history_window).await?;
            return Ok(TurnOutcome {
                classification: None,
                technique: None,
                entry: None,
                reply,
            });
        }

        let classification = self.classifier.classify(text).await;
        let technique = self.retrieve_technique(classification.intensity);
        tracing::info!(
            user_id,
            emotion = %classification.emotion,
            intensity = classification.intensity,
            needs_intervention = classification.needs_intervention,
            technique = technique.is_some(),
            "turn classified"
        );

        let entry = self
            .mood_log
            .append(user_id, text, &classification, technique.clone(), None)
            .await?;

        let reply = self
            .compose_reply(text, &classification, technique.as_deref())
            .await;

        Ok(TurnOutcome {
            classification: Some(classification),
            technique,
            entry: Some(entry),
            reply,
        })
    }

    async fn compose_reply(
        &self,
        text: &str,
        classification: &Classification,
        technique: Option<&str>,
    ) -> String {
        let Some(responder) = &self.responder else {
            return template_reply(classification, technique);
        };

        let request = LlmRequest::simple(
            responder.config.model.clone(),
            Some(COMPANION_PROMPT.to_string()),
            reply_context(text, classification, technique),
        )
        .with_max_tokens(responder.config.max_output_tokens)
        .with_temperature(responder.config.temperature);

        match responder.provider.chat(request).await {
            Ok(response) if !response.text.trim().is_empty() => response.text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("model returned an empty reply, using template");
                template_reply(classification, technique)
            }
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "reply generation failed, using template");
                template_reply(classification, technique)
            }
        }
    }
}
