use calmkit_schema::{Classification, Emotion};

use crate::severity::Severity;

pub const DISCLAIMER: &str = "I'm support, not therapy.";
pub const CRISIS_LINE: &str = "If you're in danger, call 911 or text 988.";

pub const COMPANION_PROMPT: &str = "You are Anxiety Support Buddy, a warm and compassionate companion.

FOR PANIC (intensity 4-5):
Reassure the user they are safe, share the breathing technique as numbered steps,
remind them: \"If you're in danger, call 911 or text 988.\" and ask how they feel after trying it.

FOR ANXIETY (intensity 2-3):
Acknowledge that it sounds difficult, share the technique, and ask whether they want to try it or talk more.

FOR MILD (intensity 0-1):
Acknowledge warmly and offer to listen or to try a calming technique.

STYLE: Warm, clear, 3-6 sentences. End with: \"I'm support, not therapy.\"";

/// Reply used when no model is configured or the model call fails.
pub fn template_reply(classification: &Classification, technique: Option<&str>) -> String {
    let technique = technique.map(str::trim).filter(|t| !t.is_empty());

    let body = match (Severity::of(classification), technique) {
        (Severity::Crisis, Some(technique)) => format!(
            "I'm here with you. You're safe. Let's try this breathing exercise:\n{}\n{CRISIS_LINE}\nTry this now. Let me know how you feel.",
            numbered_steps(technique)
        ),
        (Severity::Crisis, None) => format!(
            "I'm here with you. You're safe. Breathe in slowly for four counts, hold for four, and breathe out for four.\n{CRISIS_LINE}\nLet me know how you feel."
        ),
        (Severity::Elevated, Some(technique)) => format!(
            "I hear you - that sounds difficult. Let's try this technique:\n{technique}\nWould you like to try this, or talk more?"
        ),
        (Severity::Elevated, None) => {
            "I hear you - that sounds difficult. Would you like to try a calming technique, or talk more?"
                .to_string()
        }
        (Severity::Mild, _) => format!(
            "{}\nI'm here to listen. Would you like to talk or try a calming technique?",
            acknowledgement(classification.emotion)
        ),
    };

    format!("{body}\n{DISCLAIMER}")
}

fn acknowledgement(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Positive => "I'm really glad to hear that.",
        Emotion::Sad => "I'm sorry you're feeling low.",
        _ => "Thanks for sharing how you're feeling.",
    }
}

/// Present a technique as numbered steps, one per non-empty line.
/// Text that is already numbered is left alone.
fn numbered_steps(technique: &str) -> String {
    let lines: Vec<&str> = technique
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let already_numbered = lines
        .first()
        .is_some_and(|l| l.starts_with(|c: char| c.is_ascii_digit()));
    if lines.len() < 2 || already_numbered {
        return lines.join("\n");
    }
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// User-turn context handed to the model when replies are generated remotely.
pub fn reply_context(text: &str, classification: &Classification, technique: Option<&str>) -> String {
    let mut context = format!(
        "User message: \"{text}\"\nDetected emotion: {} (intensity {})\nNeeds intervention: {}",
        classification.emotion, classification.intensity, classification.needs_intervention
    );
    if !classification.trigger_tags.is_empty() {
        context.push_str(&format!(
            "\nTriggers: {}",
            classification.trigger_tags.join(", ")
        ));
    }
    if let Some(technique) = technique.filter(|t| !t.trim().is_empty()) {
        context.push_str(&format!("\nTechnique to share:\n{technique}"));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crisis_reply_has_steps_and_crisis_line() {
        let c = Classification::derived(Emotion::Panic, 5);
        let reply = template_reply(&c, Some("Breathe in for 4\nHold for 4\nBreathe out for 4"));
        assert!(reply.starts_with("I'm here with you. You're safe."));
        assert!(reply.contains("1. Breathe in for 4\n2. Hold for 4\n3. Breathe out for 4"));
        assert!(reply.contains(CRISIS_LINE));
        assert!(reply.ends_with(DISCLAIMER));
    }

    #[test]
    fn crisis_reply_without_technique_still_has_crisis_line() {
        let c = Classification::derived(Emotion::Panic, 5);
        let reply = template_reply(&c, Some("   "));
        assert!(reply.contains(CRISIS_LINE));
        assert!(reply.contains("Breathe in slowly"));
    }

    #[test]
    fn elevated_reply_shares_technique() {
        let c = Classification::derived(Emotion::Anxious, 3);
        let reply = template_reply(&c, Some("Name five things you can see."));
        assert!(reply.starts_with("I hear you - that sounds difficult."));
        assert!(reply.contains("Name five things you can see."));
        assert!(reply.contains("Would you like to try this, or talk more?"));
        assert!(!reply.contains(CRISIS_LINE));
    }

    #[test]
    fn mild_reply_acknowledges() {
        let reply = template_reply(&Classification::derived(Emotion::Positive, 1), None);
        assert!(reply.starts_with("I'm really glad to hear that."));
        assert!(reply.contains("I'm here to listen."));
        assert!(reply.ends_with(DISCLAIMER));
    }

    #[test]
    fn numbered_text_is_not_renumbered() {
        assert_eq!(numbered_steps("1. in\n2. out"), "1. in\n2. out");
        assert_eq!(numbered_steps("single line"), "single line");
    }

    #[test]
    fn reply_context_mentions_tags_and_technique() {
        let c = Classification {
            emotion: Emotion::Stressed,
            intensity: 3,
            trigger_tags: vec!["deadline".into()],
            needs_intervention: false,
        };
        let context = reply_context("work is a lot", &c, Some("Box breathing"));
        assert!(context.contains("stressed (intensity 3)"));
        assert!(context.contains("Triggers: deadline"));
        assert!(context.contains("Technique to share:\nBox breathing"));

        let bare = reply_context("hi", &Classification::neutral(), None);
        assert!(!bare.contains("Technique"));
    }
}
