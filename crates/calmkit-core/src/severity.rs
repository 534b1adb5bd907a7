use calmkit_schema::Classification;

pub const PANIC_QUERY: &str = "panic breathing exercise";
pub const GROUNDING_QUERY: &str = "anxiety grounding technique";

/// How strongly a turn should be answered, derived from intensity alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Intensity 4-5: breathing exercise and crisis-line reminder.
    Crisis,
    /// Intensity 2-3: grounding technique.
    Elevated,
    /// Intensity 0-1: listen, no technique.
    Mild,
}

impl Severity {
    pub fn from_intensity(intensity: u8) -> Self {
        match intensity {
            4.. => Severity::Crisis,
            2..=3 => Severity::Elevated,
            _ => Severity::Mild,
        }
    }

    pub fn of(classification: &Classification) -> Self {
        Self::from_intensity(classification.intensity)
    }

    /// Corpus query for this severity, `None` when no technique is needed.
    pub fn retrieval_query(&self) -> Option<&'static str> {
        match self {
            Severity::Crisis => Some(PANIC_QUERY),
            Severity::Elevated => Some(GROUNDING_QUERY),
            Severity::Mild => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_bands() {
        let bands: Vec<Severity> = (0..=5).map(Severity::from_intensity).collect();
        assert_eq!(
            bands,
            vec![
                Severity::Mild,
                Severity::Mild,
                Severity::Elevated,
                Severity::Elevated,
                Severity::Crisis,
                Severity::Crisis,
            ]
        );
    }

    #[test]
    fn queries_per_band() {
        assert_eq!(Severity::Crisis.retrieval_query(), Some(PANIC_QUERY));
        assert_eq!(Severity::Elevated.retrieval_query(), Some(GROUNDING_QUERY));
        assert_eq!(Severity::Mild.retrieval_query(), None);
    }
}
