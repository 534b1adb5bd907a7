use std::path::Path;

use anyhow::Result;
use calmkit_core::CONFIG_FILE;

const DEFAULT_CONFIG_YAML: &str = "user_id: interactive_user

data:
  mood_log: data/mood_log.json
  techniques_dir: data/techniques

classifier:
  use_llm: true
  model: gemini-2.5-flash
  max_output_tokens: 512
  temperature: 0.0
  timeout_secs: 20

responder:
  use_llm: false
  model: gemini-2.5-flash
  max_output_tokens: 512
  temperature: 0.7
  history_window: 7

provider:
  id: gemini
  type: gemini
  api_key: ${GOOGLE_API_KEY}
";

const SEED_TECHNIQUES: &[(&str, &str)] = &[
    (
        "box_breathing.txt",
        "Panic breathing exercise (box breathing)\n\
         Breathe in through your nose for 4 counts\n\
         Hold your breath for 4 counts\n\
         Breathe out slowly through your mouth for 4 counts\n\
         Hold for 4 counts and repeat four times",
    ),
    (
        "grounding_54321.txt",
        "Anxiety grounding technique (5-4-3-2-1)\n\
         Name 5 things you can see\n\
         Name 4 things you can touch\n\
         Name 3 things you can hear\n\
         Name 2 things you can smell\n\
         Name 1 thing you can taste",
    ),
    (
        "muscle_relaxation.txt",
        "Progressive muscle relaxation for stress\n\
         Tense the muscles in your feet for 5 seconds, then release\n\
         Move up to your calves, thighs, stomach, hands and shoulders\n\
         Notice the difference between tension and relaxation",
    ),
];

/// Write a default config and starter technique corpus under `root` if none exists.
/// Returns `true` when files were created.
pub fn ensure_skeleton(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, DEFAULT_CONFIG_YAML)?;

    let techniques_dir = root.join("data/techniques");
    std::fs::create_dir_all(&techniques_dir)?;
    for (name, text) in SEED_TECHNIQUES {
        let path = techniques_dir.join(name);
        if !path.exists() {
            std::fs::write(path, text)?;
        }
    }

    tracing::info!("created skeleton config at {}", config_path.display());
    Ok(true)
}
