// ============================================================
// Layer 3 — EMNIST Task Kind
// ============================================================
// The task decides what a batch looks like:
//
//   DigitRecognition → (pixels with a trailing channel dim, labels)
//   Autoencoder      → (1 - flattened pixels, same tensor again)
//
// The set is closed. Any other name is rejected when the config
// is parsed, long before a single record is read.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmnistTask {
    /// Classify the character; targets are the integer labels
    #[default]
    DigitRecognition,

    /// Reconstruct the inverted image; targets equal inputs
    Autoencoder,
}

impl EmnistTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmnistTask::DigitRecognition => "digit_recognition",
            EmnistTask::Autoencoder      => "autoencoder",
        }
    }
}

impl fmt::Display for EmnistTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmnistTask {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "digit_recognition" => Ok(EmnistTask::DigitRecognition),
            "autoencoder"       => Ok(EmnistTask::Autoencoder),
            other               => Err(PipelineError::UnknownTask(other.to_string())),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tasks() {
        assert_eq!("digit_recognition".parse::<EmnistTask>().unwrap(), EmnistTask::DigitRecognition);
        assert_eq!("autoencoder".parse::<EmnistTask>().unwrap(), EmnistTask::Autoencoder);
    }

    #[test]
    fn test_parse_rejects_unknown_task() {
        let err = "next_word_prediction".parse::<EmnistTask>().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTask(ref name) if name == "next_word_prediction"));
    }

    #[test]
    fn test_display_matches_serde_name() {
        for task in [EmnistTask::DigitRecognition, EmnistTask::Autoencoder] {
            let json = serde_json::to_string(&task).unwrap();
            assert_eq!(json, format!("\"{task}\""));
        }
    }

    #[test]
    fn test_serde_rejects_unknown_task() {
        assert!(serde_json::from_str::<EmnistTask>("\"segmentation\"").is_err());
    }
}
