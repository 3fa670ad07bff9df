//! Shared pipeline types.

use serde::{Deserialize, Serialize};

/// Outcome of one validation step.
///
/// A verdict is only produced when the assembler actually ran and was
/// observed; infrastructure failures (missing binary, I/O errors) surface as
/// errors instead, so `Invalid` always means "the tool rejected this
/// listing".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    /// The assembler accepted the listing.
    Valid,
    /// The assembler rejected the listing. `message` is the captured
    /// diagnostic text, never reworded, and never empty.
    Invalid { message: String },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_serializes_with_tag() {
        let json = serde_json::to_string(&Verdict::Invalid {
            message: "Nonsense in BASIC".to_string(),
        })
        .expect("serialize");
        assert!(json.contains("\"verdict\":\"invalid\""));
        assert!(json.contains("Nonsense in BASIC"));

        let back: Verdict = serde_json::from_str(&json).expect("deserialize");
        assert!(!back.is_valid());
    }
}
