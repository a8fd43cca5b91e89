//! # Critic Stage
//!
//! Scores how closely a rendered result matches the reference image and
//! recommends what the healing loop should do next.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::decode::{decode_json, Decoded};
use crate::prompts;
use anyhow::bail;
use serde::{Deserialize, Serialize};

/// What the critic wants done with the current output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Accept,
    Refine,
    Regenerate,
}

/// An exact textual correction for one discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactCorrection {
    pub search: String,
    pub replace: String,
}

/// One visual mismatch between reference and render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Component implicated, when the critic can name one
    #[serde(default)]
    pub component: Option<String>,
    /// "blocking", "major", "minor"
    #[serde(default)]
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub correction: Option<ExactCorrection>,
}

/// Full critique of one healing iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Critique {
    /// 0-100 visual closeness
    pub fidelity_score: u8,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub discrepancies: Vec<Discrepancy>,
}

impl Critique {
    /// Human-readable critique text for regeneration feedback
    pub fn feedback_text(&self) -> String {
        let mut text = format!("Fidelity score: {}/100. Fix these issues:\n", self.fidelity_score);
        for d in &self.discrepancies {
            text.push_str(&format!(
                "- [{}] {}{}\n",
                d.severity,
                d.component
                    .as_deref()
                    .map(|c| format!("{c}: "))
                    .unwrap_or_default(),
                d.description
            ));
        }
        text
    }
}

pub struct CriticStage;

impl CriticStage {
    /// Compare reference vs. render. Unlike the generator stages, an
    /// unparseable critique is an error: the healing loop cannot act on a
    /// score it does not have.
    pub async fn run(
        invoker: &dyn ModelInvoker,
        reference: (&str, &[u8]),
        rendered: (&str, &[u8]),
        components: &[String],
    ) -> anyhow::Result<Critique> {
        let parts = vec![
            PromptPart::text(format!(
                "First image is the reference, second is the current render.\nComponents: {}",
                components.join(", ")
            )),
            PromptPart::inline(reference.0, reference.1),
            PromptPart::inline(rendered.0, rendered.1),
        ];
        let opts = InvokeOptions::with_system(prompts::CRITIC_SYSTEM);
        let response = invoker.invoke(&parts, "", &opts).await?;
        match decode_json::<Critique>(&response) {
            Decoded::Parsed(critique) => Ok(critique),
            Decoded::Malformed(raw) => {
                bail!("critic produced unusable output: {}", raw.chars().take(200).collect::<String>())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critique_deserializes() {
        let raw = r#"{"fidelity_score": 82, "recommendation": "refine",
            "discrepancies": [{"component": "Hero", "severity": "major",
            "description": "wrong background",
            "correction": {"search": "bg-red", "replace": "bg-blue"}}]}"#;
        let critique: Critique = serde_json::from_str(raw).unwrap();
        assert_eq!(critique.fidelity_score, 82);
        assert_eq!(critique.recommendation, Recommendation::Refine);
        assert_eq!(critique.discrepancies.len(), 1);
    }

    #[test]
    fn test_feedback_text_lists_discrepancies() {
        let critique = Critique {
            fidelity_score: 60,
            recommendation: Recommendation::Regenerate,
            discrepancies: vec![Discrepancy {
                component: Some("Nav".into()),
                severity: "blocking".into(),
                description: "missing entirely".into(),
                correction: None,
            }],
        };
        let text = critique.feedback_text();
        assert!(text.contains("60/100"));
        assert!(text.contains("Nav: missing entirely"));
    }
}
