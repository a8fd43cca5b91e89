//! # Architect Stage
//!
//! Plans the component structure that steers the Builder. An unparseable
//! response yields an empty structure - the Builder then falls back to the
//! raw manifests.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::decode::{decode_json, Decoded};
use crate::prompts;
use crate::stages::router::ExecutionStrategy;
use crate::stages::surveyor::VisualManifest;
use serde::{Deserialize, Serialize};

/// One planned component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentPlan {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub children: Vec<ComponentPlan>,
}

/// Architect output: a DOM-tree plan, possibly empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentStructure {
    #[serde(default)]
    pub components: Vec<ComponentPlan>,
    #[serde(default)]
    pub layout_notes: String,
}

impl ComponentStructure {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

pub struct ArchitectStage;

impl ArchitectStage {
    pub async fn run(
        invoker: &dyn ModelInvoker,
        manifests: &[VisualManifest],
        strategy: &ExecutionStrategy,
        instructions: &str,
    ) -> ComponentStructure {
        let manifests_json = serde_json::to_string(manifests).unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "Mode: {:?}\nInstructions: {}\nManifests:\n{}",
            strategy.mode, instructions, manifests_json
        );
        let opts = InvokeOptions::with_system(prompts::ARCHITECT_SYSTEM);
        let response = match invoker.invoke(&[PromptPart::text(prompt)], "", &opts).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "architect call failed, returning empty structure");
                return ComponentStructure::default();
            }
        };
        match decode_json::<ComponentStructure>(&response) {
            Decoded::Parsed(structure) => structure,
            Decoded::Malformed(_) => {
                tracing::warn!("architect output unparseable, returning empty structure");
                ComponentStructure::default()
            }
        }
    }
}
