//! # Vision Healing Loop
//!
//! Iterative critique -> patch/regenerate cycle that closes the gap
//! between the rendered output and the reference image. Each iteration
//! renders the current files, asks the critic for a fidelity score and
//! discrepancies, then either stops, patches the implicated components in
//! place, or regenerates from scratch with the critique as feedback.

use crate::client::ModelInvoker;
use crate::pipeline::types::{AppFile, UploadedFile};
use crate::stages::critic::{Critique, Discrepancy, Recommendation};
use crate::stages::CriticStage;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Rendering/screenshot collaborator: turns a file set into an image.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, files: &[AppFile]) -> Result<Vec<u8>>;
}

/// Regeneration callback; the loop hands it the critique feedback text and
/// gets a fresh file set back (normally a Builder re-run).
pub type RegenerateFn = Box<dyn Fn(String) -> BoxFuture<'static, Result<Vec<AppFile>>> + Send + Sync>;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ThresholdMet,
    MaxIterations,
    Error,
    NoReference,
}

/// Summary of one healing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingResult {
    /// Last fidelity score observed (0-100)
    pub fidelity_score: u8,
    pub iterations: u32,
    pub stop_reason: StopReason,
    /// True only when the final accepted iteration came from targeted
    /// patching rather than full regeneration
    pub used_patching: bool,
}

/// Files plus the healing summary.
#[derive(Debug, Clone)]
pub struct HealingOutcome {
    pub files: Vec<AppFile>,
    pub result: HealingResult,
}

#[derive(Debug, Clone)]
pub struct HealingConfig {
    /// Score at or above which output is accepted
    pub fidelity_target: u8,
    pub max_iterations: u32,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            fidelity_target: 90,
            max_iterations: 3,
        }
    }
}

pub struct HealingLoop {
    config: HealingConfig,
}

impl HealingLoop {
    pub fn new(config: HealingConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(skip_all, fields(target = self.config.fidelity_target))]
    pub async fn run(
        &self,
        invoker: &dyn ModelInvoker,
        renderer: &dyn Renderer,
        files: Vec<AppFile>,
        reference: &UploadedFile,
        components: &[String],
        regenerate: RegenerateFn,
    ) -> HealingOutcome {
        if reference.data.is_empty() {
            return HealingOutcome {
                files,
                result: HealingResult {
                    fidelity_score: 0,
                    iterations: 0,
                    stop_reason: StopReason::NoReference,
                    used_patching: false,
                },
            };
        }

        let mut current = files;
        let mut last_score: u8 = 0;
        // Provenance of the current file set: true when the previous
        // iteration produced it by targeted patching
        let mut came_from_patching = false;

        for iteration in 1..=self.config.max_iterations {
            let rendered = match renderer.render(&current).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "render failed, stopping healing");
                    return self.stop(current, last_score, iteration - 1, StopReason::Error, false);
                }
            };

            let critique = match CriticStage::run(
                invoker,
                (reference.mime.as_str(), &reference.data),
                ("image/png", &rendered),
                components,
            )
            .await
            {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "critique failed, stopping healing");
                    return self.stop(current, last_score, iteration - 1, StopReason::Error, false);
                }
            };
            last_score = critique.fidelity_score;
            tracing::debug!(
                iteration,
                score = critique.fidelity_score,
                recommendation = ?critique.recommendation,
                "healing iteration scored"
            );

            if critique.recommendation == Recommendation::Accept
                || critique.fidelity_score >= self.config.fidelity_target
            {
                return self.stop(
                    current,
                    last_score,
                    iteration,
                    StopReason::ThresholdMet,
                    came_from_patching,
                );
            }
            if iteration == self.config.max_iterations {
                // Out of budget; do not spend another generation pass
                return self.stop(current, last_score, iteration, StopReason::MaxIterations, false);
            }

            let patched = match critique.recommendation {
                Recommendation::Refine if is_patchable(&critique, &current) => {
                    current = apply_patches(current, &critique.discrepancies);
                    came_from_patching = true;
                    true
                }
                _ => false,
            };
            if !patched {
                match regenerate(critique.feedback_text()).await {
                    Ok(fresh) => {
                        current = fresh;
                        came_from_patching = false;
                    }
                    Err(e) => {
                        tracing::warn!(iteration, error = %e, "regeneration failed, stopping healing");
                        return self.stop(current, last_score, iteration, StopReason::Error, false);
                    }
                }
            }
        }

        self.stop(
            current,
            last_score,
            self.config.max_iterations,
            StopReason::MaxIterations,
            false,
        )
    }

    fn stop(
        &self,
        files: Vec<AppFile>,
        fidelity_score: u8,
        iterations: u32,
        stop_reason: StopReason,
        used_patching: bool,
    ) -> HealingOutcome {
        HealingOutcome {
            files,
            result: HealingResult {
                fidelity_score,
                iterations,
                stop_reason,
                used_patching,
            },
        }
    }
}

/// Correction data is structured enough for targeted patching when at
/// least one discrepancy names a component and carries a correction whose
/// search text actually occurs in some file.
fn is_patchable(critique: &Critique, files: &[AppFile]) -> bool {
    critique.discrepancies.iter().any(|d| {
        d.component.is_some()
            && d.correction
                .as_ref()
                .map(|c| {
                    !c.search.is_empty() && files.iter().any(|f| f.content.contains(&c.search))
                })
                .unwrap_or(false)
    })
}

/// Apply every structured correction, first occurrence per file.
fn apply_patches(mut files: Vec<AppFile>, discrepancies: &[Discrepancy]) -> Vec<AppFile> {
    for d in discrepancies {
        let (Some(component), Some(correction)) = (&d.component, &d.correction) else {
            continue;
        };
        if correction.search.is_empty() {
            continue;
        }
        if let Some(file) = files
            .iter_mut()
            .find(|f| f.content.contains(&correction.search))
        {
            tracing::debug!(component = %component, path = %file.path, "patching component");
            file.content = file
                .content
                .replacen(&correction.search, &correction.replace, 1);
        }
    }
    files
}
