//! # Pipeline Orchestrator
//!
//! Drives one full generation run: route, fan out the analysis stages,
//! plan, build, heal. Every optional stage is failure-isolated - a dead
//! Surveyor or Photographer degrades the run with a warning instead of
//! aborting it. The only hard failure is the wall-clock budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::autonomy::{split_marked_files, Autonomy};
use crate::client::ModelInvoker;
use crate::healing::{HealingConfig, HealingLoop, HealingResult, RegenerateFn, Renderer};
use crate::pipeline::budget::{Budget, PipelineError, DEFAULT_BUDGET_SECS};
use crate::pipeline::types::{AppFile, PipelineInput, PipelineOutput, StepTiming};
use crate::stages::photographer::{merge_assets, AssetExtractorStage, AssetMap, PhotographerStage};
use crate::stages::router::{mentions_3d, GenerationMode};
use crate::stages::surveyor::VisualManifest;
use crate::stages::{
    ArchitectStage, BuilderStage, BuildRequest, LiveEditorStage, PhysicistStage, RouterStage,
    SurveyorStage,
};
use crate::swarm::SwarmExecutor;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock allowance for one run
    pub budget: Duration,
    pub healing: HealingConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(DEFAULT_BUDGET_SECS),
            healing: HealingConfig::default(),
        }
    }
}

pub struct Orchestrator {
    invoker: Arc<dyn ModelInvoker>,
    renderer: Arc<dyn Renderer>,
    executor: SwarmExecutor,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(invoker: Arc<dyn ModelInvoker>, renderer: Arc<dyn Renderer>) -> Self {
        let executor = SwarmExecutor::new(Arc::clone(&invoker));
        Self {
            invoker,
            renderer,
            executor,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Swap the swarm executor, e.g. to attach web search or an event
    /// channel.
    pub fn with_executor(mut self, executor: SwarmExecutor) -> Self {
        self.executor = executor;
        self
    }

    #[tracing::instrument(skip_all, fields(uploads = input.files.len()))]
    pub async fn run(&self, input: &PipelineInput) -> Result<PipelineOutput, PipelineError> {
        let budget = Budget::start(self.config.budget);
        let mut warnings: Vec<String> = Vec::new();
        let mut timings: Vec<StepTiming> = Vec::new();

        // --- 1. Route ---
        budget.check("router")?;
        let step = Instant::now();
        let strategy = RouterStage::run(self.invoker.as_ref(), input).await;
        record(&mut timings, "router", step);
        tracing::info!(mode = ?strategy.mode, "routed");

        // --- 2. Autonomous delegation ---
        if strategy.mode == GenerationMode::ResearchAndBuild {
            budget.check("autonomy")?;
            let step = Instant::now();
            let result = Autonomy::run(&self.executor, input).await;
            record(&mut timings, "autonomy", step);

            let mut files = Vec::new();
            if result.success {
                if let Some(output) = &result.output {
                    files = split_marked_files(output);
                }
            } else if result.command.is_none() {
                warnings.push(format!(
                    "autonomous run failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ));
            }
            return Ok(PipelineOutput {
                files,
                strategy,
                manifests: Vec::new(),
                physics: Vec::new(),
                warnings,
                step_timings: timings,
                healing_result: None,
                command: result.command,
                suspended_state: result.suspended_state,
                assets: AssetMap::new(),
            });
        }

        // --- 3. Analysis fan-out ---
        budget.check("analysis")?;
        let step = Instant::now();
        let surveyor_fut = async {
            let mut manifests = Vec::new();
            for &i in &strategy.plan.measure_pixels {
                let Some(file) = input.files.get(i) else { continue };
                if !file.is_image() {
                    continue;
                }
                manifests.push(SurveyorStage::run(self.invoker.as_ref(), file, i).await?);
            }
            anyhow::Ok(manifests)
        };
        let physicist_fut = async {
            let mut specs = Vec::new();
            for &i in &strategy.plan.extract_physics {
                let Some(file) = input.files.get(i) else { continue };
                if !file.is_video() {
                    continue;
                }
                specs.extend(PhysicistStage::run(self.invoker.as_ref(), file, i).await?);
            }
            anyhow::Ok(specs)
        };
        let photographer_fut =
            PhotographerStage::run(self.invoker.as_ref(), &strategy.plan.asset_requests);

        let (manifests_res, physics_res, assets_res) =
            tokio::join!(surveyor_fut, physicist_fut, photographer_fut);
        record(&mut timings, "analysis", step);

        let manifests: Vec<VisualManifest> = match manifests_res {
            Ok(m) => m,
            Err(e) => {
                warnings.push(format!("surveyor stage failed: {e}"));
                Vec::new()
            }
        };
        let physics = match physics_res {
            Ok(p) => p,
            Err(e) => {
                warnings.push(format!("physicist stage failed: {e}"));
                Vec::new()
            }
        };
        let mut assets = match assets_res {
            Ok(a) => a,
            Err(e) => {
                warnings.push(format!("photographer stage failed: {e}"));
                AssetMap::new()
            }
        };

        // Extracted pixels always beat generated stand-ins
        let extracted = AssetExtractorStage::extract(&input.files, &manifests);
        merge_assets(&mut assets, extracted);

        // --- 4. Plan ---
        budget.check("architect")?;
        let step = Instant::now();
        let structure =
            ArchitectStage::run(self.invoker.as_ref(), &manifests, &strategy, &input.instructions)
                .await;
        record(&mut timings, "architect", step);

        // --- 5. Build ---
        budget.check("builder")?;
        let step = Instant::now();
        let use_3d_guidance = strategy.plan.enable_3d || mentions_3d(&input.instructions);
        let request = BuildRequest {
            structure: &structure,
            manifests: &manifests,
            physics: &physics,
            strategy: &strategy,
            current_code: input.current_code.as_deref(),
            instructions: &input.instructions,
            assets: &assets,
            repo_context: input.repo_context.as_ref(),
            use_3d_guidance,
        };
        let mut files = match BuilderStage::run(self.invoker.as_ref(), &request).await {
            Ok(files) => files,
            Err(e) => {
                warnings.push(format!("builder stage failed: {e}"));
                Vec::new()
            }
        };
        record(&mut timings, "builder", step);

        // --- 6. Heal ---
        let mut healing_result: Option<HealingResult> = None;
        let reference = input.first_image();
        if !input.skip_healing && !files.is_empty() {
            if let Some(reference) = reference {
                budget.check("healing")?;
                let step = Instant::now();
                let components: Vec<String> = manifests
                    .iter()
                    .flat_map(|m| m.component_names())
                    .collect();
                let regenerate = self.regenerate_fn(
                    &structure,
                    &manifests,
                    &physics,
                    &strategy,
                    input,
                    &assets,
                    use_3d_guidance,
                );
                let outcome = HealingLoop::new(self.config.healing.clone())
                    .run(
                        self.invoker.as_ref(),
                        self.renderer.as_ref(),
                        files,
                        reference,
                        &components,
                        regenerate,
                    )
                    .await;
                files = outcome.files;
                healing_result = Some(outcome.result);
                record(&mut timings, "healing", step);
            }
        }

        Ok(PipelineOutput {
            files,
            strategy,
            manifests,
            physics,
            warnings,
            step_timings: timings,
            healing_result,
            command: None,
            suspended_state: None,
            assets,
        })
    }

    /// Apply one targeted instruction to an already-generated file set.
    pub async fn run_live_edit(
        &self,
        files: &[AppFile],
        instruction: &str,
    ) -> anyhow::Result<Vec<AppFile>> {
        LiveEditorStage::run(self.invoker.as_ref(), files, instruction).await
    }

    /// Build the regeneration callback the healing loop calls on a
    /// `regenerate` recommendation: a fresh Builder pass with the critique
    /// appended to the instructions.
    #[allow(clippy::too_many_arguments)]
    fn regenerate_fn(
        &self,
        structure: &crate::stages::architect::ComponentStructure,
        manifests: &[VisualManifest],
        physics: &[crate::stages::physicist::MotionSpec],
        strategy: &crate::stages::router::ExecutionStrategy,
        input: &PipelineInput,
        assets: &AssetMap,
        use_3d_guidance: bool,
    ) -> RegenerateFn {
        let invoker = Arc::clone(&self.invoker);
        let structure = structure.clone();
        let manifests = manifests.to_vec();
        let physics = physics.to_vec();
        let strategy = strategy.clone();
        let current_code = input.current_code.clone();
        let instructions = input.instructions.clone();
        let assets = assets.clone();
        let repo_context = input.repo_context.clone();

        Box::new(move |feedback: String| {
            let invoker = Arc::clone(&invoker);
            let structure = structure.clone();
            let manifests = manifests.clone();
            let physics = physics.clone();
            let strategy = strategy.clone();
            let current_code = current_code.clone();
            let instructions = instructions.clone();
            let assets = assets.clone();
            let repo_context = repo_context.clone();
            Box::pin(async move {
                let instructions = format!(
                    "{instructions}\n\nFidelity feedback from the previous attempt:\n{feedback}"
                );
                let request = BuildRequest {
                    structure: &structure,
                    manifests: &manifests,
                    physics: &physics,
                    strategy: &strategy,
                    current_code: current_code.as_deref(),
                    instructions: &instructions,
                    assets: &assets,
                    repo_context: repo_context.as_ref(),
                    use_3d_guidance,
                };
                BuilderStage::run(invoker.as_ref(), &request).await
            })
        })
    }
}

fn record(timings: &mut Vec<StepTiming>, step: &str, started: Instant) {
    timings.push(StepTiming {
        step: step.to_string(),
        ms: started.elapsed().as_millis() as u64,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::UploadedFile;
    use crate::testutil::ScriptedInvoker;
    use anyhow::Result;
    use async_trait::async_trait;

    struct OkRenderer;

    #[async_trait]
    impl Renderer for OkRenderer {
        async fn render(&self, _files: &[AppFile]) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
    }

    fn orchestrator(invoker: Arc<ScriptedInvoker>) -> Orchestrator {
        Orchestrator::new(invoker, Arc::new(OkRenderer))
    }

    fn image_input(instructions: &str) -> PipelineInput {
        PipelineInput::new(
            vec![UploadedFile::new(vec![9, 9, 9], "image/png")],
            instructions,
        )
    }

    const ACCEPT: &str = r#"{"fidelity_score": 95, "recommendation": "accept", "discrepancies": []}"#;

    #[tokio::test]
    async fn test_full_run_from_single_image() {
        // Malformed router output falls back to create + measure all images
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("this is not a strategy".into()),
            Ok(r##"{"canvas": {"width": 800, "height": 600, "background": "#000"}, "tree": {"node_type": "Hero"}}"##.into()),
            Ok(r#"{"components": [{"name": "Hero"}], "layout_notes": "single column"}"#.into()),
            Ok("```tsx\nexport default function App() { return <Hero />; }\n```".into()),
            Ok(ACCEPT.into()),
        ]));
        let orch = orchestrator(invoker.clone());

        let output = orch.run(&image_input("clone this landing page")).await.unwrap();

        assert_eq!(output.strategy.mode, GenerationMode::Create);
        assert_eq!(output.strategy.plan.measure_pixels, vec![0]);
        assert_eq!(output.manifests.len(), 1);
        assert_eq!(output.manifests[0].source_index, 0);
        assert_eq!(output.files.len(), 1);
        assert!(output.files[0].path.ends_with("App.tsx"));
        let healing = output.healing_result.unwrap();
        assert_eq!(healing.fidelity_score, 95);
        assert_eq!(
            healing.stop_reason,
            crate::healing::StopReason::ThresholdMet
        );
        assert!(output.warnings.is_empty());
        assert_eq!(invoker.call_count(), 5);
    }

    #[tokio::test]
    async fn test_surveyor_failure_degrades_to_warning() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("garbage".into()),
            Err("vision service down".into()),
            Ok("garbage".into()),
            Ok("```tsx\nconst x = 1;\n```".into()),
        ]));
        let orch = orchestrator(invoker);
        let mut input = image_input("clone this");
        input.skip_healing = true;

        let output = orch.run(&input).await.unwrap();

        assert!(output.manifests.is_empty());
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("surveyor") && w.contains("vision service down")));
        // The run still produced code
        assert_eq!(output.files.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_aborts_before_router() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![]));
        let orch = orchestrator(invoker.clone()).with_config(OrchestratorConfig {
            budget: Duration::ZERO,
            healing: HealingConfig::default(),
        });

        let err = orch.run(&image_input("anything")).await.unwrap_err();
        assert!(err.to_string().contains("router"));
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_reference_image_skips_healing() {
        // Text-only input: nothing to measure, nothing to heal against
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("garbage".into()),
            Ok("garbage".into()),
            Ok("```tsx\nconst x = 1;\n```".into()),
        ]));
        let orch = orchestrator(invoker.clone());
        let input = PipelineInput::new(vec![], "build a todo app");

        let output = orch.run(&input).await.unwrap();

        assert!(output.healing_result.is_none());
        assert_eq!(output.files.len(), 1);
        // router + architect + builder, no surveyor and no critic
        assert_eq!(invoker.call_count(), 3);
    }

    #[tokio::test]
    async fn test_research_and_build_delegates_to_swarm() {
        let code = "// FILE: src/App.tsx\nexport default function App() { return <Board />; }\n\n\
            // FILE: src/Board.tsx\nexport const Board = () => <div className=\"board\" />;";
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok(r#"{"mode": "research_and_build", "plan": {}}"#.into()),
            Ok("findings: kanban boards need columns".into()),
            Ok("plan: Board with Column children".into()),
            Ok("```ts\ntest('renders board', () => {});\n```".into()),
            Ok(format!("```tsx\n{code}\n```")),
            Ok(r#"{"verdict": "pass"}"#.into()),
        ]));
        let orch = orchestrator(invoker);

        let output = orch
            .run(&PipelineInput::new(vec![], "research and build a kanban app"))
            .await
            .unwrap();

        assert_eq!(output.strategy.mode, GenerationMode::ResearchAndBuild);
        assert_eq!(output.files.len(), 2);
        assert_eq!(output.files[0].path, "src/App.tsx");
        assert_eq!(output.files[1].path, "src/Board.tsx");
        assert!(output.command.is_none());
        assert!(output.warnings.is_empty());
    }
}
