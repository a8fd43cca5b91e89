//! # Agent Swarm Executor
//!
//! Runs a declarative swarm through strictly ordered phases:
//! RESEARCH -> PLANNING -> QA_ENGINEERING -> CODING -> EXECUTION.
//! Within a phase agents execute sequentially, since each agent's output
//! may feed the next. A tester that requests a remote command suspends the
//! run (not a failure); `resume_swarm` picks it back up with the command's
//! feedback, possibly in a different process.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::decode::{decode_json, extract_code, Decoded};
use crate::pipeline::types::RepoContext;
use crate::swarm::context::WorkflowContext;
use crate::swarm::events::{SwarmEvent, SwarmEventKind};
use crate::swarm::search::{format_results, WebSearch};
use crate::swarm::types::{
    AgentFeedback, AgentRole, AgentSwarm, AgentTaskResult, Command, CommandKind, FabricatedAgent,
    SuspendedState, SwarmOutcome,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Marker embedded in the TDD-gate error so callers can distinguish it.
pub const ZERO_BUG_MARKER: &str = "zero-bug";

/// Executor tuning knobs.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Model override for agent calls; empty uses the adapter default
    pub model: String,
    /// Generated tests are truncated to this many chars before injection
    pub test_truncate_chars: usize,
    /// Final code below this length fails the empty-output check
    pub min_code_chars: usize,
    /// Max web-search results appended to an agent prompt
    pub search_max_results: u32,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            test_truncate_chars: 4000,
            min_code_chars: 50,
            search_max_results: 5,
        }
    }
}

/// How one tester response was interpreted.
enum TesterAction {
    Pass,
    Fail(String),
    Suspend(Command, SuspendedState),
}

/// Shape testers are asked to respond in.
#[derive(Debug, Deserialize)]
struct TesterVerdict {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct SwarmExecutor {
    invoker: Arc<dyn ModelInvoker>,
    search: Option<Arc<dyn WebSearch>>,
    config: SwarmConfig,
    event_tx: Option<mpsc::Sender<SwarmEvent>>,
}

impl SwarmExecutor {
    pub fn new(invoker: Arc<dyn ModelInvoker>) -> Self {
        Self {
            invoker,
            search: None,
            config: SwarmConfig::default(),
            event_tx: None,
        }
    }

    /// Enable the web-search capability for search-capable agents
    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_config(mut self, config: SwarmConfig) -> Self {
        self.config = config;
        self
    }

    /// Set event channel for streaming progress events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<SwarmEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    async fn emit(&self, event: SwarmEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run the full phase sequence on a fresh context.
    #[tracing::instrument(skip(self, swarm, repo_context), fields(swarm_id = %swarm.id))]
    pub async fn run_swarm(
        &self,
        swarm: &AgentSwarm,
        initial_input: &str,
        repo_context: Option<&RepoContext>,
    ) -> AgentTaskResult {
        let mut ctx = WorkflowContext::new();
        let outcome = self
            .run_phases(swarm, initial_input, repo_context, &mut ctx)
            .await;
        self.emit(SwarmEvent::new(
            match &outcome {
                SwarmOutcome::Succeeded { .. } => SwarmEventKind::SwarmCompleted,
                SwarmOutcome::Suspended(..) => SwarmEventKind::Suspended,
                SwarmOutcome::Failed { .. } => SwarmEventKind::SwarmFailed,
            },
            &swarm.id,
        ))
        .await;
        outcome.into_task_result()
    }

    async fn run_phases(
        &self,
        swarm: &AgentSwarm,
        initial_input: &str,
        repo_context: Option<&RepoContext>,
        ctx: &mut WorkflowContext,
    ) -> SwarmOutcome {
        // === RESEARCH (non-critical) ===
        self.emit(SwarmEvent::new(SwarmEventKind::PhaseStarted, "research"))
            .await;
        let researchers: Vec<&FabricatedAgent> =
            swarm.agents_with_role(AgentRole::Researcher).collect();
        for agent in researchers {
            let task = format!("Research the following task:\n{initial_input}");
            match self.run_agent(agent, &task, ctx).await {
                Ok(output) => {
                    ctx.log(format!("research agent {} completed", agent.name));
                    ctx.remember(&agent.name, output);
                }
                Err(e) => {
                    // Research failures never block progress
                    tracing::warn!(agent = %agent.name, error = %e, "research agent failed");
                    ctx.log(format!("research agent {} failed: {e}", agent.name));
                }
            }
        }

        // === PLANNING (critical) ===
        self.emit(SwarmEvent::new(SwarmEventKind::PhaseStarted, "planning"))
            .await;
        let mut plan = String::new();
        let mut reasoning = String::new();
        let architects: Vec<&FabricatedAgent> =
            swarm.agents_with_role(AgentRole::Architect).collect();
        for agent in architects {
            let research_block = research_context(ctx, swarm);
            let task = format!(
                "Task:\n{initial_input}\n\n{research_block}Plan so far:\n{}",
                if plan.is_empty() { "(none)" } else { plan.as_str() }
            );
            match self.run_agent(agent, &task, ctx).await {
                Ok(output) => {
                    if !plan.is_empty() {
                        plan.push_str("\n\n");
                    }
                    plan.push_str(&output);
                    reasoning.push_str(&format!("[{}] {}\n", agent.name, summarize(&output)));
                    ctx.remember(&agent.name, output);
                }
                Err(e) => {
                    return SwarmOutcome::failed(
                        format!("planning agent {} failed: {e}", agent.name),
                        format!(
                            "Reformulate the task or simplify the directive of agent {} and retry",
                            agent.name
                        ),
                    );
                }
            }
        }

        // === QA_ENGINEERING ===
        self.emit(SwarmEvent::new(SwarmEventKind::PhaseStarted, "qa"))
            .await;
        let requires_tdd = repo_context
            .map(|rc| rc.critical_files_require_tests && references_critical_file(initial_input, &rc.critical_files))
            .unwrap_or(false);
        let mut tests: Option<String> = None;
        let qa_agents: Vec<&FabricatedAgent> =
            swarm.agents_with_role(AgentRole::QaEngineer).collect();
        for agent in qa_agents {
            let task = format!(
                "Write tests covering this plan before any code exists:\n{plan}\n\nTask:\n{initial_input}"
            );
            match self.run_agent(agent, &task, ctx).await {
                Ok(output) if !extract_code(&output).trim().is_empty() => {
                    let code = extract_code(&output);
                    ctx.remember(&agent.name, code.clone());
                    tests = Some(match tests.take() {
                        Some(mut acc) => {
                            acc.push_str("\n\n");
                            acc.push_str(&code);
                            acc
                        }
                        None => code,
                    });
                }
                Ok(_) => {
                    ctx.log(format!("qa agent {} produced no test content", agent.name));
                }
                Err(e) => {
                    if requires_tdd {
                        return self.zero_bug_failure(&agent.name, &e.to_string());
                    }
                    // QA is otherwise non-critical
                    tracing::warn!(agent = %agent.name, error = %e, "qa agent failed");
                    ctx.log(format!("qa agent {} failed: {e}", agent.name));
                }
            }
        }
        if requires_tdd && tests.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return self.zero_bug_failure("qa phase", "no usable test content was produced");
        }
        if let Some(test_code) = &tests {
            plan.push_str("\n\nGenerated tests (these MUST pass):\n");
            plan.push_str(truncate(test_code, self.config.test_truncate_chars));
        }

        // === CODING (critical) ===
        self.emit(SwarmEvent::new(SwarmEventKind::PhaseStarted, "coding"))
            .await;
        let coders: Vec<&FabricatedAgent> = swarm.agents_with_role(AgentRole::Coder).collect();
        for agent in coders {
            let prior = ctx.generated_code().to_string();
            let task = format!(
                "Plan:\n{plan}\n\nTask:\n{initial_input}\n\nCode written so far:\n{}",
                if prior.is_empty() { "(none)" } else { prior.as_str() }
            );
            match self.run_agent(agent, &task, ctx).await {
                Ok(output) => {
                    // Later agents must see only code, not conversation
                    let code = extract_code(&output);
                    ctx.remember(&agent.name, code.clone());
                    ctx.append_code(&code);
                }
                Err(e) => {
                    return SwarmOutcome::failed(
                        format!("coding agent {} failed: {e}", agent.name),
                        format!("Retry the run or adjust the directive of agent {}", agent.name),
                    );
                }
            }
        }

        let code = ctx.generated_code().to_string();
        if code.trim().len() < self.config.min_code_chars {
            return SwarmOutcome::failed(
                "empty output: swarm completed all phases but produced no usable code",
                "Retry with more specific instructions or add a coder agent",
            );
        }

        // === EXECUTION ===
        self.emit(SwarmEvent::new(SwarmEventKind::PhaseStarted, "execution"))
            .await;
        match self.run_execution_phase(swarm, ctx, &code, &[]).await {
            ExecutionResult::AllPassed => SwarmOutcome::Succeeded {
                output: code,
                reasoning_summary: if reasoning.is_empty() {
                    None
                } else {
                    Some(reasoning)
                },
                artifacts: ctx.files.clone(),
            },
            ExecutionResult::Outcome(outcome) => outcome,
        }
    }

    fn zero_bug_failure(&self, who: &str, detail: &str) -> SwarmOutcome {
        SwarmOutcome::failed(
            format!(
                "{ZERO_BUG_MARKER} gate: this change touches critical files but {who} produced no tests ({detail})"
            ),
            "Critical files require tests before coding; fix the QA engineer directive and retry",
        )
    }

    /// Walk the testers in original order, skipping already-completed ones.
    async fn run_execution_phase(
        &self,
        swarm: &AgentSwarm,
        ctx: &mut WorkflowContext,
        code: &str,
        completed: &[String],
    ) -> ExecutionResult {
        let mut done: Vec<String> = completed.to_vec();
        for agent in swarm.testers() {
            if done.iter().any(|id| id == &agent.id) {
                continue;
            }
            let task = format!(
                "Verify this generated code:\n{code}\n\nRespond with JSON. Either a verdict \
                {{\"verdict\": \"pass\"|\"fail\", \"error\": \"...\"}} or a command request \
                {{\"command\": \"shell\"|\"screenshot\"|\"browser_log\", \"arguments\": \"...\", \"timeout\": secs}}."
            );
            let response = match self.run_agent(agent, &task, ctx).await {
                Ok(r) => r,
                Err(e) => {
                    return ExecutionResult::Outcome(SwarmOutcome::failed(
                        format!("tester {} failed: {e}", agent.name),
                        format!("Retry the run; tester {} could not be reached", agent.name),
                    ));
                }
            };
            match self.interpret_tester(swarm, agent, &response, ctx, code, &done) {
                TesterAction::Pass => done.push(agent.id.clone()),
                TesterAction::Fail(error) => {
                    return ExecutionResult::Outcome(SwarmOutcome::Failed {
                        error,
                        retry_suggestion: Some(format!(
                            "Address the issues reported by tester {} and retry",
                            agent.name
                        )),
                    });
                }
                TesterAction::Suspend(command, state) => {
                    self.emit(
                        SwarmEvent::new(SwarmEventKind::Suspended, &agent.name)
                            .with_data(serde_json::json!({ "command": command.command })),
                    )
                    .await;
                    return ExecutionResult::Outcome(SwarmOutcome::Suspended(command, state));
                }
            }
        }
        ExecutionResult::AllPassed
    }

    /// Interpret a tester response as exactly one of: command request,
    /// fail verdict, or pass. Free text that parses as nothing counts as
    /// an inconclusive pass and is logged as such.
    fn interpret_tester(
        &self,
        swarm: &AgentSwarm,
        agent: &FabricatedAgent,
        response: &str,
        ctx: &mut WorkflowContext,
        code: &str,
        completed: &[String],
    ) -> TesterAction {
        match decode_json::<TesterVerdict>(response) {
            Decoded::Parsed(v) => {
                if let Some(kind_raw) = v.command {
                    let Some(kind) = CommandKind::parse(&kind_raw) else {
                        return TesterAction::Fail(format!(
                            "tester {} requested unsupported command type `{kind_raw}`",
                            agent.name
                        ));
                    };
                    let command = Command {
                        id: command_id(&agent.id),
                        kind,
                        command: v.arguments.unwrap_or_default(),
                        timeout_secs: v.timeout.unwrap_or(120),
                    };
                    let state = SuspendedState {
                        swarm_id: swarm.id.clone(),
                        waiting_agent: agent.id.clone(),
                        command: command.clone(),
                        memory: ctx.memory.clone(),
                        generated_code: code.to_string(),
                        completed_testers: completed.to_vec(),
                    };
                    return TesterAction::Suspend(command, state);
                }
                match v.verdict.as_deref().map(str::to_lowercase).as_deref() {
                    Some("fail") => TesterAction::Fail(v.error.unwrap_or_else(|| {
                        format!("tester {} reported failure without detail", agent.name)
                    })),
                    _ => TesterAction::Pass,
                }
            }
            Decoded::Malformed(_) => {
                // Inconclusive verifier output counts as a pass, but is
                // logged so the leniency stays visible.
                ctx.log(format!(
                    "tester {} returned free text; counting as inconclusive pass",
                    agent.name
                ));
                TesterAction::Pass
            }
        }
    }

    /// Resume a suspended run with the feedback of the executed command.
    #[tracing::instrument(skip(self, swarm, suspended, feedback), fields(swarm_id = %swarm.id))]
    pub async fn resume_swarm(
        &self,
        swarm: &AgentSwarm,
        suspended: &SuspendedState,
        feedback: &AgentFeedback,
    ) -> AgentTaskResult {
        self.emit(SwarmEvent::new(
            SwarmEventKind::Resumed,
            &suspended.waiting_agent,
        ))
        .await;

        let mut ctx = WorkflowContext::from_memory(suspended.memory.clone());
        let code = suspended.generated_code.clone();

        let Some(agent) = swarm
            .agents
            .iter()
            .find(|a| a.id == suspended.waiting_agent)
        else {
            return SwarmOutcome::failed(
                format!(
                    "suspended agent `{}` is not part of swarm `{}`",
                    suspended.waiting_agent, swarm.id
                ),
                "Resume with the same swarm definition that produced the suspension",
            )
            .into_task_result();
        };

        let task = format!(
            "You requested execution of a command.\nCommand ({:?}): {}\nExit code: {}\nOutput:\n{}\nScreenshot captured: {}\n\n\
            Generated code under review:\n{code}\n\n\
            Respond with JSON. Either a verdict {{\"verdict\": \"pass\"|\"fail\", \"error\": \"...\"}} \
            or another command request {{\"command\", \"arguments\", \"timeout\"}}.",
            suspended.command.kind,
            suspended.command.command,
            feedback.exit_code,
            feedback.output,
            feedback.screenshot.is_some(),
        );

        let response = match self.run_agent(agent, &task, &mut ctx).await {
            Ok(r) => r,
            Err(e) => {
                return SwarmOutcome::failed(
                    format!("tester {} failed during resume: {e}", agent.name),
                    format!("Retry resumption; tester {} could not be reached", agent.name),
                )
                .into_task_result();
            }
        };

        let outcome = match self.interpret_tester(
            swarm,
            agent,
            &response,
            &mut ctx,
            &code,
            &suspended.completed_testers,
        ) {
            // Commands may chain: suspend again from the same agent
            TesterAction::Suspend(command, state) => SwarmOutcome::Suspended(command, state),
            TesterAction::Fail(error) => SwarmOutcome::Failed {
                error,
                retry_suggestion: Some(format!(
                    "Address the issues reported by tester {} and retry",
                    agent.name
                )),
            },
            TesterAction::Pass => {
                let mut completed = suspended.completed_testers.clone();
                completed.push(agent.id.clone());
                match self
                    .run_execution_phase(swarm, &mut ctx, &code, &completed)
                    .await
                {
                    ExecutionResult::AllPassed => SwarmOutcome::Succeeded {
                        output: code,
                        reasoning_summary: None,
                        artifacts: ctx.files.clone(),
                    },
                    ExecutionResult::Outcome(outcome) => outcome,
                }
            }
        };
        outcome.into_task_result()
    }

    /// One agent's main task, with the optional search sub-query first.
    async fn run_agent(
        &self,
        agent: &FabricatedAgent,
        task: &str,
        ctx: &mut WorkflowContext,
    ) -> anyhow::Result<String> {
        self.emit(SwarmEvent::new(SwarmEventKind::AgentStarted, &agent.name))
            .await;

        let mut task = task.to_string();
        if agent.can_search() {
            if let Some(search) = &self.search {
                let probe = format!(
                    "Task: {task}\n\nDo you need to search the web before starting? \
                    Respond with the single word SKIP, or with one search query."
                );
                match self
                    .invoker
                    .invoke(
                        &[PromptPart::text(probe)],
                        &self.config.model,
                        &InvokeOptions::default(),
                    )
                    .await
                {
                    Ok(reply) if reply.contains("SKIP") => {
                        ctx.log(format!("agent {} skipped web search", agent.name));
                    }
                    Ok(query) => {
                        let query = query.trim();
                        match search.search(query, self.config.search_max_results).await {
                            Ok(results) => {
                                task = format!("{}\n\n{task}", format_results(query, &results));
                            }
                            Err(e) => {
                                tracing::warn!(agent = %agent.name, error = %e, "web search failed, continuing without results");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(agent = %agent.name, error = %e, "search probe failed, continuing without search");
                    }
                }
            }
        }

        let opts = InvokeOptions::with_system(&agent.directive);
        let result = self
            .invoker
            .invoke(&[PromptPart::text(task)], &self.config.model, &opts)
            .await;
        self.emit(SwarmEvent::new(
            match result {
                Ok(_) => SwarmEventKind::AgentCompleted,
                Err(_) => SwarmEventKind::AgentFailed,
            },
            &agent.name,
        ))
        .await;
        result
    }
}

enum ExecutionResult {
    AllPassed,
    Outcome(SwarmOutcome),
}

/// Does the initial input textually reference one of the critical files,
/// by filename or full path, case-insensitive?
fn references_critical_file(input: &str, critical_files: &[String]) -> bool {
    let haystack = input.to_lowercase();
    critical_files.iter().any(|path| {
        let full = path.to_lowercase();
        let filename = full.rsplit('/').next().unwrap_or(&full).to_string();
        haystack.contains(&full) || haystack.contains(&filename)
    })
}

fn research_context(ctx: &WorkflowContext, swarm: &AgentSwarm) -> String {
    let mut block = String::new();
    for agent in swarm.agents_with_role(AgentRole::Researcher) {
        if let Some(output) = ctx.memory.get(&agent.name) {
            block.push_str(&format!("Research by {}:\n{}\n\n", agent.name, output));
        }
    }
    block
}

fn summarize(text: &str) -> String {
    truncate(text, 500).to_string()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn command_id(agent_id: &str) -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("cmd-{agent_id}-{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedInvoker;
    use std::sync::Arc;

    fn swarm(agents: Vec<FabricatedAgent>) -> AgentSwarm {
        AgentSwarm {
            id: "swarm-test".into(),
            agents,
        }
    }

    fn agent(id: &str, role: AgentRole) -> FabricatedAgent {
        FabricatedAgent::new(id, id, role, format!("You are {id}."))
    }

    const CODE: &str =
        "export default function App() { return <main className=\"hero\">hello</main>; }";

    #[test]
    fn test_critical_file_matching() {
        let files = vec!["src/payments/Checkout.tsx".to_string()];
        assert!(references_critical_file("please redo checkout.tsx", &files));
        assert!(references_critical_file(
            "touch SRC/PAYMENTS/CHECKOUT.TSX now",
            &files
        ));
        assert!(!references_critical_file("change the hero", &files));
    }

    #[tokio::test]
    async fn test_architect_failure_is_critical_and_blocks_coders() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![Err("model down".into())]));
        let executor = SwarmExecutor::new(invoker.clone());
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
        ]);

        let result = executor.run_swarm(&s, "build a kanban board", None).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("planner-1"));
        assert!(result.retry_suggestion.is_some());
        // The coder must never have been invoked
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tdd_gate_blocks_coders_without_tests() {
        // QA responds with chatter containing no code at all
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan: one column component".into()),
            Ok("".into()),
        ]));
        let executor = SwarmExecutor::new(invoker.clone());
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("qa-1", AgentRole::QaEngineer),
            agent("coder-1", AgentRole::Coder),
        ]);
        let repo = RepoContext {
            critical_files: vec!["src/Board.tsx".into()],
            critical_files_require_tests: true,
            ..RepoContext::default()
        };

        let result = executor
            .run_swarm(&s, "rewrite Board.tsx from scratch", Some(&repo))
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains(ZERO_BUG_MARKER));
        // planner + qa calls only, coder never invoked
        assert_eq!(invoker.call_count(), 2);
    }

    #[tokio::test]
    async fn test_qa_failure_non_critical_without_tdd() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Err("qa down".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
        ]));
        let executor = SwarmExecutor::new(invoker.clone());
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("qa-1", AgentRole::QaEngineer),
            agent("coder-1", AgentRole::Coder),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(result.success, "qa failure must not block: {:?}", result.error);
        assert!(result.output.as_deref().unwrap().contains("hero"));
    }

    #[tokio::test]
    async fn test_coder_output_is_deconversationalized() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Ok(format!("Sure! Here is the code:\n```tsx\n{CODE}\n```\nHope it helps!")),
        ]));
        let executor = SwarmExecutor::new(invoker);
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(result.success);
        let output = result.output.unwrap();
        assert!(output.contains("export default"));
        assert!(!output.contains("Hope it helps"));
    }

    #[tokio::test]
    async fn test_empty_output_is_a_distinguished_failure() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Ok("```\nok\n```".into()),
        ]));
        let executor = SwarmExecutor::new(invoker);
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("empty output"));
    }

    #[tokio::test]
    async fn test_tester_command_suspends_and_resume_completes() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
            Ok(r#"{"command": "shell", "arguments": "npm test"}"#.into()),
        ]));
        let executor = SwarmExecutor::new(invoker.clone());
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
            agent("tester-1", AgentRole::Debugger),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(!result.success);
        assert!(result.is_suspension());
        assert!(result.error.is_none());
        let command = result.command.clone().unwrap();
        assert_eq!(command.kind, CommandKind::Shell);
        assert_eq!(command.command, "npm test");
        let state = result.suspended_state.clone().unwrap();
        assert_eq!(state.waiting_agent, "tester-1");

        // The snapshot must survive serialization (cross-process resume)
        let json = serde_json::to_string(&state).unwrap();
        let restored: SuspendedState = serde_json::from_str(&json).unwrap();

        // Resume with a passing verdict
        invoker.push_response(Ok(r#"{"verdict": "pass"}"#.into()));
        let feedback = AgentFeedback {
            exit_code: 0,
            output: "all 12 tests passed".into(),
            screenshot: None,
        };
        let resumed = executor.resume_swarm(&s, &restored, &feedback).await;
        assert!(resumed.success, "resume should succeed: {:?}", resumed.error);
        // Generated code preserved byte-for-byte across suspension
        assert_eq!(resumed.output.as_deref(), Some(state.generated_code.as_str()));
    }

    #[tokio::test]
    async fn test_commands_chain_across_resumes() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
            Ok(r#"{"command": "shell", "arguments": "npm test"}"#.into()),
        ]));
        let executor = SwarmExecutor::new(invoker.clone());
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
            agent("tester-1", AgentRole::Debugger),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        let state = result.suspended_state.unwrap();

        // First resume: tester asks for a screenshot next
        invoker.push_response(Ok(
            r#"{"command": "screenshot", "arguments": "http://localhost:3000"}"#.into(),
        ));
        let feedback = AgentFeedback {
            exit_code: 0,
            output: "tests passed".into(),
            screenshot: None,
        };
        let again = executor.resume_swarm(&s, &state, &feedback).await;
        assert!(again.is_suspension());
        assert_eq!(again.command.as_ref().unwrap().kind, CommandKind::Screenshot);

        // Second resume: pass
        invoker.push_response(Ok(r#"{"verdict": "pass"}"#.into()));
        let state2 = again.suspended_state.unwrap();
        let feedback2 = AgentFeedback {
            exit_code: 0,
            output: "screenshot taken".into(),
            screenshot: Some("aGk=".into()),
        };
        let done = executor.resume_swarm(&s, &state2, &feedback2).await;
        assert!(done.success);
    }

    #[tokio::test]
    async fn test_resume_continues_remaining_testers_in_order() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
            Ok(r#"{"command": "shell", "arguments": "npm test"}"#.into()),
        ]));
        let executor = SwarmExecutor::new(invoker.clone());
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
            agent("tester-1", AgentRole::Debugger),
            agent("tester-2", AgentRole::Reviewer),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        let state = result.suspended_state.unwrap();
        assert_eq!(state.waiting_agent, "tester-1");

        // tester-1 passes on resume, tester-2 then runs and passes
        invoker.push_response(Ok(r#"{"verdict": "pass"}"#.into()));
        invoker.push_response(Ok(r#"{"verdict": "pass"}"#.into()));
        let feedback = AgentFeedback {
            exit_code: 0,
            output: "ok".into(),
            screenshot: None,
        };
        let done = executor.resume_swarm(&s, &state, &feedback).await;
        assert!(done.success);
        // planner + coder + tester-1 + resume + tester-2
        assert_eq!(invoker.call_count(), 5);
    }

    #[tokio::test]
    async fn test_tester_fail_verdict_fails_run() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
            Ok(r#"{"verdict": "fail", "error": "button does not render"}"#.into()),
        ]));
        let executor = SwarmExecutor::new(invoker);
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
            agent("tester-1", AgentRole::Reviewer),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(!result.success);
        assert!(!result.is_suspension());
        assert_eq!(result.error.as_deref(), Some("button does not render"));
    }

    #[tokio::test]
    async fn test_free_text_tester_response_counts_as_pass() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("plan".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
            Ok("Looks good to me overall, nicely structured.".into()),
        ]));
        let executor = SwarmExecutor::new(invoker);
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
            agent("tester-1", AgentRole::Reviewer),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_research_failure_never_blocks() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Err("search backend down".into()),
            Ok("plan".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
        ]));
        let executor = SwarmExecutor::new(invoker);
        let s = swarm(vec![
            agent("scout-1", AgentRole::Researcher),
            agent("planner-1", AgentRole::Architect),
            agent("coder-1", AgentRole::Coder),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_search_capable_agent_skip_path() {
        use crate::swarm::search::{SearchResult, WebSearch};
        use anyhow::Result;
        use async_trait::async_trait;

        struct NoSearch;
        #[async_trait]
        impl WebSearch for NoSearch {
            async fn search(&self, _q: &str, _n: u32) -> Result<Vec<SearchResult>> {
                panic!("search must not be called when the agent says SKIP");
            }
        }

        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("SKIP".into()),
            Ok("plan".into()),
            Ok(format!("```tsx\n{CODE}\n```")),
        ]));
        let executor = SwarmExecutor::new(invoker).with_search(Arc::new(NoSearch));
        let s = swarm(vec![
            agent("planner-1", AgentRole::Architect).with_capability("web_search"),
            agent("coder-1", AgentRole::Coder),
        ]);

        let result = executor.run_swarm(&s, "build a page", None).await;
        assert!(result.success);
    }
}
