//! End-to-end scenarios driving swarms with a scripted provider.

use std::sync::Arc;
use std::time::Duration;

use apiary_hooks::{HookEvent, HookOutcome};
use apiary_llm::testing::{ScriptedProvider, ScriptedTurn};
use apiary_llm::{ChatProvider, MessageRole, TokenUsage, ToolCall};
use apiary_mcp::testing::{StaticMcpConnector, StaticMcpService};
use apiary_mcp::McpServerSpec;
use apiary_runtime::{
    native_hook, AgentDefinition, DelegateSpec, DisableDefaultTools, RuntimeError, Swarm,
};
use tempfile::TempDir;

fn agent(name: &str, dir: &TempDir) -> AgentDefinition {
    let mut def = AgentDefinition::new(
        name,
        format!("The {name} agent"),
        "claude-sonnet-4-5",
        dir.path(),
    )
    .with_system_prompt(format!("You are agent {name}."));
    def.disable_default_tools = DisableDefaultTools::All(true);
    def
}

fn call(id: &str, tool: &str, task: &str) -> ToolCall {
    ToolCall::new(id, tool, serde_json::json!({ "task_description": task }))
}

/// S1 — lead-only echo.
#[tokio::test]
async fn lead_only_echo() {
    let dir = TempDir::new().unwrap();
    let provider =
        Arc::new(ScriptedProvider::new().script_for("agent a", vec![ScriptedTurn::text("hi")]));

    let swarm = Swarm::builder("echo")
        .add_agent(agent("a", &dir))
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    let result = swarm.execute("say hi").await.unwrap();
    assert!(result.success());
    assert_eq!(result.content.as_deref(), Some("hi"));
    assert_eq!(result.agent.as_deref(), Some("a"));
    assert!(result.total_tokens > 0);

    // The core lifecycle events appear exactly once and in order.
    let interesting = [
        "swarm_start",
        "llm_api_request",
        "llm_api_response",
        "agent_step",
        "agent_stop",
        "swarm_stop",
    ];
    let sequence: Vec<&str> = result
        .logs
        .iter()
        .map(|e| e.entry_type.as_str())
        .filter(|t| interesting.contains(t))
        .collect();
    assert_eq!(sequence, interesting);

    // swarm_start is first overall, swarm_stop last overall.
    assert_eq!(result.logs.first().unwrap().entry_type, "swarm_start");
    assert_eq!(result.logs.last().unwrap().entry_type, "swarm_stop");

    // Every entry carries swarm and execution ids.
    for entry in &result.logs {
        assert!(entry.swarm_id.is_some(), "{} lacks swarm_id", entry.entry_type);
        assert!(
            entry.execution_id.is_some(),
            "{} lacks execution_id",
            entry.entry_type
        );
    }
}

/// S2 — two-agent delegation with a shared instance.
#[tokio::test]
async fn shared_delegation() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .script_for(
                "agent a",
                vec![
                    ScriptedTurn::tool_calls(vec![call("c1", "WorkWithB", "do X")]),
                    ScriptedTurn::text("final:X-done"),
                ],
            )
            .script_for("agent b", vec![ScriptedTurn::text("X-done")]),
    );

    let mut b = agent("b", &dir);
    b.shared_across_delegations = true;

    let swarm = Swarm::builder("pair")
        .add_agent(agent("a", &dir).with_delegate(DelegateSpec::to("b")))
        .unwrap()
        .add_agent(b)
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    // Record every pre_tool_use firing; delegation tools must never trigger it.
    let seen_tools = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let seen_clone = Arc::clone(&seen_tools);
    swarm.add_default_callback(
        HookEvent::PreToolUse,
        None,
        0,
        native_hook(move |ctx| {
            if let Some(name) = ctx.tool_name() {
                seen_clone.lock().unwrap().push(name.to_string());
            }
            HookOutcome::Continue
        }),
    );

    let result = swarm.execute("start").await.unwrap();
    assert_eq!(result.content.as_deref(), Some("final:X-done"));

    let pre = result
        .logs
        .iter()
        .find(|e| e.entry_type == "pre_delegation")
        .expect("pre_delegation emitted");
    assert_eq!(pre.field("from").unwrap(), "a");
    assert_eq!(pre.field("to").unwrap(), "b");
    assert!(result.logs.iter().any(|e| e.entry_type == "post_delegation"));

    // No tool_call events and no tool-use hooks for the delegation tool.
    assert!(!result
        .logs
        .iter()
        .any(|e| e.entry_type == "tool_call" && e.field("tool").unwrap() == "WorkWithB"));
    assert!(seen_tools.lock().unwrap().is_empty());

    // The shared delegate kept the conversation on its primary chat.
    let b_chat = swarm.agent_chat("b").await.unwrap();
    assert_eq!(b_chat.user_turn_count().await, 1);
}

/// S3 — isolated delegation is per `(delegate, delegator)` pair.
#[tokio::test]
async fn isolated_delegation_per_pair() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .script_for(
                "agent a",
                vec![
                    ScriptedTurn::tool_calls(vec![call("a1", "WorkWithD", "first")]),
                    ScriptedTurn::tool_calls(vec![call("a2", "WorkWithD", "second")]),
                    ScriptedTurn::tool_calls(vec![call("a3", "WorkWithC", "hand off")]),
                    ScriptedTurn::text("done"),
                ],
            )
            .script_for(
                "agent c",
                vec![
                    ScriptedTurn::tool_calls(vec![call("c1", "WorkWithD", "third")]),
                    ScriptedTurn::text("c-done"),
                ],
            )
            .script_for(
                "agent d",
                vec![
                    ScriptedTurn::text("d-1"),
                    ScriptedTurn::text("d-2"),
                    ScriptedTurn::text("d-3"),
                ],
            ),
    );

    let mut c = agent("c", &dir).with_delegate(DelegateSpec::to("d"));
    c.shared_across_delegations = true;

    let swarm = Swarm::builder("trio")
        .add_agent(
            agent("a", &dir)
                .with_delegate(DelegateSpec::to("d"))
                .with_delegate(DelegateSpec::to("c")),
        )
        .unwrap()
        .add_agent(c)
        .unwrap()
        .add_agent(agent("d", &dir))
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    let result = swarm.execute("go").await.unwrap();
    assert_eq!(result.content.as_deref(), Some("done"));

    let d_at_a = swarm.delegation_instance("d@a").await.unwrap();
    let d_at_c = swarm.delegation_instance("d@c").await.unwrap();
    assert!(d_at_a.is_initialized());
    assert!(d_at_c.is_initialized());

    assert_eq!(d_at_a.chat().unwrap().user_turn_count().await, 2);
    assert_eq!(d_at_c.chat().unwrap().user_turn_count().await, 1);
}

/// S4 — circular delegation is blocked before any nested LLM call.
#[tokio::test]
async fn circular_delegation_blocked() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .script_for(
                "agent a",
                vec![
                    ScriptedTurn::tool_calls(vec![call("a1", "WorkWithB", "step")]),
                    ScriptedTurn::text("recovered"),
                ],
            )
            .script_for(
                "agent b",
                vec![
                    ScriptedTurn::tool_calls(vec![call("b1", "WorkWithA", "loop back")]),
                    ScriptedTurn::text("b-done"),
                ],
            ),
    );

    let swarm = Swarm::builder("cycle")
        .add_agent(agent("a", &dir).with_delegate(DelegateSpec::to("b")))
        .unwrap()
        .add_agent(agent("b", &dir).with_delegate(DelegateSpec::to("a")))
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    let result = swarm.execute("go").await.unwrap();
    assert!(result.success());
    assert_eq!(result.content.as_deref(), Some("recovered"));

    // b saw the cycle as an error tool result naming the path.
    let b_instance = swarm.delegation_instance("b@a").await.unwrap();
    let b_messages = b_instance.chat().unwrap().messages().await;
    let cycle_result = b_messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .expect("b received a tool result");
    assert!(
        cycle_result.content.contains("a\u{2192}b\u{2192}a"),
        "cycle path missing: {}",
        cycle_result.content
    );

    assert!(result.logs.iter().any(|e| e.entry_type == "delegation_error"));
}

/// S5 — a pre_tool_use halt becomes the synthesized tool result.
#[tokio::test]
async fn hook_halt_synthesizes_result() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().script_for(
        "agent a",
        vec![
            ScriptedTurn::tool_calls(vec![ToolCall::new(
                "t1",
                "Bash",
                serde_json::json!({"command": "ls"}),
            )]),
            ScriptedTurn::text("after"),
        ],
    ));

    let mut a = agent("a", &dir);
    // Re-enable the built-in toolset for this one.
    a.disable_default_tools = DisableDefaultTools::None;

    let swarm = Swarm::builder("guarded")
        .add_agent(a)
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    swarm.add_default_callback(
        HookEvent::PreToolUse,
        Some("Bash"),
        0,
        native_hook(|_| HookOutcome::Halt("denied".to_string())),
    );

    let result = swarm.execute("list files").await.unwrap();
    assert_eq!(result.content.as_deref(), Some("after"));

    // The halt message is the tool result; Bash never actually ran.
    let a_chat = swarm.agent_chat("a").await.unwrap();
    let messages = a_chat.messages().await;
    let tool_result = messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert_eq!(tool_result.content, "denied");
    assert!(!result.logs.iter().any(|e| e.entry_type == "tool_call"));
}

/// S6 — MCP optimized mode registers stubs without tools/list and fetches
/// schemas lazily.
#[tokio::test]
async fn mcp_optimized_mode_lazy_schema() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(
        StaticMcpService::new("m")
            .with_tool("search", serde_json::json!({"type": "object"}), "search-hit"),
    );
    let connector = Arc::new(StaticMcpConnector::new().with_service("m", Arc::clone(&service)));

    let provider = Arc::new(ScriptedProvider::new().script_for(
        "agent a",
        vec![
            ScriptedTurn::tool_calls(vec![ToolCall::new(
                "t1",
                "search",
                serde_json::json!({"q": "rust"}),
            )]),
            ScriptedTurn::text("found"),
        ],
    ));

    let mut a = agent("a", &dir);
    a.mcp_servers
        .push(McpServerSpec::stdio("m", "mcp-m").with_tools(["search"]));

    let swarm = Swarm::builder("mcp")
        .add_agent(a)
        .unwrap()
        .lead("a")
        .provider(provider)
        .mcp_connector(connector)
        .build()
        .unwrap();

    let result = swarm.execute("search rust").await.unwrap();
    assert_eq!(result.content.as_deref(), Some("found"));

    // Optimized mode: no tools/list, one lazy schema fetch, one call.
    assert_eq!(service.list_calls(), 0);
    assert_eq!(service.schema_fetches(), 1);
    assert_eq!(service.tool_calls(), 1);
    assert!(service.is_shut_down(), "cleanup terminates MCP clients");

    let complete = result
        .logs
        .iter()
        .find(|e| e.entry_type == "mcp_server_init_complete")
        .unwrap();
    assert_eq!(complete.field("mode").unwrap(), "optimized");
    assert_eq!(
        complete.field("tools").unwrap(),
        serde_json::json!(["search"])
    );
    let start_idx = result
        .logs
        .iter()
        .position(|e| e.entry_type == "mcp_server_init_start")
        .unwrap();
    let complete_idx = result
        .logs
        .iter()
        .position(|e| e.entry_type == "mcp_server_init_complete")
        .unwrap();
    assert!(start_idx < complete_idx);
}

/// Tool results are appended in request order even when dispatched in
/// parallel and the first call finishes last.
#[tokio::test]
async fn tool_results_keep_request_order() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().script_for(
        "agent a",
        vec![
            ScriptedTurn::tool_calls(vec![
                ToolCall::new("slow", "Bash", serde_json::json!({"command": "sleep 0.3; echo slow"})),
                ToolCall::new("fast", "Bash", serde_json::json!({"command": "echo fast"})),
            ]),
            ScriptedTurn::text("done"),
        ],
    ));

    let mut a = agent("a", &dir);
    a.disable_default_tools = DisableDefaultTools::None;
    a = a.with_max_concurrent_tools(2);

    let swarm = Swarm::builder("ordered")
        .add_agent(a)
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    let result = swarm.execute("run both").await.unwrap();
    assert!(result.success());

    let messages = swarm.agent_chat("a").await.unwrap().messages().await;
    let tool_results: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .map(|m| m.tool_call_id.as_deref().unwrap())
        .collect();
    assert_eq!(tool_results, vec!["slow", "fast"]);
}

/// swarm_stop hooks can reprompt; the next iteration reuses the loop and the
/// log still contains exactly one swarm_start and one swarm_stop.
#[tokio::test]
async fn swarm_stop_reprompt_loops_once() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().script_for(
        "agent a",
        vec![ScriptedTurn::text("first pass"), ScriptedTurn::text("second pass")],
    ));

    let swarm = Swarm::builder("loop")
        .add_agent(agent("a", &dir))
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let fired_clone = Arc::clone(&fired);
    swarm.add_default_callback(
        HookEvent::SwarmStop,
        None,
        0,
        native_hook(move |_| {
            if fired_clone.swap(true, std::sync::atomic::Ordering::SeqCst) {
                HookOutcome::Continue
            } else {
                HookOutcome::Reprompt("go again".to_string())
            }
        }),
    );

    let result = swarm.execute("go").await.unwrap();
    assert_eq!(result.content.as_deref(), Some("second pass"));

    let starts = result.logs.iter().filter(|e| e.entry_type == "swarm_start").count();
    let stops = result.logs.iter().filter(|e| e.entry_type == "swarm_stop").count();
    assert_eq!(starts, 1);
    assert_eq!(stops, 1);
}

/// preserve_context=false clears the delegate back to its system baseline on
/// every call.
#[tokio::test]
async fn preserve_context_false_resets_delegate() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .script_for(
                "agent a",
                vec![
                    ScriptedTurn::tool_calls(vec![call("a1", "WorkWithD", "first")]),
                    ScriptedTurn::tool_calls(vec![call("a2", "WorkWithD", "second")]),
                    ScriptedTurn::text("done"),
                ],
            )
            .script_for(
                "agent d",
                vec![ScriptedTurn::text("d-1"), ScriptedTurn::text("d-2")],
            ),
    );

    let swarm = Swarm::builder("resetting")
        .add_agent(
            agent("a", &dir).with_delegate(DelegateSpec::to("d").preserve_context(false)),
        )
        .unwrap()
        .add_agent(agent("d", &dir))
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    swarm.execute("go").await.unwrap();

    let d_chat = swarm.delegation_instance("d@a").await.unwrap().chat().unwrap();
    // Second call cleared the first exchange.
    assert_eq!(d_chat.user_turn_count().await, 1);
    let messages = d_chat.messages().await;
    assert!(messages
        .iter()
        .any(|m| m.role == MessageRole::User && m.content.contains("second")));
}

/// Execution IDs are unique across execute calls; token accounting reaches
/// the result.
#[tokio::test]
async fn execution_ids_differ_and_usage_accumulates() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().script_for(
        "agent a",
        vec![
            ScriptedTurn::text("one").with_usage(TokenUsage {
                input_tokens: 500,
                output_tokens: 50,
                cached_tokens: 100,
                cache_creation_tokens: 10,
            }),
            ScriptedTurn::text("two").with_usage(TokenUsage {
                input_tokens: 700,
                output_tokens: 70,
                cached_tokens: 0,
                cache_creation_tokens: 0,
            }),
        ],
    ));

    let swarm = Swarm::builder("twice")
        .add_agent(agent("a", &dir))
        .unwrap()
        .lead("a")
        .provider(provider)
        .build()
        .unwrap();

    let first = swarm.execute("first").await.unwrap();
    let second = swarm.execute("second").await.unwrap();

    let id_of = |result: &apiary_runtime::ExecutionResult| {
        result.logs[0].execution_id.clone().unwrap()
    };
    assert_ne!(id_of(&first), id_of(&second));
    assert_eq!(first.total_tokens, 550);
    assert_eq!(second.total_tokens, 770);

    let usage = swarm.agent_chat("a").await.unwrap().usage().await;
    assert_eq!(usage.input_tokens, 700);
    assert_eq!(usage.output_tokens, 120);
    assert_eq!(usage.cache_creation_tokens, 10);
    assert!(usage.cost > 0.0);
}

/// Snapshot round-trip: conversations, counters, delegation instances, and
/// scratchpad survive.
#[tokio::test]
async fn snapshot_round_trip() {
    let dir = TempDir::new().unwrap();

    let build = |provider: Arc<ScriptedProvider>| {
        Swarm::builder("persisted")
            .add_agent(agent("a", &dir).with_delegate(DelegateSpec::to("d")))
            .unwrap()
            .add_agent(agent("d", &dir))
            .unwrap()
            .lead("a")
            .provider(provider as Arc<dyn ChatProvider>)
            .build()
            .unwrap()
    };

    let provider = Arc::new(
        ScriptedProvider::new()
            .script_for(
                "agent a",
                vec![
                    ScriptedTurn::tool_calls(vec![call("a1", "WorkWithD", "task")]),
                    ScriptedTurn::text("done"),
                ],
            )
            .script_for("agent d", vec![ScriptedTurn::text("d-done")]),
    );
    let swarm = build(provider);
    swarm.scratchpad().write("note", "keep me");
    swarm.execute("go").await.unwrap();

    let snapshot_dir = TempDir::new().unwrap();
    let path = snapshot_dir.path().join("swarm.json");
    swarm.persist_snapshot(&path).await.unwrap();

    let loaded = Swarm::load_snapshot(&path).unwrap();
    let restored = build(Arc::new(ScriptedProvider::new()));
    restored.restore(&loaded).await.unwrap();

    let original_a = swarm.agent_chat("a").await.unwrap().messages().await;
    let restored_a = restored.agent_chat("a").await.unwrap().messages().await;
    assert_eq!(original_a.len(), restored_a.len());
    assert_eq!(
        original_a.last().unwrap().content,
        restored_a.last().unwrap().content
    );

    let restored_d = restored
        .delegation_instance("d@a")
        .await
        .unwrap()
        .chat()
        .unwrap()
        .messages()
        .await;
    assert!(restored_d
        .iter()
        .any(|m| m.role == MessageRole::Assistant && m.content == "d-done"));

    assert_eq!(restored.scratchpad().read("note").as_deref(), Some("keep me"));

    let original_usage = swarm.agent_chat("a").await.unwrap().usage().await;
    let restored_usage = restored.agent_chat("a").await.unwrap().usage().await;
    assert_eq!(original_usage.output_tokens, restored_usage.output_tokens);
}

/// Restoring a snapshot with a wrong version names the supported one.
#[tokio::test]
async fn snapshot_version_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let swarm = Swarm::builder("strict")
        .add_agent(agent("a", &dir))
        .unwrap()
        .lead("a")
        .provider(Arc::new(ScriptedProvider::new()) as Arc<dyn ChatProvider>)
        .build()
        .unwrap();

    let mut snapshot = swarm.snapshot().await;
    snapshot.version = 1;

    let err = swarm.restore(&snapshot).await.unwrap_err();
    match err {
        RuntimeError::State { message } => {
            assert!(message.contains("version 1"));
            assert!(message.contains('2'));
        }
        other => panic!("unexpected: {other}"),
    }

    // Kind comparison is case-insensitive.
    let mut cased = swarm.snapshot().await;
    cased.kind = "Swarm".to_string();
    assert!(swarm.restore(&cased).await.is_ok());
}

/// A swarm loaded from a declarative document runs, and its shell hook
/// injects `<hook-context>` into the prompt.
#[tokio::test]
async fn declarative_document_with_shell_hook() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        r#"
version: 2
swarm:
  name: declarative
  lead: solo
  agents:
    solo:
      description: Does everything
      model: claude-sonnet-4-5
      directory: {dir}
      system_prompt: "You are agent solo."
      disable_default_tools: true
      hooks:
        user_prompt:
          - type: command
            command: "echo extra context"
"#,
        dir = dir.path().display()
    );

    let spec = apiary_config::SwarmDocument::from_yaml_str(&yaml)
        .unwrap()
        .validate()
        .unwrap();

    let provider = Arc::new(
        ScriptedProvider::new().script_for("agent solo", vec![ScriptedTurn::text("ok")]),
    );

    let swarm = apiary_runtime::SwarmBuilder::from_spec(spec)
        .provider(Arc::clone(&provider) as Arc<dyn ChatProvider>)
        .build()
        .unwrap();

    let result = swarm.execute("work").await.unwrap();
    assert_eq!(result.content.as_deref(), Some("ok"));

    let requests = provider.requests();
    let sent_user = requests[0]
        .messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .unwrap();
    assert!(
        sent_user.content.contains("<hook-context>extra context</hook-context>"),
        "hook stdout not injected: {}",
        sent_user.content
    );

    // The stored history keeps the injected hook context (it is part of the
    // prompt), but never any <system-reminder> span.
    let messages = swarm.agent_chat("solo").await.unwrap().messages().await;
    assert!(messages.iter().all(|m| !m.content.contains("<system-reminder>")));
}

struct HangingProvider;

#[async_trait::async_trait]
impl ChatProvider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn chat(
        &self,
        _request: &apiary_llm::ChatRequest,
    ) -> apiary_llm::LlmResult<apiary_llm::ChatResponse> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Err(apiary_llm::LlmError::Provider {
            message: "unreachable".to_string(),
        })
    }
}

/// Cancelling a detached execution still emits swarm_stop and runs cleanup.
#[tokio::test]
async fn cancellation_runs_cleanup() {
    let dir = TempDir::new().unwrap();
    let swarm = Arc::new(
        Swarm::builder("cancellable")
            .add_agent(agent("a", &dir))
            .unwrap()
            .lead("a")
            .provider(Arc::new(HangingProvider) as Arc<dyn ChatProvider>)
            .build()
            .unwrap(),
    );

    let handle = swarm.execute_detached("never finishes");
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    let result = handle.wait().await.unwrap();
    assert!(matches!(result.error, Some(RuntimeError::Cancelled)));
    assert!(result.logs.iter().any(|e| e.entry_type == "swarm_start"));
    assert_eq!(
        result
            .logs
            .iter()
            .filter(|e| e.entry_type == "swarm_stop")
            .count(),
        1
    );
}

/// System reminders reach the LLM but never the persisted history, and a
/// smaller TodoWrite interval reminds at least as often as a larger one.
#[tokio::test]
async fn todowrite_reminders_are_ephemeral_and_monotone() {
    let reminder_count = |interval: usize| async move {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new().script_for(
            "agent a",
            (0..6).map(|i| ScriptedTurn::text(format!("turn {i}"))).collect(),
        ));

        let mut a = agent("a", &dir);
        a.disable_default_tools = DisableDefaultTools::None;
        a.todowrite_reminder_interval = interval;

        let swarm = Swarm::builder("reminding")
            .add_agent(a)
            .unwrap()
            .lead("a")
            .provider(Arc::clone(&provider) as Arc<dyn ChatProvider>)
            .build()
            .unwrap();

        for i in 0..6 {
            swarm.execute(&format!("prompt {i}")).await.unwrap();
        }

        // History never carries reminder spans.
        let messages = swarm.agent_chat("a").await.unwrap().messages().await;
        assert!(messages.iter().all(|m| !m.content.contains("<system-reminder>")));

        // The LLM, however, saw them embedded into user turns.
        provider
            .requests()
            .iter()
            .filter(|r| {
                r.messages
                    .iter()
                    .any(|m| m.content.contains("todo list has not been updated"))
            })
            .count()
    };

    let frequent = reminder_count(2).await;
    let rare = reminder_count(50).await;
    assert!(frequent >= rare);
    assert!(frequent > 0);
    assert_eq!(rare, 0);
}

/// A user_prompt halt returns without any LLM call.
#[tokio::test]
async fn user_prompt_halt_skips_llm() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new());

    let swarm = Swarm::builder("halted")
        .add_agent(agent("a", &dir))
        .unwrap()
        .lead("a")
        .provider(Arc::clone(&provider) as Arc<dyn ChatProvider>)
        .build()
        .unwrap();

    swarm.add_default_callback(
        HookEvent::UserPrompt,
        None,
        0,
        native_hook(|_| HookOutcome::Halt("not today".to_string())),
    );

    let result = swarm.execute("anything").await.unwrap();
    assert_eq!(result.content.as_deref(), Some("not today"));
    assert_eq!(provider.request_count(), 0);
}
