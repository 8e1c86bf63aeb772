mod common;

use std::sync::Arc;

use codeclaw_agent::{AgentError, NoticeLevel, PlanOutcome, RunOutcome};
use codeclaw_core::error::ProviderError;
use codeclaw_core::message::Role;
use common::*;
use tokio::sync::Notify;

const PLAN: &str = "## EXECUTION PLAN\nSteps:\n1. Create notes.txt with a greeting";

#[tokio::test]
async fn plan_is_stored_then_executed_once() {
    let h = harness(
        vec![
            tool_reply(&[("r", "read_file", r#"{"path":"README.md"}"#)]),
            text_reply(PLAN),
            tool_reply(&[("w", "write_file", r#"{"path":"notes.txt","content":"hello"}"#)]),
            done_reply("notes written"),
        ],
        &["y"],
    );
    std::fs::write(h.dir.path().join("README.md"), "# Demo").unwrap();
    let task = "Add a notes file  (keep it short)";

    let outcome = h.agent.plan(task, &mut RecordingView::default()).await.unwrap();

    let PlanOutcome::Stored(plan) = outcome else {
        panic!("expected a stored plan, got {outcome:?}");
    };
    assert_eq!(plan.task, task);
    assert_eq!(plan.plan_text, PLAN);
    assert!(h.agent.has_pending_plan().await);

    // Only read-only tools are offered while planning
    let mut offered: Vec<String> = h.provider.requests()[0].tools.iter().map(|t| t.name.clone()).collect();
    offered.sort();
    assert_eq!(offered, ["list_directory", "read_file", "search_files"]);
    assert!(h.provider.requests()[0].messages[0].content.contains("PLANNING mode"));

    // Exploration is not written to history
    assert_eq!(h.agent.history_len().await, 0);
    assert!(!h.dir.path().join("notes.txt").exists());

    let outcome = h.agent.execute_plan(&mut RecordingView::default()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert!(!h.agent.has_pending_plan().await);
    assert_eq!(std::fs::read_to_string(h.dir.path().join("notes.txt")).unwrap(), "hello");

    let execute_request = &h.provider.requests()[2];
    assert_eq!(execute_request.tools.len(), 9);
    let user = execute_request.messages.iter().find(|m| m.role == Role::User).unwrap();
    assert!(user.content.contains(task));
    assert!(user.content.contains(PLAN));

    let again = h.agent.execute_plan(&mut RecordingView::default()).await;
    assert!(matches!(again, Err(AgentError::NoPendingPlan)));
}

#[tokio::test]
async fn mutating_tools_are_rejected_while_planning() {
    let h = harness(
        vec![
            tool_reply(&[("w", "write_file", r#"{"path":"x.txt","content":"x"}"#)]),
            text_reply(PLAN),
        ],
        &[],
    );
    let mut view = RecordingView::default();

    h.agent.plan("anything", &mut view).await.unwrap();

    assert!(!h.dir.path().join("x.txt").exists());
    assert!(h.human.prompts().is_empty());
    let rejection = last_message(&h.provider, 1);
    assert_eq!(rejection.role, Role::Tool);
    assert!(rejection.content.contains("not available while planning"));
    assert_eq!(view.tools, [("write_file".to_string(), false)]);
}

#[tokio::test]
async fn reply_without_plan_stores_nothing() {
    let h = harness(vec![text_reply("The code looks fine to me.")], &[]);
    let mut view = RecordingView::default();

    let outcome = h.agent.plan("review", &mut view).await.unwrap();

    assert_eq!(outcome, PlanOutcome::NoPlanFound);
    assert!(!h.agent.has_pending_plan().await);
    assert!(view.notices.iter().any(|(level, _)| *level == NoticeLevel::Warn));
}

#[tokio::test]
async fn new_plan_replaces_the_previous_one() {
    let h = harness(
        vec![text_reply("EXECUTION PLAN\n1. first"), text_reply("EXECUTION PLAN\n1. second")],
        &[],
    );

    h.agent.plan("first task", &mut RecordingView::default()).await.unwrap();
    h.agent.plan("second task", &mut RecordingView::default()).await.unwrap();

    let plan = h.agent.pending_plan().await.unwrap();
    assert_eq!(plan.task, "second task");
    assert!(plan.plan_text.ends_with("second"));
}

#[tokio::test]
async fn plan_is_consumed_even_when_execution_fails() {
    let h = harness(
        vec![
            text_reply(PLAN),
            vec![Err(ProviderError::ApiError {
                status_code: 503,
                message: "unavailable".into(),
            })],
        ],
        &[],
    );

    h.agent.plan("task", &mut RecordingView::default()).await.unwrap();
    let result = h.agent.execute_plan(&mut RecordingView::default()).await;

    assert!(matches!(result, Err(AgentError::Provider(_))));
    assert!(!h.agent.has_pending_plan().await);
}

#[tokio::test]
async fn execute_without_plan_fails_fast() {
    let h = harness(vec![], &[]);
    let result = h.agent.execute_plan(&mut RecordingView::default()).await;
    assert!(matches!(result, Err(AgentError::NoPendingPlan)));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn requests_are_rejected_while_planning() {
    let h = harness(vec![text_reply(PLAN)], &[]);
    let release = Arc::new(Notify::new());
    h.provider.hold_next(release.clone());
    let mut view = RecordingView::default();

    let contender = async {
        while !h.agent.is_running() {
            tokio::task::yield_now().await;
        }
        let run = h.agent.run("something else", &mut RecordingView::default()).await;
        let execute = h.agent.execute_plan(&mut RecordingView::default()).await;
        release.notify_one();
        (run, execute)
    };
    let (planned, (run, execute)) = tokio::join!(h.agent.plan("add notes", &mut view), contender);

    assert!(matches!(planned.unwrap(), PlanOutcome::Stored(_)));
    assert!(matches!(run, Err(AgentError::RunInProgress)));
    assert!(matches!(execute, Err(AgentError::RunInProgress)));
    assert_eq!(h.provider.calls(), 1);
    assert!(h.agent.has_pending_plan().await);
}
