//! The planning controller: read-only exploration that produces a plan,
//! and the one-shot execution of that plan.

use tracing::{info, warn};

use crate::error::AgentError;
use crate::event::{NoticeLevel, RunView};
use crate::loop_runner::{AgentLoop, Finish, RunMode, RunOutcome};

/// A plan waiting for the user to approve it with `/execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlan {
    /// The task exactly as the user gave it
    pub task: String,
    /// The model's plan text
    pub plan_text: String,
}

impl PendingPlan {
    /// The user turn that hands the approved plan to a full run.
    pub fn execution_prompt(&self) -> String {
        format!(
            "Execute the approved plan below for this task.\n\n\
             TASK:\n{}\n\nAPPROVED PLAN:\n{}\n\n\
             Follow the plan step by step. Call `done` when every step is finished.",
            self.task, self.plan_text
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// A plan was found and replaced any previous pending plan.
    Stored(PendingPlan),
    /// The model finished without presenting a plan.
    NoPlanFound,
    /// The user stopped planning at the step ceiling.
    Stopped,
    /// An interrupt arrived before a plan was presented.
    Interrupted,
}

impl AgentLoop {
    /// Explore the project with read-only tools and store the resulting
    /// plan. The conversation history is not modified.
    pub async fn plan(&self, task: &str, view: &mut dyn RunView) -> Result<PlanOutcome, AgentError> {
        let _permit = self.guard.try_acquire().ok_or(AgentError::RunInProgress)?;
        let settings = self.settings();
        let mut session = self.session.lock().await;
        let before = session.usage;
        info!(model = %settings.model, "Starting planning run");

        let result = self.drive(RunMode::Planning, task, &settings, &mut session, view).await;

        let outcome = match result {
            Ok(Finish::PlanText(plan_text)) => {
                let plan = PendingPlan {
                    task: task.to_string(),
                    plan_text,
                };
                if session.pending_plan.replace(plan.clone()).is_some() {
                    info!("Replaced previous pending plan");
                }
                info!(chars = plan.plan_text.len(), "Stored pending plan");
                Ok(PlanOutcome::Stored(plan))
            }
            Ok(Finish::NoPlan | Finish::Done(_)) => {
                warn!("Planning ended without an execution plan");
                view.notice(NoticeLevel::Warn, "No execution plan found in the reply; nothing stored.");
                Ok(PlanOutcome::NoPlanFound)
            }
            Ok(Finish::Stopped) => Ok(PlanOutcome::Stopped),
            Ok(Finish::Interrupted) => Ok(PlanOutcome::Interrupted),
            Err(e) => Err(e),
        };

        self.conclude(&session, before, outcome.is_ok(), view).await;
        outcome
    }

    /// Run the pending plan with the full tool set. The plan is cleared
    /// before the run starts, so it can never be executed twice.
    pub async fn execute_plan(&self, view: &mut dyn RunView) -> Result<RunOutcome, AgentError> {
        let _permit = self.guard.try_acquire().ok_or(AgentError::RunInProgress)?;
        let plan = self
            .session
            .lock()
            .await
            .pending_plan
            .take()
            .ok_or(AgentError::NoPendingPlan)?;

        info!("Executing pending plan");
        self.run_unguarded(&plan.execution_prompt(), view).await
    }

    pub async fn has_pending_plan(&self) -> bool {
        self.session.lock().await.pending_plan.is_some()
    }

    pub async fn pending_plan(&self) -> Option<PendingPlan> {
        self.session.lock().await.pending_plan.clone()
    }
}
