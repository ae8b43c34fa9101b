//! Per-stage progress tracking. Stage status is derived from progress, the
//! note log is append-only, and a completion transition queues exactly one
//! notification intent carrying the proposal's aggregate stage counts.

use chrono::{DateTime, Utc};

use super::domain::{Actor, ProjectStage, StageId, StageNote, StageStatus};
use super::error::EngagementError;
use super::repository::{NotificationIntent, TemplateKind};
use super::store::StoreState;
use super::transitions::assert_transition;

pub(crate) fn set_stage_progress(
    state: &mut StoreState,
    stage_id: StageId,
    progress: u32,
    completed_tasks: Option<u32>,
    note: Option<String>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(ProjectStage, Vec<NotificationIntent>), EngagementError> {
    if !actor.is_manager() {
        return Err(EngagementError::forbidden(
            "stage progress updates require a manager-class staff member",
        ));
    }
    if progress > 100 {
        return Err(EngagementError::validation(format!(
            "progress must be between 0 and 100, got {progress}"
        )));
    }

    let stage = state.stage(stage_id)?;
    if let Some(done) = completed_tasks {
        if done > stage.total_tasks {
            return Err(EngagementError::validation(format!(
                "completed tasks {done} exceed the stage's {} total",
                stage.total_tasks
            )));
        }
    }

    let previous = stage.status;
    let next = match (progress, previous) {
        (100, _) => StageStatus::Completed,
        (p, StageStatus::NotStarted) if p > 0 => StageStatus::InProgress,
        (_, current) => current,
    };
    if next != previous {
        assert_transition(previous, next)?;
    }

    let stage = state.stage_mut(stage_id)?;
    stage.progress = progress as u8;
    if let Some(done) = completed_tasks {
        stage.completed_tasks = done;
    }
    if let Some(body) = note {
        stage.notes.push(StageNote {
            author: actor.id().clone(),
            body,
            recorded_at: now,
        });
    }
    stage.status = next;
    if next == StageStatus::InProgress && stage.started_at.is_none() {
        stage.started_at = Some(now);
    }

    if next == StageStatus::Completed && previous != StageStatus::Completed {
        stage.completed_at = Some(now);
    }
    let completed_now = next == StageStatus::Completed
        && matches!(previous, StageStatus::NotStarted | StageStatus::InProgress);
    let stage = stage.clone();

    let mut intents = Vec::new();
    if completed_now {
        let siblings = state.stages_for(stage.proposal_id);
        let total = siblings.len();
        let completed = siblings
            .iter()
            .filter(|sibling| sibling.status == StageStatus::Completed)
            .count();
        let client = state.proposal(stage.proposal_id)?.client_identity.clone();
        intents.push(
            NotificationIntent::new(client, TemplateKind::StageCompleted)
                .with("stage", stage.name.clone())
                .with("completed_stages", completed.to_string())
                .with("total_stages", total.to_string()),
        );
        tracing::info!(stage = %stage.name, completed, total, "stage completed");
    }

    Ok((stage, intents))
}

/// Convenience wrapper that drives a stage straight to done.
pub(crate) fn complete_stage(
    state: &mut StoreState,
    stage_id: StageId,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(ProjectStage, Vec<NotificationIntent>), EngagementError> {
    if !actor.is_manager() {
        return Err(EngagementError::forbidden(
            "stage completion requires a manager-class staff member",
        ));
    }

    let stage = state.stage(stage_id)?;
    if stage.status == StageStatus::Completed {
        return Err(EngagementError::AlreadyCompleted);
    }
    let total_tasks = stage.total_tasks;

    set_stage_progress(
        state,
        stage_id,
        100,
        Some(total_tasks),
        None,
        actor,
        now,
    )
}
