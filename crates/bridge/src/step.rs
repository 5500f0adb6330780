//! Step action server
//!
//! 把 N 步拆成 ceil(N/F) 个 chunk 执行，每个 chunk 之后发送 feedback。
//! 取消请求只在 chunk 之间检查，正在执行的引擎调用不会被打断。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{check_request, StepFeedback, StepGoal, StepResult};
use sim_client::SimClient;
use tracing::{debug, info, instrument};

use crate::error::Result;

/// Chunk sizes for `total` steps with feedback every `cycle` steps
///
/// Chunks are produced lazily; a zero `cycle` is treated as 1.
pub fn chunk_sizes(total: u32, cycle: u32) -> impl Iterator<Item = u32> {
    let cycle = cycle.max(1);
    let mut remaining = total;
    std::iter::from_fn(move || {
        let chunk = remaining.min(cycle);
        remaining -= chunk;
        (chunk > 0).then_some(chunk)
    })
}

/// Terminal state of an accepted goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded(StepResult),
    Preempted(StepResult),
}

impl StepOutcome {
    pub fn result(&self) -> StepResult {
        match self {
            Self::Succeeded(r) | Self::Preempted(r) => *r,
        }
    }
}

/// Handle of one accepted goal
#[derive(Debug, Clone)]
pub struct StepGoalHandle {
    cancel: Arc<AtomicBool>,
}

impl StepGoalHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Cancellable chunked stepping
#[derive(Debug, Default)]
pub struct StepActionServer {
    active: Mutex<Option<StepGoalHandle>>,
}

impl StepActionServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new goal; an active goal is preempted
    pub fn accept(&self) -> StepGoalHandle {
        let handle = StepGoalHandle {
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.replace(handle.clone()) {
            previous.cancel();
        }
        handle
    }

    /// Request cancellation of the active goal
    ///
    /// Returns false when no goal is active.
    pub fn cancel_active(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(handle) if !handle.is_cancelled() => {
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    fn finish(&self, handle: &StepGoalHandle) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active
            .as_ref()
            .is_some_and(|a| Arc::ptr_eq(&a.cancel, &handle.cancel))
        {
            *active = None;
        }
    }

    /// Run a goal to completion or preemption
    ///
    /// Zero steps or a zero feedback cycle fail before the engine is called.
    #[instrument(
        name = "step_action_execute",
        skip(self, client, handle, feedback),
        fields(
            total = goal.total_number_of_steps,
            cycle = goal.feedback_cycle_size
        )
    )]
    pub async fn execute<C, F>(
        &self,
        client: &C,
        goal: StepGoal,
        handle: &StepGoalHandle,
        mut feedback: F,
    ) -> Result<StepOutcome>
    where
        C: SimClient,
        F: FnMut(StepFeedback),
    {
        if let Err(e) = check_request("step", &goal) {
            self.finish(handle);
            return Err(e.into());
        }

        let mut completed = 0u32;
        for chunk in chunk_sizes(goal.total_number_of_steps, goal.feedback_cycle_size) {
            if handle.is_cancelled() {
                info!(steps_completed = completed, "Step goal preempted");
                self.finish(handle);
                return Ok(StepOutcome::Preempted(StepResult {
                    success: false,
                    steps_completed: completed,
                }));
            }

            if let Err(e) = client.step(chunk).await {
                self.finish(handle);
                return Err(e.into());
            }
            completed += chunk;
            observability::record_step_chunk(chunk);
            debug!(chunk, steps_completed = completed, "Step chunk done");
            feedback(StepFeedback {
                steps_completed: completed,
            });
        }

        self.finish(handle);
        Ok(StepOutcome::Succeeded(StepResult {
            success: true,
            steps_completed: completed,
        }))
    }
}
