//! Session Progression Engine
//!
//! Walks a day's trackable exercises set by set. Each exercise has:
//! - a goal (its target sets, or a single set when none is given)
//! - a logged count (highest set number recorded for its name)
//!
//! Key principles:
//! - Derived from logs only, never from a stored pointer
//! - Plan order decides what comes next
//! - Combination exercises progress under their combined name

use std::collections::HashMap;

use crate::models::TrainingSetLog;
use crate::summary::{ExerciseDescriptor, PlanSummary};

// ---------------------------------------------------------------------------
/// Next Step: what the athlete does now
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NextStep {
    pub exercise: ExerciseDescriptor,
    pub next_set: u32,
}

impl NextStep {
    pub fn exercise_name(&self) -> &str {
        &self.exercise.exercise_name
    }
}

// ---------------------------------------------------------------------------
/// Logged counts
// ---------------------------------------------------------------------------

/// Highest set number logged per exercise name
pub fn logged_counts(logs: &[TrainingSetLog]) -> HashMap<&str, u32> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for log in logs {
        let entry = counts.entry(log.exercise.as_str()).or_insert(0);
        *entry = (*entry).max(log.set_number);
    }
    counts
}

/// Sets an exercise needs before it counts as done
pub fn goal_sets(exercise: &ExerciseDescriptor) -> u32 {
    exercise.target_sets.unwrap_or(1)
}

// ---------------------------------------------------------------------------
/// The engine
// ---------------------------------------------------------------------------

/// First trackable exercise still short of its goal, or `None` when the
/// session is complete
pub fn next_step(summary: &PlanSummary, logs: &[TrainingSetLog]) -> Option<NextStep> {
    let counts = logged_counts(logs);

    summary.trackable().find_map(|exercise| {
        let logged = counts.get(exercise.exercise_name.as_str()).copied().unwrap_or(0);
        (logged < goal_sets(exercise)).then(|| NextStep {
            exercise: exercise.clone(),
            next_set: logged + 1,
        })
    })
}
