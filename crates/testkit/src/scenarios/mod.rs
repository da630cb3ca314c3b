//! Built-in scenario suite.

mod resources;
mod gameplay_tasks;
mod pawn_actions;

use crate::harness::AiTest;

/// A named, individually runnable scenario.
#[derive(Clone, Copy)]
pub struct Scenario {
    /// Unique name, `group.case`
    pub name: &'static str,

    /// One line summary
    pub description: &'static str,

    /// Builds a fresh instance of the test
    pub create: fn() -> Box<dyn AiTest>,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

fn make<T: AiTest + Default + 'static>() -> Box<dyn AiTest> {
    Box::new(T::default())
}

fn scenario<T: AiTest + Default + 'static>(name: &'static str, description: &'static str) -> Scenario {
    Scenario {
        name,
        description,
        create: make::<T>,
    }
}

/// Every built-in scenario, in run order.
pub fn all() -> Vec<Scenario> {
    vec![
        scenario::<resources::SetAlgebra>(
            "resources.set_algebra",
            "overlap, difference and membership of resource sets",
        ),
        scenario::<resources::LockPriorities>(
            "resources.lock_priorities",
            "resource locks only admit strictly higher priorities",
        ),
        scenario::<gameplay_tasks::ComponentState>(
            "gameplay_tasks.component_state",
            "component ticks only while a ticking task is active",
        ),
        scenario::<gameplay_tasks::ExternalCancelWithTick>(
            "gameplay_tasks.external_cancel_with_tick",
            "ticking task ends on external cancel",
        ),
        scenario::<gameplay_tasks::SelfEnd>(
            "gameplay_tasks.self_end",
            "task ending itself during activation",
        ),
        scenario::<gameplay_tasks::SimplePauseResume>(
            "gameplay_tasks.simple_pause_resume",
            "higher priority task pauses and releases a lower one",
        ),
        scenario::<gameplay_tasks::Priorities>(
            "gameplay_tasks.priorities",
            "queue order by priority, newest first among equals",
        ),
        scenario::<gameplay_tasks::ClaimedResources>(
            "gameplay_tasks.claimed_resources",
            "claimed but not required resources still block",
        ),
        scenario::<gameplay_tasks::ClaimedResourcesAndInstantFinish>(
            "gameplay_tasks.claimed_resources_instant_finish",
            "instantly finished task leaves no claims behind",
        ),
        scenario::<gameplay_tasks::EndAllOwnedBy>(
            "gameplay_tasks.end_all_owned_by",
            "ending an owner's tasks activates the next in line",
        ),
        scenario::<pawn_actions::PausingSamePriority>(
            "pawn_actions.pausing_same_priority",
            "new action pauses the running one at the same priority",
        ),
        scenario::<pawn_actions::SamePriorityOrder>(
            "pawn_actions.same_priority_order",
            "last action pushed within a tick wins",
        ),
        scenario::<pawn_actions::PushAndAbort>(
            "pawn_actions.push_and_abort",
            "aborting before the first tick leaves no trace",
        ),
        scenario::<pawn_actions::HighPriorityKeepRunning>(
            "pawn_actions.high_priority_keep_running",
            "lower priority push does not disturb the running action",
        ),
        scenario::<pawn_actions::PushingSameAction>(
            "pawn_actions.pushing_same_action",
            "an action instance can be pushed only once",
        ),
        scenario::<pawn_actions::ChildActions>(
            "pawn_actions.child_actions",
            "child action pauses its parent until it finishes",
        ),
    ]
}

/// Look up a scenario by exact name.
pub fn find(name: &str) -> Option<Scenario> {
    all().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let scenarios = all();
        let names: HashSet<&str> = scenarios.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_find() {
        assert!(find("pawn_actions.push_and_abort").is_some());
        assert!(find("pawn_actions").is_none());
    }
}
