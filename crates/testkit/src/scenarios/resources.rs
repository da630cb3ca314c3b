//! Resource set and lock scenarios.

use crate::harness::{AiTest, TestEnv, TestFailure};
use crate::{ai_test_equal, ai_test_false, ai_test_true};
use gametask_core::{AiRequestPriority, ResourceId, ResourceLock, ResourceSet, MAX_RESOURCES};

#[derive(Default)]
pub struct SetAlgebra {
    samples: Vec<ResourceSet>,
    movement: Option<ResourceId>,
}

impl AiTest for SetAlgebra {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        self.movement = Some(env.resource("Movement")?);
        self.samples = [0u16, 1, 0b1010, 0b0110, 0x8001, 0x00ff, 0xffff]
            .into_iter()
            .map(ResourceSet::from_bits)
            .collect();
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        for a in &self.samples {
            ai_test_true!(a.has_all_ids(*a), "{} should contain itself", a);
            for b in &self.samples {
                ai_test_equal!(a.overlap(*b), b.overlap(*a), "overlap symmetry");
                ai_test_equal!(
                    a.difference(*b).bits(),
                    a.bits() & !b.bits(),
                    "difference bits"
                );
                ai_test_equal!(
                    a.has_any_id(*b),
                    !a.overlap(*b).is_empty(),
                    "any id matches overlap"
                );
            }
        }

        let movement = self
            .movement
            .ok_or_else(|| TestFailure::SetUp("no movement resource".to_string()))?;
        let mut set = ResourceSet::EMPTY;
        ai_test_true!(set.is_empty(), "fresh set is empty");
        set.add_id(movement);
        ai_test_true!(set.has_id(movement), "added id is present");
        set.add_id(movement);
        ai_test_equal!(set.len(), 1, "adding twice");
        set.remove_id(movement);
        ai_test_true!(set.is_empty(), "add then remove restores emptiness");

        ai_test_false!(
            ResourceId::new(MAX_RESOURCES as u8).is_some(),
            "index {} is out of range",
            MAX_RESOURCES
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct LockPriorities;

impl AiTest for LockPriorities {
    fn instant_test(&mut self) -> Result<(), TestFailure> {
        for locked in AiRequestPriority::ALL {
            let mut lock = ResourceLock::new();
            lock.set_lock(locked);
            ai_test_true!(lock.is_locked_by(locked), "locked by {}", locked);

            for request in AiRequestPriority::ALL {
                ai_test_equal!(
                    lock.is_available_for(request),
                    request > locked,
                    format!("lock at {} requested at {}", locked, request)
                );
            }

            for other in AiRequestPriority::ALL.into_iter().filter(|p| *p != locked) {
                lock.clear_lock(other);
            }
            ai_test_true!(lock.is_locked(), "clearing other levels keeps the {} lock", locked);

            lock.clear_lock(locked);
            ai_test_false!(lock.is_locked(), "{} lock cleared", locked);
        }

        let mut lock = ResourceLock::new();
        lock.set_lock(AiRequestPriority::Logic);
        lock.set_lock(AiRequestPriority::Reaction);
        ai_test_false!(
            lock.is_available_for(AiRequestPriority::HardScript),
            "highest lock decides"
        );
        lock.clear_lock(AiRequestPriority::Reaction);
        ai_test_true!(
            lock.is_available_for(AiRequestPriority::HardScript),
            "lower lock left alone"
        );
        Ok(())
    }
}
