//! Virtual time

use std::cell::Cell;
use std::rc::Rc;

use thrustbench_core::traits::Clock;

/// Shared virtual millisecond clock
///
/// Clones observe the same time; only the simulation driver advances it.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}
