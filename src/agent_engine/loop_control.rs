/// Step budget for one task run.
#[derive(Debug, Clone)]
pub struct LoopController {
    max_steps: u32,
    step: u32,
    failure_count: u32,
}

impl LoopController {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            step: 0,
            failure_count: 0,
        }
    }

    /// Advances to the next 1-based step, or `None` once the budget is spent.
    pub fn next_step(&mut self) -> Option<u32> {
        if self.step >= self.max_steps {
            return None;
        }
        self.step += 1;
        Some(self.step)
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// At most one step of budget remains after the current one.
    pub fn is_last_step(&self) -> bool {
        self.step + 1 >= self.max_steps
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    pub fn failures(&self) -> u32 {
        self.failure_count
    }
}
