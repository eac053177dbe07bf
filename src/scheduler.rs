//! The cooperative-task seam (§5, §6): `current_task()` is consumed only to
//! obtain a per-call scratch arena for argument marshalling, and to name the
//! point at which native-call invocation may cooperatively suspend.

/// A per-call scratch arena. What gets written into it is the concern of the
/// (external) argument-marshalling layer; this crate only needs somewhere to
/// hand the caller before invoking a binding's address.
pub trait ScratchArena {
    /// Mutable scratch storage valid for the duration of the current call.
    fn buffer(&mut self) -> &mut Vec<u8>;
}

/// Obtains the current cooperative task's scratch arena.
pub trait TaskExecutor: std::fmt::Debug {
    /// Concrete arena type this executor hands out.
    type Task: ScratchArena;

    /// Returns the arena for whatever task is presently running.
    fn current_task(&self) -> Self::Task;
}

/// Minimal [`TaskExecutor`] for hosts with no real fiber/task runtime: each
/// call gets a fresh heap-allocated buffer, and there is no actual
/// suspension support beyond what the caller simulates itself.
#[derive(Debug, Default)]
pub struct InlineExecutor;

/// [`ScratchArena`] handed out by [`InlineExecutor`].
#[derive(Debug, Default)]
pub struct InlineTask(Vec<u8>);

impl ScratchArena for InlineTask {
    fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

impl TaskExecutor for InlineExecutor {
    type Task = InlineTask;

    fn current_task(&self) -> Self::Task {
        InlineTask::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_executor_hands_out_independent_buffers() {
        let exec = InlineExecutor;
        let mut a = exec.current_task();
        let mut b = exec.current_task();
        a.buffer().extend_from_slice(b"hi");
        assert!(b.buffer().is_empty());
    }
}
