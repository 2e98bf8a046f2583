use command_parser::Command;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Entry {
    batch: u64,
    command: Command,
}

#[derive(Debug, Default)]
struct QueueState {
    commands: VecDeque<Entry>,
    running: bool,
    current: Option<Entry>,
    next_batch: u64,
    /// First batch number appended after the current command was taken
    taken_at: u64,
}

/// Consistent view of the queue taken under a single lock
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub running: bool,
    pub current: Option<Command>,
    pub queued: usize,
}

/// FIFO of parsed commands waiting for the dispatch loop, together with the
/// running flag and the command currently being executed.
///
/// `running` is true from the first append until the queue has drained or a
/// stop has halted it. It lives under the same lock as the commands: a batch
/// appended while a stop is being processed either gets dropped with the
/// rest of the queue or re-arms the loop, never half of each.
///
/// Every appended batch is numbered, so a stop that arrived after the current
/// command was taken can be told apart from one that was already waiting
/// behind it.
#[derive(Debug, Default)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
}

impl CommandQueue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a batch in order and arm the dispatch loop if the batch is not
    /// empty. Returns the queue length afterwards.
    pub fn append(&self, batch: impl IntoIterator<Item = Command>) -> usize {
        let mut state = self.lock();
        let before = state.commands.len();
        let id = state.next_batch;
        state
            .commands
            .extend(batch.into_iter().map(|command| Entry { batch: id, command }));
        if state.commands.len() > before {
            state.next_batch += 1;
            state.running = true;
        }
        state.commands.len()
    }

    /// Take the head command and mark it current, or `None` if the queue is
    /// empty or halted.
    pub fn take_next(&self) -> Option<Command> {
        let mut state = self.lock();
        if !state.running {
            return None;
        }
        let entry = state.commands.pop_front()?;
        let command = entry.command.clone();
        state.current = Some(entry);
        state.taken_at = state.next_batch;
        Some(command)
    }

    /// Clear the current command once it has been dealt with. The queue stops
    /// running when nothing is left to dispatch.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.current = None;
        state.running = !state.commands.is_empty();
    }

    /// Drop everything still waiting and disarm the loop. Returns how many
    /// commands were dropped.
    pub fn halt(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.commands.len();
        state.commands.clear();
        state.running = false;
        dropped
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.lock();
        QueueSnapshot {
            running: state.running,
            current: state.current.as_ref().map(|entry| entry.command.clone()),
            queued: state.commands.len(),
        }
    }

    /// Whether a stop was appended while the current command was executing.
    pub fn stop_requested(&self) -> bool {
        let state = self.lock();
        state.current.is_some()
            && state
                .commands
                .iter()
                .any(|entry| entry.batch >= state.taken_at && entry.command.is_stop())
    }
}
