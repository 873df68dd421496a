//! Host timer queue.
//!
//! One-shot timers keyed by host-clock due time. The queue never runs
//! anything itself; the event loop pops due tasks and dispatches them, so
//! every callback runs on the loop's single thread, one at a time.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Handle returned by [`TimerQueue::schedule`], used to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Work items the scheduler posts to the host loop.
///
/// Each task carries the run generation it was created for so a task from a
/// finished run can be recognized and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    Lookahead { generation: u64 },
    NotifyBeat { generation: u64, beat_index: u32 },
    Complete { generation: u64 },
}

#[derive(Debug)]
struct Entry {
    due: Duration,
    id: TimerId,
    task: TimerTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Equal due times fire in scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.id).cmp(&(other.due, other.id))
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_id: u64,
    heap: BinaryHeap<Reverse<Entry>>,
    live: HashSet<TimerId>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host time as last observed by the event loop.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Run `task` after `delay` of host time.
    pub fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.schedule_at(self.now + delay, task)
    }

    /// Run `task` at host time `due` (or as soon as possible if already past).
    pub fn schedule_at(&mut self, due: Duration, task: TimerTask) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse(Entry { due, id, task }));
        self.live.insert(id);
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.live.remove(&id)
    }

    /// Number of timers that will still fire.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Due time of the earliest live timer.
    pub fn next_due(&mut self) -> Option<Duration> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Remove and return the earliest live timer if it is due at `now`.
    pub fn pop_due(&mut self) -> Option<(TimerId, TimerTask)> {
        self.discard_cancelled();
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.due <= self.now => {}
            _ => return None,
        }
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&entry.id);
        Some((entry.id, entry.task))
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.live.contains(&entry.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookahead() -> TimerTask {
        TimerTask::Lookahead { generation: 1 }
    }

    #[test]
    fn test_pop_respects_due_time() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_millis(25), lookahead());
        assert!(timers.pop_due().is_none());

        timers.set_now(Duration::from_millis(25));
        assert_eq!(timers.pop_due().map(|(_, task)| task), Some(lookahead()));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_fires_in_due_order_then_fifo() {
        let mut timers = TimerQueue::new();
        let late = timers.schedule(Duration::from_millis(30), lookahead());
        let first = timers.schedule(Duration::from_millis(10), lookahead());
        let second = timers.schedule(Duration::from_millis(10), lookahead());

        timers.set_now(Duration::from_millis(50));
        let order: Vec<TimerId> = std::iter::from_fn(|| timers.pop_due().map(|(id, _)| id)).collect();
        assert_eq!(order, vec![first, second, late]);
    }

    #[test]
    fn test_cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(Duration::from_millis(5), lookahead());
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert_eq!(timers.next_due(), None);

        timers.set_now(Duration::from_secs(1));
        assert!(timers.pop_due().is_none());
    }

    #[test]
    fn test_time_never_moves_backwards() {
        let mut timers = TimerQueue::new();
        timers.set_now(Duration::from_millis(100));
        timers.set_now(Duration::from_millis(10));
        assert_eq!(timers.now(), Duration::from_millis(100));

        timers.schedule(Duration::from_millis(5), lookahead());
        assert_eq!(timers.next_due(), Some(Duration::from_millis(105)));
    }
}
