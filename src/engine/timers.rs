use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use super::Task;

#[derive(Debug)]
struct Entry {
    due: Duration,
    seq: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Pending tasks of one room on a logical clock.
///
/// The clock only moves when the owner says so, which keeps the scheduler
/// deterministic under test. Tasks due at the same instant run in the order
/// they were scheduled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    seq: u64,
    heap: BinaryHeap<Reverse<Entry>>,
}

impl TimerQueue {
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn schedule(&mut self, delay: Duration, task: Task) {
        self.seq += 1;
        self.heap.push(Reverse(Entry {
            due: self.now + delay,
            seq: self.seq,
            task,
        }));
    }

    /// Drop every pending task, returning how many were dropped
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.heap.len();
        self.heap.clear();
        dropped
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(e)| e.due)
    }

    /// Move the clock forward; it never goes back
    pub fn advance_to(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Pop the earliest task if it is due at the current clock
    pub fn pop_due(&mut self) -> Option<Task> {
        if self.next_due()? > self.now {
            return None;
        }
        self.heap.pop().map(|Reverse(e)| e.task)
    }

    /// Jump the clock to the earliest task and pop it
    pub fn pop_next(&mut self) -> Option<Task> {
        let Reverse(entry) = self.heap.pop()?;
        self.advance_to(entry.due);
        Some(entry.task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_pops_in_due_order() {
        let mut q = TimerQueue::default();
        q.schedule(ms(300), Task::ResolveNight);
        q.schedule(ms(100), Task::WakeMafia);
        q.schedule(ms(200), Task::StartDay);

        assert_eq!(q.pop_next(), Some(Task::WakeMafia));
        assert_eq!(q.now(), ms(100));
        assert_eq!(q.pop_next(), Some(Task::StartDay));
        assert_eq!(q.pop_next(), Some(Task::ResolveNight));
        assert_eq!(q.pop_next(), None);
    }

    #[test]
    fn test_same_instant_keeps_schedule_order() {
        let mut q = TimerQueue::default();
        q.schedule(ms(50), Task::StartVoting);
        q.schedule(ms(50), Task::ResolveVoting);
        assert_eq!(q.pop_next(), Some(Task::StartVoting));
        assert_eq!(q.pop_next(), Some(Task::ResolveVoting));
    }

    #[test]
    fn test_pop_due_respects_clock() {
        let mut q = TimerQueue::default();
        q.schedule(ms(100), Task::StartNight);
        assert_eq!(q.pop_due(), None);

        q.advance_to(ms(99));
        assert_eq!(q.pop_due(), None);

        q.advance_to(ms(100));
        assert_eq!(q.pop_due(), Some(Task::StartNight));
    }

    #[test]
    fn test_delays_are_relative_to_clock() {
        let mut q = TimerQueue::default();
        q.advance_to(ms(1000));
        q.schedule(ms(10), Task::StartDay);
        assert_eq!(q.next_due(), Some(ms(1010)));
    }

    #[test]
    fn test_cancel_all() {
        let mut q = TimerQueue::default();
        q.schedule(ms(1), Task::StartDay);
        q.schedule(ms(2), Task::StartVoting);
        assert_eq!(q.cancel_all(), 2);
        assert!(q.is_empty());
        assert_eq!(q.next_due(), None);
    }

    #[test]
    fn test_clock_never_goes_back() {
        let mut q = TimerQueue::default();
        q.advance_to(ms(500));
        q.advance_to(ms(100));
        assert_eq!(q.now(), ms(500));
    }
}
