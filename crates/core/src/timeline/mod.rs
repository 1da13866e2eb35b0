use std::time::Duration;

use crate::TimelineEvent;

/// Index of the event in effect at `position`: the last event whose time is
/// at or before it, or `None` before the first event.
///
/// A `pinned` index (set once a branch is chosen) wins over the position so
/// the frozen state is never overwritten by a late tick or seek.
pub fn derive_active_event(
    timeline: &[TimelineEvent],
    position: f64,
    pinned: Option<usize>,
) -> Option<usize> {
    if pinned.is_some() {
        return pinned;
    }
    // Timeline is sorted ascending, see `Experience::validate`.
    let reached = timeline.partition_point(|event| event.time() <= position);
    reached.checked_sub(1)
}

/// Work deferred until some wall-clock time has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelayedAction {
    /// Hide the flash with the given sequence number.
    ClearFlash(u64),
    /// Drop the input acknowledgment and re-derive the active event.
    ResumeAfterInput,
    /// Reveal a resolved ending.
    ShowEnding(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub due: Duration,
    pub action: DelayedAction,
}

/// One-shot timers measured on a wall clock the host advances through
/// [`Scheduler::elapse`]. Independent of media position so effects expire
/// even while playback is paused.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    events: Vec<ScheduledEvent>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn schedule(&mut self, delay: Duration, action: DelayedAction) {
        let due = self.now + delay;
        // Keep events ordered by due time; equal deadlines fire in insertion order.
        let index = self.events.partition_point(|event| event.due <= due);
        self.events.insert(index, ScheduledEvent { due, action });
    }

    /// Advances the wall clock and drains every action that came due.
    pub fn elapse(&mut self, delta: Duration) -> Vec<DelayedAction> {
        self.now += delta;
        let due = self.events.partition_point(|event| event.due <= self.now);
        self.events.drain(..due).map(|event| event.action).collect()
    }

    /// Discards all pending actions. Wall time keeps running.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> Vec<TimelineEvent> {
        vec![
            TimelineEvent::text(2.0, "welcome"),
            TimelineEvent::text(6.0, "begin"),
        ]
    }

    #[test]
    fn derives_last_reached_event() {
        let timeline = timeline();

        assert_eq!(derive_active_event(&timeline, 0.0, None), None);
        assert_eq!(derive_active_event(&timeline, 2.0, None), Some(0));
        assert_eq!(derive_active_event(&timeline, 3.0, None), Some(0));
        assert_eq!(derive_active_event(&timeline, 7.0, None), Some(1));
        assert_eq!(derive_active_event(&timeline, f64::NAN, None), None);
        assert_eq!(derive_active_event(&[], 10.0, None), None);
    }

    #[test]
    fn derivation_matches_linear_scan() {
        let timeline = vec![
            TimelineEvent::text(0.5, "a"),
            TimelineEvent::text(0.5, "b"),
            TimelineEvent::text(1.25, "c"),
            TimelineEvent::text(4.0, "d"),
        ];

        for step in 0..60 {
            let position = step as f64 * 0.1;
            let expected = timeline
                .iter()
                .enumerate()
                .filter(|(_, event)| event.time() <= position)
                .map(|(index, _)| index)
                .last();
            assert_eq!(derive_active_event(&timeline, position, None), expected);
        }
    }

    #[test]
    fn pinned_index_wins() {
        let timeline = timeline();
        assert_eq!(derive_active_event(&timeline, 100.0, Some(0)), Some(0));
    }

    #[test]
    fn scheduler_fires_in_due_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_millis(300), DelayedAction::ClearFlash(1));
        scheduler.schedule(Duration::from_millis(100), DelayedAction::ResumeAfterInput);

        assert!(scheduler.elapse(Duration::from_millis(50)).is_empty());
        assert_eq!(
            scheduler.elapse(Duration::from_millis(300)),
            vec![DelayedAction::ResumeAfterInput, DelayedAction::ClearFlash(1)]
        );
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn cleared_actions_never_fire() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_secs(1), DelayedAction::ShowEnding("x".into()));
        scheduler.clear();

        assert!(scheduler.elapse(Duration::from_secs(5)).is_empty());
        assert_eq!(scheduler.now(), Duration::from_secs(5));
    }
}
