//! Tick-countdown scheduled callbacks (C8, §4.8).
//!
//! Ported from `original_source/utils/scheduling.py`'s `EventsScheduler`
//! (parallel `scheduled_events`/`frames_left` arrays, decrement-then-execute
//! each `update()`). The Python original stores a bound method as the
//! callback, which the distilled spec flags as a design smell (§9: "store
//! `(entity_id, method_tag, args)` records and dispatch through a finite
//! method-tag enum"); this module does exactly that instead of carrying a
//! closure.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::player::{PlayerId, ResourceKind};

/// Finite set of callback kinds a [`ScheduledEvent`] can dispatch. Extend
/// this enum, not the event's payload shape, when a new recurring tick
/// action is needed — keeps the scheduler serializable without closures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodTag {
    /// Accrue one second of yield/consumption for every player's resource
    /// ledger (§4.7's "every second: stock += yield_per_second").
    AccruePlayerResources,
    /// Re-evaluate every active scenario trigger's predicate (§4.9).
    EvaluateEventTriggers,
    /// Resume a unit's `awaited_path` after a collision wait expired, or
    /// reissue A* if still blocked (§4.5, §5's 1 s backoff).
    RetryAwaitedPath {
        /// The unit waiting on this retry.
        unit: EntityId,
    },
    /// Credit a single extraction tick's output directly to a player's
    /// stockpile (used when an extractor has no standing `recipient_player`
    /// continuous yield).
    CreditExtractedResource {
        /// Player to credit.
        player: PlayerId,
        /// Resource kind extracted.
        kind: ResourceKind,
        /// Amount extracted.
        amount: i64,
    },
}

/// One scheduled callback: a dispatch tag, an optional repeat count, and
/// bookkeeping for re-scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Dispatch payload, resolved against live simulation state by the
    /// caller of [`EventScheduler::update`].
    pub tag: MethodTag,
    /// Delay before first execution, in ticks.
    pub delay_ticks: u64,
    /// `-1` means infinite; `0` means fire once and do not reschedule;
    /// otherwise the number of additional firings after the first.
    pub repeat: i64,
}

/// Identifier returned by [`EventScheduler::schedule`], used to
/// [`EventScheduler::unschedule`] by identity rather than value equality
/// (two events with identical tags are still distinct schedule entries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleHandle(u64);

struct Entry {
    handle: ScheduleHandle,
    event: ScheduledEvent,
    frames_left: i64,
}

/// Countdown-based scheduler. `update()` must be called exactly once per
/// tick; it decrements every pending entry, then executes (via the returned
/// due list) any entry that reached zero.
#[derive(Default)]
pub struct EventScheduler {
    entries: VecDeque<Entry>,
    next_handle: u64,
}

impl EventScheduler {
    /// An empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event`, returning a handle usable with
    /// [`Self::unschedule`].
    pub fn schedule(&mut self, event: ScheduledEvent) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;
        let frames_left = event.delay_ticks as i64;
        self.entries.push_back(Entry {
            handle,
            event,
            frames_left,
        });
        handle
    }

    /// Remove a scheduled event by handle. No-op if not found.
    pub fn unschedule(&mut self, handle: ScheduleHandle) {
        self.entries.retain(|e| e.handle != handle);
    }

    /// Ticks remaining before `handle` next fires, if it is still
    /// scheduled.
    #[must_use]
    pub fn frames_left_to_execution(&self, handle: ScheduleHandle) -> Option<i64> {
        self.entries
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| e.frames_left)
    }

    /// Decrement every pending entry, then drain and return the tags due to
    /// fire this tick, in the insertion order the spec requires (§4.8:
    /// "execution order within a tick is insertion order"). Entries with a
    /// nonzero `repeat` are staged and re-appended to the queue only after
    /// this method has finished collecting the due list, satisfying §4.8's
    /// "must not mutate the scheduler's lists during iteration" rule.
    pub fn update(&mut self) -> Vec<MethodTag> {
        for entry in &mut self.entries {
            entry.frames_left -= 1;
        }

        let mut due = Vec::new();
        let mut reschedule_buffer = Vec::new();
        self.entries.retain(|entry| {
            if entry.frames_left > 0 {
                return true;
            }
            due.push(entry.event.tag.clone());
            if entry.event.repeat != 0 {
                let mut rescheduled = entry.event.clone();
                if rescheduled.repeat > 0 {
                    rescheduled.repeat -= 1;
                }
                reschedule_buffer.push(rescheduled);
            }
            false
        });

        for event in reschedule_buffer {
            self.schedule(event);
        }

        due
    }

    /// Number of entries currently pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_at_frames_left_zero() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(ScheduledEvent {
            tag: MethodTag::EvaluateEventTriggers,
            delay_ticks: 3,
            repeat: 0,
        });

        for _ in 0..2 {
            assert!(scheduler.update().is_empty());
        }
        let due = scheduler.update();
        assert_eq!(due, vec![MethodTag::EvaluateEventTriggers]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn infinite_repeat_keeps_firing() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(ScheduledEvent {
            tag: MethodTag::AccruePlayerResources,
            delay_ticks: 1,
            repeat: -1,
        });

        for _ in 0..5 {
            let due = scheduler.update();
            assert_eq!(due, vec![MethodTag::AccruePlayerResources]);
        }
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn finite_repeat_decrements_then_stops() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(ScheduledEvent {
            tag: MethodTag::AccruePlayerResources,
            delay_ticks: 1,
            repeat: 1,
        });

        assert_eq!(scheduler.update(), vec![MethodTag::AccruePlayerResources]);
        assert_eq!(scheduler.update(), vec![MethodTag::AccruePlayerResources]);
        assert!(scheduler.update().is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn unschedule_removes_by_handle() {
        let mut scheduler = EventScheduler::new();
        let handle = scheduler.schedule(ScheduledEvent {
            tag: MethodTag::EvaluateEventTriggers,
            delay_ticks: 5,
            repeat: 0,
        });
        scheduler.unschedule(handle);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn insertion_order_preserved_within_a_tick() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(ScheduledEvent {
            tag: MethodTag::RetryAwaitedPath { unit: EntityId::new(1) },
            delay_ticks: 1,
            repeat: 0,
        });
        scheduler.schedule(ScheduledEvent {
            tag: MethodTag::RetryAwaitedPath { unit: EntityId::new(2) },
            delay_ticks: 1,
            repeat: 0,
        });
        let due = scheduler.update();
        assert_eq!(
            due,
            vec![
                MethodTag::RetryAwaitedPath { unit: EntityId::new(1) },
                MethodTag::RetryAwaitedPath { unit: EntityId::new(2) },
            ]
        );
    }
}
