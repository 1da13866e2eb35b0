use std::collections::{BTreeMap, BTreeSet};

/// Captured-data key under which a choice selection is recorded.
pub const CHOICE_KEY: &str = "choice";

/// Trigger timestamps that already fired this session.
///
/// Membership is by exact timestamp, so seeking back and forth over a
/// trigger never fires it a second time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiredTriggers(BTreeSet<u64>);

/// `-0.0 + 0.0` is `+0.0`, so both zeros share one key.
fn key(time: f64) -> u64 {
    (time + 0.0).to_bits()
}

impl FiredTriggers {
    pub fn contains(&self, time: f64) -> bool {
        self.0.contains(&key(time))
    }

    /// Returns `true` when `time` had not fired yet.
    pub fn insert(&mut self, time: f64) -> bool {
        self.0.insert(key(time))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().map(|bits| f64::from_bits(*bits))
    }
}

/// Mutable state of one play-through. Owned by a single engine and replaced
/// wholesale on start and stop, so nothing carries over between sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub(crate) position: f64,
    pub(crate) paused: bool,
    pub(crate) active: Option<usize>,
    pub(crate) captured: BTreeMap<String, String>,
    pub(crate) ending: Option<String>,
    pub(crate) ending_shown: bool,
    pub(crate) fired: FiredTriggers,
    pub(crate) selected_branch: Option<String>,
    pub(crate) acknowledging: bool,
    pub(crate) flash: Option<u64>,
}

impl SessionState {
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Index into the experience timeline of the event in effect.
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn captured(&self) -> &BTreeMap<String, String> {
        &self.captured
    }

    /// Ending resolved by a choice, whether or not it is visible yet.
    pub fn resolved_ending(&self) -> Option<&str> {
        self.ending.as_deref()
    }

    pub fn ending_shown(&self) -> bool {
        self.ending_shown
    }

    pub fn fired(&self) -> &FiredTriggers {
        &self.fired
    }

    pub fn selected_branch(&self) -> Option<&str> {
        self.selected_branch.as_deref()
    }

    /// Once a branch is chosen the timeline no longer follows the clock.
    pub fn is_frozen(&self) -> bool {
        self.selected_branch.is_some()
    }

    pub fn is_acknowledging(&self) -> bool {
        self.acknowledging
    }

    pub fn flash_active(&self) -> bool {
        self.flash.is_some()
    }

    /// Writes a captured value, replacing any earlier value under `key`.
    pub(crate) fn capture(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.captured.insert(key.into(), value.into());
    }
}
