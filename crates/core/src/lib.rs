//! Core library for Interlude, the audio-synchronised interactive landing
//! experience.
//!
//! An [`Experience`] is a static script of timestamped events. A
//! [`TimelineEngine`] plays one session of it against an external
//! [`ClockSource`], deriving the event in effect from the playback position,
//! firing one-shot triggers, and recording the visitor's answers until a
//! choice freezes the session on a branch or ending.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod experience;
pub mod relay;
pub mod session;
pub mod timeline;
pub mod view;

pub use clock::{ClockSource, PlaybackClock};
pub use config::{AppConfig, PlaybackConfig};
pub use engine::{ChoiceOutcome, FiredEffect, InputOutcome, Phase, TimelineEngine};
pub use error::{InterludeError, Result};
pub use experience::{
    Branching, ChoiceOption, Effect, Ending, Experience, ExperienceMetadata, TimelineEvent,
    Trigger,
};
pub use relay::{LogRelay, Receipt, Submission, SubmissionRelay};
pub use session::{FiredTriggers, SessionState, CHOICE_KEY};
pub use timeline::{derive_active_event, DelayedAction, ScheduledEvent, Scheduler};
pub use view::{Marker, SessionView};
