use std::collections::BTreeMap;

use serde::Serialize;

use crate::{engine::Phase, Ending, TimelineEvent};

/// Snapshot of everything the rendering layer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    pub position: f64,
    pub duration: Option<f64>,
    pub active: Option<TimelineEvent>,
    /// An input was just accepted and its acknowledgment is on screen.
    pub acknowledging: bool,
    pub flash: bool,
    pub captured: BTreeMap<String, String>,
    pub selected_branch: Option<String>,
    pub ending: Option<Ending>,
}

impl SessionView {
    /// Playback progress in `[0, 1]`, once the duration is known.
    pub fn progress(&self) -> Option<f64> {
        self.duration
            .filter(|duration| *duration > 0.0)
            .map(|duration| (self.position / duration).clamp(0.0, 1.0))
    }

    /// `"12s / 45s"`, or `"12s / ?s"` while the duration is unknown.
    pub fn time_counter(&self) -> String {
        match self.duration {
            Some(duration) => format!("{}s / {}s", self.position.floor(), duration.floor()),
            None => format!("{}s / ?s", self.position.floor()),
        }
    }
}

/// A point on the scrub bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub time: f64,
    pub kind: &'static str,
    pub label: String,
    /// Horizontal offset as a percentage of the track, when the duration is
    /// known.
    pub percent: Option<f64>,
}

pub fn markers(timeline: &[TimelineEvent], duration: Option<f64>) -> Vec<Marker> {
    let duration = duration.filter(|duration| *duration > 0.0);
    timeline
        .iter()
        .map(|event| Marker {
            time: event.time(),
            kind: event.kind(),
            label: event.label().to_string(),
            percent: duration.map(|duration| event.time() / duration * 100.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(position: f64, duration: Option<f64>) -> SessionView {
        SessionView {
            phase: Phase::Running,
            position,
            duration,
            active: None,
            acknowledging: false,
            flash: false,
            captured: BTreeMap::new(),
            selected_branch: None,
            ending: None,
        }
    }

    #[test]
    fn formats_time_counter() {
        assert_eq!(view(12.7, Some(45.2)).time_counter(), "12s / 45s");
        assert_eq!(view(3.0, None).time_counter(), "3s / ?s");
    }

    #[test]
    fn progress_needs_a_duration() {
        assert_eq!(view(5.0, None).progress(), None);
        assert_eq!(view(5.0, Some(10.0)).progress(), Some(0.5));
    }

    #[test]
    fn markers_are_placed_relative_to_duration() {
        let timeline = vec![
            TimelineEvent::text(2.0, "welcome"),
            TimelineEvent::input(5.0, "name?", "name"),
        ];

        let placed = markers(&timeline, Some(10.0));
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].percent, Some(20.0));
        assert_eq!(placed[1].kind, "input");
        assert_eq!(placed[1].label, "name?");

        assert!(markers(&timeline, None).iter().all(|marker| marker.percent.is_none()));
    }
}
