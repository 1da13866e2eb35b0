/// External time source that drives a session, typically the audio element
/// playing the experience's soundtrack.
///
/// Positions are in seconds and never decrease while the source is playing.
/// The duration is discovered asynchronously and stays `None` until the media
/// metadata has loaded.
pub trait ClockSource {
    fn position(&self) -> f64;

    fn duration(&self) -> Option<f64>;

    fn play(&mut self);

    fn pause(&mut self);

    fn set_position(&mut self, seconds: f64);
}

/// In-memory clock advanced explicitly by the host. Used for simulations and
/// tests where no real media element exists.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
    duration: Option<f64>,
    playing: bool,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(seconds: f64) -> Self {
        Self {
            duration: Some(seconds),
            ..Self::default()
        }
    }

    /// Simulates the media metadata arriving.
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = Some(seconds);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Moves the position forward by `delta` seconds when playing. Stops at
    /// the end of the media once the duration is known.
    pub fn advance(&mut self, delta: f64) {
        if !self.playing {
            return;
        }
        let mut next = (self.time_seconds + delta).max(0.0);
        if let Some(duration) = self.duration {
            if next >= duration {
                next = duration;
                self.playing = false;
            }
        }
        self.time_seconds = next;
    }
}

impl ClockSource for PlaybackClock {
    fn position(&self) -> f64 {
        self.time_seconds
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_position(&mut self, seconds: f64) {
        self.time_seconds = seconds.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_advances_while_playing() {
        let mut clock = PlaybackClock::new();
        clock.advance(1.0);
        assert_eq!(clock.position(), 0.0);

        clock.play();
        clock.advance(1.5);
        assert!((clock.position() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn stops_at_end_of_media() {
        let mut clock = PlaybackClock::with_duration(2.0);
        clock.play();
        clock.advance(5.0);

        assert_eq!(clock.position(), 2.0);
        assert!(!clock.is_playing());
    }
}
