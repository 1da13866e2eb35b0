//! Static description of one run-through: metadata, the ordered timeline of
//! narrative events, one-shot triggers and the endings a choice can lead to.
//!
//! The JSON shape mirrors the authoring format used by the site, so field
//! names on the wire are camelCase (`storeAs`, `leadsTo`, `audioFile`).

use std::{collections::BTreeMap, collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{InterludeError, Result};

/// How a choice selection concludes the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branching {
    /// Options resolve to one of the declared [`Ending`]s.
    #[default]
    Endings,
    /// Options simply freeze the session on the chosen value.
    Open,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(rename = "audioFile", default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    #[serde(default)]
    pub branching: Branching,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    pub value: String,
    #[serde(rename = "leadsTo")]
    pub leads_to: String,
}

/// A timestamped narrative event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimelineEvent {
    Text {
        time: f64,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    Input {
        time: f64,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        #[serde(default)]
        required: bool,
        /// Seconds the prompt is expected to stay up; surfaced to the renderer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<f64>,
        #[serde(rename = "storeAs")]
        store_as: String,
    },
    Choice {
        time: f64,
        question: String,
        options: Vec<ChoiceOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<f64>,
    },
}

impl TimelineEvent {
    pub fn text(time: f64, text: impl Into<String>) -> Self {
        Self::Text {
            time,
            text: text.into(),
            duration: None,
        }
    }

    pub fn input(time: f64, label: impl Into<String>, store_as: impl Into<String>) -> Self {
        Self::Input {
            time,
            label: label.into(),
            placeholder: None,
            required: true,
            timeout: None,
            store_as: store_as.into(),
        }
    }

    pub fn choice(time: f64, question: impl Into<String>, options: Vec<ChoiceOption>) -> Self {
        Self::Choice {
            time,
            question: question.into(),
            options,
            timeout: None,
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            Self::Text { time, .. } | Self::Input { time, .. } | Self::Choice { time, .. } => *time,
        }
    }

    /// Short human readable label, used for scrub bar markers and logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Input { label, .. } => label,
            Self::Choice { question, .. } => question,
        }
    }

    /// Copy of the event with `{key}` placeholders in its visible text
    /// replaced by captured values.
    pub fn render(&self, captured: &BTreeMap<String, String>) -> Self {
        let mut event = self.clone();
        match &mut event {
            Self::Text { text, .. } => *text = interpolate(text, captured),
            Self::Input {
                label, placeholder, ..
            } => {
                *label = interpolate(label, captured);
                if let Some(placeholder) = placeholder {
                    *placeholder = interpolate(placeholder, captured);
                }
            }
            Self::Choice {
                question, options, ..
            } => {
                *question = interpolate(question, captured);
                for option in options {
                    option.text = interpolate(&option.text, captured);
                }
            }
        }
        event
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Input { .. } => "input",
            Self::Choice { .. } => "choice",
        }
    }
}

impl ChoiceOption {
    pub fn new(
        text: impl Into<String>,
        value: impl Into<String>,
        leads_to: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
            leads_to: leads_to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ending {
    pub id: String,
    pub title: String,
    pub text: String,
    /// Captured values that must all match for this ending to be shown.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, String>,
}

impl Ending {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            conditions: BTreeMap::new(),
        }
    }

    pub fn with_condition(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn render(&self, captured: &BTreeMap<String, String>) -> Self {
        Self {
            title: interpolate(&self.title, captured),
            text: interpolate(&self.text, captured),
            ..self.clone()
        }
    }

    pub fn matches(&self, captured: &BTreeMap<String, String>) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| captured.get(key) == Some(expected))
    }
}

/// Side effect attached to a one-shot trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Transient full-screen flash.
    #[default]
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub time: f64,
    #[serde(default)]
    pub effect: Effect,
}

impl Trigger {
    pub fn flash(time: f64) -> Self {
        Self {
            time,
            effect: Effect::Flash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub metadata: ExperienceMetadata,
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub endings: Vec<Ending>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl Experience {
    /// Creates an empty experience with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            metadata: ExperienceMetadata {
                title: title.into(),
                duration: None,
                audio_file: None,
                branching: Branching::default(),
            },
            timeline: Vec::new(),
            endings: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.metadata.duration = Some(seconds);
        self
    }

    pub fn with_branching(mut self, branching: Branching) -> Self {
        self.metadata.branching = branching;
        self
    }

    pub fn with_event(mut self, event: TimelineEvent) -> Self {
        self.timeline.push(event);
        self
    }

    pub fn with_ending(mut self, ending: Ending) -> Self {
        self.endings.push(ending);
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Parses and validates an experience from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self> {
        let experience: Self = serde_json::from_str(raw)?;
        experience.validate()?;
        Ok(experience)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let experience = Self::from_json(&raw)?;
        tracing::debug!(
            path = %path.display(),
            title = %experience.metadata.title,
            events = experience.timeline.len(),
            "loaded experience"
        );
        Ok(experience)
    }

    pub fn ending(&self, id: &str) -> Option<&Ending> {
        self.endings.iter().find(|ending| ending.id == id)
    }

    /// Checks the invariants the engine relies on: finite, non-negative and
    /// ascending times, and choices that point at real endings.
    pub fn validate(&self) -> Result<()> {
        if let Some(duration) = self.metadata.duration {
            check_time("metadata.duration", duration)?;
        }

        let mut previous = 0.0;
        for (index, event) in self.timeline.iter().enumerate() {
            let time = event.time();
            check_time(&format!("timeline[{index}].time"), time)?;
            if time < previous {
                return Err(InterludeError::invalid(format!(
                    "timeline[{index}] at {time}s precedes the event before it ({previous}s)"
                )));
            }
            previous = time;

            match event {
                TimelineEvent::Input { store_as, .. } if store_as.trim().is_empty() => {
                    return Err(InterludeError::invalid(format!(
                        "timeline[{index}] input has an empty storeAs key"
                    )));
                }
                TimelineEvent::Choice { options, .. } => {
                    if options.is_empty() {
                        return Err(InterludeError::invalid(format!(
                            "timeline[{index}] choice has no options"
                        )));
                    }
                    if self.metadata.branching == Branching::Endings {
                        for option in options {
                            if self.ending(&option.leads_to).is_none() {
                                return Err(InterludeError::invalid(format!(
                                    "option `{}` leads to unknown ending `{}`",
                                    option.value, option.leads_to
                                )));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        for (index, trigger) in self.triggers.iter().enumerate() {
            check_time(&format!("triggers[{index}].time"), trigger.time)?;
        }

        let mut ids = HashSet::new();
        for ending in &self.endings {
            if !ids.insert(ending.id.as_str()) {
                return Err(InterludeError::invalid(format!(
                    "ending `{}` is declared twice",
                    ending.id
                )));
            }
        }

        Ok(())
    }

    /// The script shipped with the landing page.
    pub fn knock_knock() -> Self {
        Self::new("knock knock")
            .with_duration(55.0)
            .with_event(TimelineEvent::text(2.0, "welcome"))
            .with_event(TimelineEvent::text(6.0, "let's begin"))
            .with_event(TimelineEvent::text(10.0, "this is an interactive experience"))
            .with_event(TimelineEvent::text(15.0, "we're about to get to know each other"))
            .with_event(TimelineEvent::text(20.0, "are you ready?"))
            .with_event(TimelineEvent::input(23.0, "what's your first name?", "name"))
            .with_event(TimelineEvent::text(25.0, "nice to meet you, {name}"))
            .with_event(TimelineEvent::text(28.0, "i've got your name: {name}"))
            .with_event(TimelineEvent::text(
                31.0,
                "we're getting to know each other now\n\nand you can interact with me",
            ))
            .with_event(TimelineEvent::text(
                35.0,
                "{name}, you just interacted with me\n\nand i responded\n\n\
                 this is the magic of interactive experiences",
            ))
            .with_event(TimelineEvent::Input {
                time: 40.0,
                label: "thanks for the journey, {name}\n\nwould you like more experiences like this?"
                    .to_string(),
                placeholder: Some("email or phone".to_string()),
                required: true,
                timeout: None,
                store_as: "contact".to_string(),
            })
            .with_event(TimelineEvent::choice(
                46.0,
                "want to dig deeper, {name}?",
                vec![
                    ChoiceOption::new("yes", "dig-deeper", "deeper"),
                    ChoiceOption::new("not now", "later", "thanks"),
                ],
            ))
            .with_ending(Ending::new(
                "deeper",
                "thank you, {name}",
                "we'll be in touch with more",
            ))
            .with_ending(Ending::new("thanks", "thank you, {name}", "we'll be in touch"))
            .with_trigger(Trigger::flash(13.8))
    }
}

/// Replaces `{key}` with the captured value for `key`. Placeholders with no
/// captured value are left as written.
pub fn interpolate(template: &str, captured: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match captured.get(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn check_time(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InterludeError::invalid(format!(
            "{field} must be a finite, non-negative number of seconds (got {value})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "metadata": { "title": "demo", "duration": 60, "audioFile": "/audio/demo.mp3" },
        "timeline": [
            { "type": "text", "time": 2, "text": "welcome" },
            { "type": "input", "time": 5, "label": "name?", "storeAs": "name", "required": true },
            { "type": "choice", "time": 10, "question": "which way?", "options": [
                { "text": "help", "value": "support", "leadsTo": "branch-support" }
            ] }
        ],
        "endings": [
            { "id": "branch-support", "title": "thanks", "text": "bye", "conditions": { "choice": "support" } }
        ],
        "triggers": [ { "time": 3.5 } ]
    }"#;

    #[test]
    fn parses_authoring_format() {
        let experience = Experience::from_json(SCRIPT).unwrap();

        assert_eq!(experience.metadata.audio_file.as_deref(), Some("/audio/demo.mp3"));
        assert_eq!(experience.metadata.branching, Branching::Endings);
        assert_eq!(experience.timeline.len(), 3);
        assert!(matches!(
            &experience.timeline[1],
            TimelineEvent::Input { store_as, required: true, .. } if store_as == "name"
        ));
        assert_eq!(experience.triggers, vec![Trigger::flash(3.5)]);
        let ending = experience.ending("branch-support").unwrap();
        assert_eq!(ending.conditions.get("choice").map(String::as_str), Some("support"));
    }

    #[test]
    fn rejects_unsorted_timeline() {
        let experience = Experience::new("bad")
            .with_event(TimelineEvent::text(6.0, "later"))
            .with_event(TimelineEvent::text(2.0, "earlier"));

        let err = experience.validate().unwrap_err();
        assert!(matches!(err, InterludeError::InvalidExperience(_)));
    }

    #[test]
    fn rejects_negative_and_nan_times() {
        let negative = Experience::new("bad").with_event(TimelineEvent::text(-1.0, "x"));
        assert!(negative.validate().is_err());

        let nan = Experience::new("bad").with_trigger(Trigger::flash(f64::NAN));
        assert!(nan.validate().is_err());
    }

    #[test]
    fn rejects_choice_pointing_at_missing_ending() {
        let experience = Experience::new("bad").with_event(TimelineEvent::choice(
            1.0,
            "?",
            vec![ChoiceOption::new("a", "a", "nowhere")],
        ));

        let err = experience.validate().unwrap_err();
        assert!(format!("{err}").contains("nowhere"));

        let open = experience.with_branching(Branching::Open);
        assert!(open.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_endings() {
        let experience = Experience::new("bad")
            .with_ending(Ending::new("a", "", ""))
            .with_ending(Ending::new("a", "", ""));
        assert!(experience.validate().is_err());
    }

    #[test]
    fn ending_conditions_require_every_key() {
        let ending = Ending::new("e", "", "")
            .with_condition("choice", "support")
            .with_condition("name", "Alex");

        let mut captured = BTreeMap::new();
        captured.insert("choice".to_string(), "support".to_string());
        assert!(!ending.matches(&captured));

        captured.insert("name".to_string(), "Alex".to_string());
        assert!(ending.matches(&captured));
    }

    #[test]
    fn interpolates_captured_values() {
        let mut captured = BTreeMap::new();
        captured.insert("name".to_string(), "Alex".to_string());

        assert_eq!(interpolate("hi {name}!", &captured), "hi Alex!");
        assert_eq!(interpolate("{name}, {name}", &captured), "Alex, Alex");
        assert_eq!(interpolate("{contact} here", &captured), "{contact} here");
        assert_eq!(interpolate("open { brace", &captured), "open { brace");
        assert_eq!(interpolate("plain", &captured), "plain");
    }

    #[test]
    fn render_touches_only_visible_text() {
        let mut captured = BTreeMap::new();
        captured.insert("name".to_string(), "Alex".to_string());

        let choice = TimelineEvent::choice(
            1.0,
            "ready, {name}?",
            vec![ChoiceOption::new("go {name}", "{name}", "end")],
        )
        .render(&captured);
        match choice {
            TimelineEvent::Choice { question, options, .. } => {
                assert_eq!(question, "ready, Alex?");
                assert_eq!(options[0].text, "go Alex");
                assert_eq!(options[0].value, "{name}");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let ending = Ending::new("end", "thank you, {name}", "bye").render(&captured);
        assert_eq!(ending.title, "thank you, Alex");
        assert_eq!(ending.id, "end");
    }

    #[test]
    fn builtin_script_is_valid() {
        Experience::knock_knock().validate().unwrap();
    }
}
