use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use interlude_core::{
    AppConfig, ChoiceOutcome, ClockSource, Experience, InputOutcome, InterludeError, LogRelay,
    Phase, PlaybackClock, TimelineEngine, TimelineEvent,
};
use tracing_subscriber::EnvFilter;

/// Upper bound on simulated polling steps, so a script without a closing
/// choice still terminates.
const MAX_STEPS: usize = 100_000;

fn main() -> interlude_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { experience } => run_validate(&experience),
        Commands::Inspect { experience, at } => run_inspect(experience.as_deref(), at),
        Commands::Simulate {
            experience,
            config,
            name,
            contact,
            choice,
            seek,
        } => {
            let config = match config {
                Some(path) => AppConfig::from_path(path)?,
                None => AppConfig::default(),
            };
            run_simulate(
                experience.as_deref(),
                &config,
                &Answers {
                    name,
                    contact,
                    choice,
                },
                seek,
            )
        }
    }
}

fn load_experience(path: Option<&Path>) -> interlude_core::Result<Experience> {
    match path {
        Some(path) => Experience::from_path(path),
        None => Ok(Experience::knock_knock()),
    }
}

fn run_validate(path: &Path) -> interlude_core::Result<()> {
    let experience = Experience::from_path(path)?;
    tracing::info!(path = %path.display(), "experience is valid");
    println!(
        "{}: {} events, {} triggers, {} endings",
        experience.metadata.title,
        experience.timeline.len(),
        experience.triggers.len(),
        experience.endings.len()
    );
    Ok(())
}

fn run_inspect(path: Option<&Path>, at: f64) -> interlude_core::Result<()> {
    let experience = load_experience(path)?;
    let clock = match experience.metadata.duration {
        Some(duration) => PlaybackClock::with_duration(duration),
        None => PlaybackClock::new(),
    };
    let mut engine = TimelineEngine::new(experience, clock, Default::default());
    engine.start();
    let position = engine.seek(at);
    tracing::info!(at, position, "inspecting");

    let report = serde_json::json!({
        "position": position,
        "active": engine.active_event(),
        "markers": engine.markers(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

struct Answers {
    name: String,
    contact: String,
    choice: Option<String>,
}

fn run_simulate(
    path: Option<&Path>,
    config: &AppConfig,
    answers: &Answers,
    seek: Option<f64>,
) -> interlude_core::Result<()> {
    let experience = load_experience(path)?;
    let engine = simulate(experience, config, answers, seek)?;

    engine.submit(&LogRelay);
    println!("{}", serde_json::to_string_pretty(&engine.view())?);
    Ok(())
}

/// Plays a session to its end in virtual time. Fails when the session can
/// no longer make progress with the answers given.
fn simulate(
    experience: Experience,
    config: &AppConfig,
    answers: &Answers,
    seek: Option<f64>,
) -> interlude_core::Result<TimelineEngine<PlaybackClock>> {
    let clock = match experience.metadata.duration {
        Some(duration) => PlaybackClock::with_duration(duration),
        None => PlaybackClock::new(),
    };
    let mut engine = TimelineEngine::new(experience, clock, config.playback.clone());
    let step = config.playback.poll_interval();

    engine.start();
    if let Some(target) = seek {
        engine.seek(target);
    }

    for _ in 0..MAX_STEPS {
        engine.clock_mut().advance(step.as_secs_f64());
        engine.elapse(step);
        for fired in engine.tick() {
            tracing::info!(time = fired.time, effect = ?fired.effect, "effect");
        }

        match engine.phase() {
            Phase::EndingShown => return Ok(engine),
            Phase::BranchSelected if engine.state().resolved_ending().is_none() => {
                return Ok(engine)
            }
            _ => {}
        }

        let progressed = respond(&mut engine, answers)?;

        let ended = engine.phase() == Phase::Running && !engine.clock().is_playing();
        if ended && !progressed && !engine.state().is_acknowledging() {
            tracing::info!(position = engine.clock().position(), "media ended");
            return Ok(engine);
        }
    }

    Err(InterludeError::msg(format!(
        "session did not finish within {MAX_STEPS} steps"
    )))
}

/// Answers whatever the active event asks for. Returns whether anything
/// changed.
fn respond(
    engine: &mut TimelineEngine<PlaybackClock>,
    answers: &Answers,
) -> interlude_core::Result<bool> {
    if engine.state().is_frozen() {
        return Ok(false);
    }
    let Some(event) = engine.active_event().cloned() else {
        return Ok(false);
    };

    match event {
        TimelineEvent::Input {
            store_as, required, ..
        } => {
            if engine.state().captured().contains_key(&store_as) {
                return Ok(false);
            }
            let value = match store_as.as_str() {
                "name" => Some(answers.name.as_str()),
                "contact" => Some(answers.contact.as_str()),
                _ => None,
            };
            let outcome = match value {
                Some(value) => engine.submit_input(&store_as, value),
                None if !required => engine.skip_input(),
                None => {
                    return Err(InterludeError::msg(format!(
                        "no answer available for required prompt `{store_as}`"
                    )))
                }
            };
            tracing::debug!(key = %store_as, ?outcome, "answered prompt");
            match outcome {
                InputOutcome::Accepted | InputOutcome::Skipped => Ok(true),
                other => Err(InterludeError::msg(format!(
                    "answer for `{store_as}` was refused ({other:?})"
                ))),
            }
        }
        TimelineEvent::Choice { options, .. } => {
            let picked = answers
                .choice
                .as_deref()
                .and_then(|wanted| options.iter().find(|option| option.value == wanted))
                .or_else(|| options.first());
            let Some(option) = picked else {
                return Ok(false);
            };
            let outcome = engine.select_choice(option);
            tracing::info!(value = %option.value, ?outcome, "choice made");
            match outcome {
                ChoiceOutcome::Branch(_) | ChoiceOutcome::Ending(_) => Ok(true),
                ChoiceOutcome::Unresolved => Err(InterludeError::msg(format!(
                    "option `{}` leads to no ending that matches the captured data",
                    option.value
                ))),
                ChoiceOutcome::Ignored => Ok(false),
            }
        }
        TimelineEvent::Text { .. } => Ok(false),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-synchronised interactive experience runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load an experience script and check it for mistakes.
    Validate {
        /// Path to the experience JSON file.
        experience: PathBuf,
    },
    /// Show which event is in effect at a given position.
    Inspect {
        /// Experience JSON file; the built-in script is used when omitted.
        #[arg(short, long)]
        experience: Option<PathBuf>,
        /// Playback position in seconds.
        #[arg(long)]
        at: f64,
    },
    /// Play a whole session in virtual time, answering every prompt.
    Simulate {
        /// Experience JSON file; the built-in script is used when omitted.
        #[arg(short, long)]
        experience: Option<PathBuf>,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Answer for the name prompt.
        #[arg(long)]
        name: String,
        /// Answer for the contact prompt.
        #[arg(long)]
        contact: String,
        /// Value of the option to pick; defaults to the first one.
        #[arg(long)]
        choice: Option<String>,
        /// Seek here right after starting.
        #[arg(long)]
        seek: Option<f64>,
    },
}

#[cfg(test)]
mod tests {
    use interlude_core::{Ending, TimelineEvent};

    use super::*;

    fn answers() -> Answers {
        Answers {
            name: "Alex".to_string(),
            contact: "alex@example.com".to_string(),
            choice: None,
        }
    }

    fn with_choice(ending: Ending) -> Experience {
        Experience::new("choice")
            .with_duration(10.0)
            .with_event(TimelineEvent::input(1.0, "name?", "name"))
            .with_event(TimelineEvent::choice(
                4.0,
                "which way?",
                vec![interlude_core::ChoiceOption::new("help", "support", "only")],
            ))
            .with_ending(ending)
    }

    #[test]
    fn builtin_script_reaches_an_ending() {
        let engine = simulate(Experience::knock_knock(), &AppConfig::default(), &answers(), None)
            .unwrap();

        assert_eq!(engine.phase(), Phase::EndingShown);
        let view = engine.view();
        assert_eq!(view.captured.get("name").map(String::as_str), Some("Alex"));
        assert_eq!(view.ending.unwrap().title, "thank you, Alex");
    }

    #[test]
    fn unresolvable_choice_fails_fast() {
        let experience = with_choice(Ending::new("only", "", "").with_condition("name", "Sam"));

        let err = simulate(experience, &AppConfig::default(), &answers(), None).unwrap_err();
        assert!(format!("{err}").contains("support"));
    }

    #[test]
    fn resolvable_choice_finishes() {
        let experience = with_choice(Ending::new("only", "bye {name}", ""));

        let engine = simulate(experience, &AppConfig::default(), &answers(), None).unwrap();
        assert_eq!(engine.view().ending.unwrap().title, "bye Alex");
    }

    #[test]
    fn required_prompt_without_answer_fails() {
        let experience = Experience::new("mood")
            .with_duration(5.0)
            .with_event(TimelineEvent::input(1.0, "how are you?", "mood"));

        let err = simulate(experience, &AppConfig::default(), &answers(), None).unwrap_err();
        assert!(format!("{err}").contains("mood"));
    }

    #[test]
    fn blank_answer_fails() {
        let blank = Answers {
            name: "   ".to_string(),
            ..answers()
        };
        let experience = with_choice(Ending::new("only", "", ""));

        let err = simulate(experience, &AppConfig::default(), &blank, None).unwrap_err();
        assert!(format!("{err}").contains("name"));
    }

    #[test]
    fn answered_prompt_at_end_of_media_stops() {
        let experience = Experience::new("short")
            .with_duration(3.0)
            .with_event(TimelineEvent::input(1.0, "name?", "name"));

        let engine = simulate(experience, &AppConfig::default(), &answers(), None).unwrap();
        assert_eq!(engine.phase(), Phase::Running);
        assert!(!engine.clock().is_playing());
        assert_eq!(
            engine.state().captured().get("name").map(String::as_str),
            Some("Alex")
        );
    }
}
