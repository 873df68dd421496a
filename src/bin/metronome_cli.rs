use std::fs;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use practice_metronome::config::AppConfig;
use practice_metronome::engine::ManualClock;
use practice_metronome::metronome::{BeatIndicator, MetronomeEvent, StopAfter, StopReason};
use practice_metronome::testing::{FakeAudioDevice, RecordingListener, TriggeredClick};
use practice_metronome::{
    AudioError, BeatListener, BeatScheduler, ErrorCode, Metronome, MetronomeMode,
    MetronomeSettings, TimeSignature,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "metronome_cli",
    about = "Lookahead practice metronome with a virtual-clock dry run"
)]
struct Cli {
    /// JSON configuration file (defaults to assets/metronome_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play clicks on the default output device until Ctrl-C
    Play {
        #[command(flatten)]
        settings: SettingsArgs,
        /// Stop after this many bars
        #[arg(long)]
        bars: Option<u32>,
    },
    /// Run the scheduler against a virtual clock and print every event as JSON
    Schedule {
        #[command(flatten)]
        settings: SettingsArgs,
        /// Stop after this many bars
        #[arg(long)]
        bars: Option<u32>,
        /// Virtual seconds to run for (upper bound when the run ends on its own)
        #[arg(long)]
        seconds: Option<f64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List supported time signatures
    Signatures,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,
    /// One of 4/4, 6/8, 9/8
    #[arg(long = "time", visible_alias = "signature", default_value = "4/4")]
    signature: TimeSignature,
    /// `loop` or `count-in`
    #[arg(long, default_value = "loop")]
    mode: MetronomeMode,
}

impl SettingsArgs {
    fn settings(&self) -> MetronomeSettings {
        MetronomeSettings::new(self.bpm, self.signature, self.mode)
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    practice_metronome::init_logging();

    let config = match cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Play { settings, bars } => run_play(&config, &settings, bars),
        Commands::Schedule {
            settings,
            bars,
            seconds,
            output,
        } => run_schedule(&config, &settings, bars, seconds, output),
        Commands::Signatures => run_signatures(),
    }
}

#[cfg(not(target_os = "android"))]
fn run_play(config: &AppConfig, args: &SettingsArgs, bars: Option<u32>) -> Result<ExitCode> {
    use practice_metronome::audio::CpalDevice;
    use practice_metronome::engine::SystemClock;
    use practice_metronome::RunOutcome;

    let settings = args.settings();
    settings.validate()?;

    let console = ConsoleListener::new(settings.time_signature);
    let listener: Box<dyn BeatListener> = match bar_beats(&settings, bars)? {
        Some(beats) => Box::new(StopAfter::beats(console, beats)),
        None => Box::new(console),
    };

    let device = CpalDevice::new(config.click.clone(), config.audio.clone());
    let scheduler = BeatScheduler::new(Box::new(device), listener, config.metronome.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let mut metronome = Metronome::new(scheduler, SystemClock::new());
        metronome.start(settings)?;
        tracing::info!(
            "Playing {} BPM in {} ({:?}); Ctrl-C to stop",
            settings.tempo_bpm,
            settings.time_signature,
            settings.mode
        );

        let outcome = metronome
            .run_until(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Ctrl-C handler unavailable: {err}");
                    std::future::pending::<()>().await;
                }
            })
            .await;

        match outcome {
            RunOutcome::Finished(Some(StopReason::Failed(err))) => {
                Err(anyhow::Error::new(err).context("metronome stopped"))
            }
            _ => Ok::<_, anyhow::Error>(ExitCode::from(0)),
        }
    })
}

#[cfg(target_os = "android")]
fn run_play(_config: &AppConfig, _args: &SettingsArgs, _bars: Option<u32>) -> Result<ExitCode> {
    bail!("play needs a desktop audio backend")
}

fn run_schedule(
    config: &AppConfig,
    args: &SettingsArgs,
    bars: Option<u32>,
    seconds: Option<f64>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let settings = args.settings();
    settings.validate()?;
    let bar_beats = bar_beats(&settings, bars)?;
    let seconds = match (seconds, bar_beats) {
        (Some(seconds), _) => seconds,
        // Long enough for every requested beat plus the start margin.
        (None, Some(beats)) => beats as f64 * settings.seconds_per_beat() + 1.0,
        (None, None) => 4.0,
    };
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("--seconds must be a positive number (got {seconds})");
    }
    let window = Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("--seconds {seconds} is out of range"))?;

    let clock = ManualClock::new();
    let device = FakeAudioDevice::new(clock.clone());
    let control = device.control();
    let listener = RecordingListener::new(clock.clone());
    let log = listener.log();
    let listener: Box<dyn BeatListener> = match bar_beats {
        Some(beats) => Box::new(StopAfter::beats(listener, beats)),
        None => Box::new(listener),
    };
    let scheduler = BeatScheduler::new(Box::new(device), listener, config.metronome.clone());
    let mut metronome = Metronome::new(scheduler, clock);

    metronome.start(settings)?;
    if bar_beats.is_some() || settings.mode == MetronomeMode::CountIn {
        metronome.run_to_end(window);
    } else {
        metronome.run_for(window);
    }
    metronome.stop();

    let events: Vec<ReportEvent> = log
        .events()
        .into_iter()
        .map(|recorded| ReportEvent {
            at: recorded.at.as_secs_f64(),
            event: recorded.event,
        })
        .collect();
    let clicks = control.clicks();

    let report = ScheduleReport {
        tempo_bpm: settings.tempo_bpm,
        time_signature: settings.time_signature,
        mode: settings.mode,
        beats_per_bar: settings.time_signature.beats_per_bar(),
        seconds_per_beat: settings.seconds_per_beat(),
        stop_reason: describe_stop(metronome.scheduler().last_stop_reason()),
        event_count: events.len(),
        events: &events,
        clicks: &clicks,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(ExitCode::from(0))
}

fn run_signatures() -> Result<ExitCode> {
    for signature in TimeSignature::ALL {
        println!("{}\t{} beats per bar", signature, signature.beats_per_bar());
    }
    Ok(ExitCode::from(0))
}

/// Beats in `bars` bars of the configured signature.
fn bar_beats(settings: &MetronomeSettings, bars: Option<u32>) -> Result<Option<u64>> {
    match bars {
        Some(0) => bail!("--bars must be at least 1"),
        Some(bars) => Ok(Some(
            u64::from(bars) * u64::from(settings.time_signature.beats_per_bar()),
        )),
        None => Ok(None),
    }
}

fn describe_stop(reason: Option<&StopReason>) -> &'static str {
    match reason {
        None => "running",
        Some(StopReason::Stopped) => "stopped",
        Some(StopReason::Completed) => "completed",
        Some(StopReason::Failed(_)) => "failed",
    }
}

#[derive(Serialize)]
struct ReportEvent {
    /// Host seconds since start of the dry run
    at: f64,
    #[serde(flatten)]
    event: MetronomeEvent,
}

#[derive(Serialize)]
struct ScheduleReport<'a> {
    tempo_bpm: f64,
    time_signature: TimeSignature,
    mode: MetronomeMode,
    beats_per_bar: u32,
    seconds_per_beat: f64,
    stop_reason: &'static str,
    event_count: usize,
    events: &'a [ReportEvent],
    #[serde(skip_serializing_if = "clicks_empty")]
    clicks: &'a [TriggeredClick],
}

fn clicks_empty(clicks: &&[TriggeredClick]) -> bool {
    clicks.is_empty()
}

/// Prints the beat indicator on every beat change.
struct ConsoleListener {
    indicator: BeatIndicator,
}

impl ConsoleListener {
    fn new(time_signature: TimeSignature) -> Self {
        Self {
            indicator: BeatIndicator::new(time_signature),
        }
    }
}

impl BeatListener for ConsoleListener {
    fn on_beat_change(&mut self, beat_index: u32) -> ControlFlow<()> {
        self.indicator.set_beat(beat_index);
        match self.indicator.active_beat() {
            Some(beat) => println!("{}  {}", self.indicator.render(), beat),
            None => println!("{}  stopped", self.indicator.render()),
        }
        ControlFlow::Continue(())
    }

    fn on_complete(&mut self) {
        println!("count-in complete");
    }

    fn on_error(&mut self, error: &AudioError) {
        eprintln!("audio error {}: {}", error.code(), error.message());
    }
}
