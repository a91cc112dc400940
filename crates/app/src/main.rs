use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use bias_core::{
    BiasError, Clock, Dispatch, EngineConfig, Event, InteractiveObject, ManualClock, Stage,
    TimingHandler,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod demo;

use demo::{Hud, SceneCamera};

fn main() -> bias_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bindings { config } => run_bindings(config.as_deref()),
        Commands::Replay { script, config } => run_replay(&script, config.as_deref()),
        Commands::Timers {
            period,
            frame_rate,
            duration,
            single_shot,
        } => run_timers(period, frame_rate, duration, single_shot),
    }
}

type DemoScene = (InteractiveObject<SceneCamera>, Rc<RefCell<Hud>>);

fn load_camera(config: Option<&Path>) -> bias_core::Result<DemoScene> {
    let hud = Rc::new(RefCell::new(Hud::default()));
    let mut camera = demo::camera(hud.clone())?;
    if let Some(path) = config {
        let config = EngineConfig::load(path)?;
        let applied = camera.profile_mut().apply_config(&config);
        tracing::info!(?path, applied, "configuration applied");
    }
    Ok((camera, hud))
}

fn run_bindings(config: Option<&Path>) -> bias_core::Result<()> {
    let (camera, _) = load_camera(config)?;
    let profile = camera.profile();

    print!("{}", profile.info());
    println!("Stage handlers:");
    for stage in Stage::all().filter(|stage| profile.has_stage_handler(stage.name())) {
        println!("{stage}");
    }
    Ok(())
}

fn run_replay(script: &Path, config: Option<&Path>) -> bias_core::Result<()> {
    let (mut camera, hud) = load_camera(config)?;
    let raw = std::fs::read_to_string(script)?;
    let events: Vec<Event> = serde_json::from_str(&raw)?;
    tracing::info!(?script, events = events.len(), "replaying events");

    let mut ignored = 0;
    for event in &events {
        let dispatch = camera.handle(event);
        tracing::debug!(shortcut = %event.shortcut(), terminal = event.is_terminal(), ?dispatch);
        if dispatch == Dispatch::Ignored {
            ignored += 1;
        }
    }

    let state = camera.grabber();
    println!(
        "yaw {} zoom {} pan {} selections {} gestures {}",
        state.yaw_steps, state.zoom_steps, state.pan_steps, state.selections, state.gestures_completed
    );
    if let Some(gesture) = state.gesture {
        println!("gesture {gesture} still in progress");
    }
    println!("hud visible {} flashes {}", hud.borrow().visible, hud.borrow().flashes);
    println!("{} of {} events ignored", ignored, events.len());
    Ok(())
}

fn run_timers(period: i64, frame_rate: f32, duration: i64, single_shot: bool) -> bias_core::Result<()> {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(BiasError::msg(format!("frame rate must be positive, got {frame_rate}")));
    }
    let frame_ms = ((1000.0 / frame_rate) as i64).max(1);

    let clock = ManualClock::new();
    let mut timers = TimingHandler::<Vec<i64>, _>::new(clock.clone(), &Default::default());
    let observer = clock.clone();
    timers.schedule(period, single_shot, move |fires: &mut Vec<i64>| {
        fires.push(observer.now_millis());
    })?;
    tracing::info!(period, frame_rate, duration, single_shot, "simulating frames");

    let mut fires = Vec::new();
    let mut frames = 0;
    while clock.now_millis() < duration {
        clock.advance(frame_ms);
        frames += 1;
        timers.handle(frame_rate, &mut fires);
    }

    for (index, at) in fires.iter().enumerate() {
        let deadline = (index as i64 + 1) * period;
        println!("fire {} at {at} ms (deadline {deadline} ms, off by {})", index + 1, at - deadline);
    }
    println!("{} fires over {frames} frames of {frame_ms} ms", fires.len());
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Input binding engine demo driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the demo camera's bindings and stage handlers.
    Bindings {
        /// Extra bindings and stage handlers to register first.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Feed a JSON array of events to the demo camera.
    Replay {
        /// Path to the event script.
        script: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Simulate a frame-synchronized timer against a steady frame rate.
    Timers {
        /// Timer period in milliseconds.
        #[arg(long, default_value_t = 40)]
        period: i64,
        #[arg(long, default_value_t = 60.0)]
        frame_rate: f32,
        /// Simulated time in milliseconds.
        #[arg(long, default_value_t = 1000)]
        duration: i64,
        #[arg(long)]
        single_shot: bool,
    },
}
