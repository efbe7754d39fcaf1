mod hud;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use skyhand_fc::doctor as fc_doctor;
use skyhand_fc::sim::{SimLink, SimVehicle};
use skyhand_fc::udp::UdpLink;
use skyhand_fc::{FlightLink, LinkConfig, LinkKind, SafetyGate, SafetyThresholds};
use skyhand_input::gamepad::describe_buttons;
use skyhand_input::keyboard::{KeyBindings, KeyboardAdapter};
use skyhand_input::term::{TerminalKeyboard, DEFAULT_KEY_HOLD};
use skyhand_input::{ControllerMapping, InputAdapter, InputConfig, Scheme};
use skyhand_pilot::{startup, ControlConfig, ControlLoop, Session, StartupError};
use skyhand_vision::imaging::{grab_frame, mean_brightness, Lighting};
use skyhand_vision::overlay::OverlayConfig;
use skyhand_vision::{
    spawn_frame_task, BlankFrames, Detector, DetectorConfig, FfmpegFrames, FrameSource, HeadlessCanvas,
    RenderCanvas, VideoConfig, VideoSourceKind,
};

use crate::hud::TerminalHud;

#[derive(Debug, Parser)]
#[command(name = "skyhand", version, about = "skyhand - keyboard and gamepad teleoperation for Tello-class drones")]
struct Cli {
    /// TOML config; every field has a default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs here instead of stderr. `run` with the terminal HUD
    /// defaults to skyhand.log.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the config and, unless --offline, read the vehicle's sensors.
    Doctor {
        #[arg(long)]
        offline: bool,
        #[arg(long, value_enum)]
        link: Option<LinkArg>,
    },
    /// Connect, start video and fly.
    Run {
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
        #[arg(long, value_enum)]
        link: Option<LinkArg>,
        /// No terminal HUD; status changes go to the log.
        #[arg(long)]
        headless: bool,
    },
    /// Print the control table.
    Controls {
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemeArg {
    Keyboard,
    Gamepad,
}

impl From<SchemeArg> for Scheme {
    fn from(s: SchemeArg) -> Self {
        match s {
            SchemeArg::Keyboard => Scheme::Keyboard,
            SchemeArg::Gamepad => Scheme::Gamepad,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LinkArg {
    Udp,
    Sim,
}

impl From<LinkArg> for LinkKind {
    fn from(l: LinkArg) -> Self {
        match l {
            LinkArg::Udp => LinkKind::Udp,
            LinkArg::Sim => LinkKind::Sim,
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    link: LinkConfig,
    safety: SafetyThresholds,
    control: ControlConfig,
    input: InputConfig,
    video: VideoConfig,
    overlay: OverlayConfig,
    detector: DetectorConfig,
}

/// Frames ffmpeg may drop before the first keyframe decodes.
const DOCTOR_GRAB_ATTEMPTS: u32 = 5;
const DOCTOR_GRAB_TIMEOUT: Duration = Duration::from_secs(10);

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else { return Ok(Config::default()); };
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&s).context("parse config toml")
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("create log file {}", path.display()))?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let hud = matches!(cli.cmd, Command::Run { headless: false, .. });
    let log_file = cli.log_file.clone().or_else(|| hud.then(|| PathBuf::from("skyhand.log")));
    init_logging(log_file.as_deref())?;

    let mut cfg = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Doctor { offline, link } => {
            if let Some(l) = link {
                cfg.link.kind = l.into();
            }
            doctor(&cfg, offline).await?
        }
        Command::Run { scheme, link, headless } => {
            if let Some(s) = scheme {
                cfg.input.scheme = s.into();
            }
            if let Some(l) = link {
                cfg.link.kind = l.into();
            }
            run(&cfg, headless).await?
        }
        Command::Controls { scheme } => controls(&cfg, scheme.map(Into::into)),
    }
    Ok(())
}

fn open_link(cfg: &LinkConfig) -> Box<dyn FlightLink> {
    match cfg.kind {
        LinkKind::Udp => Box::new(UdpLink::new(cfg.clone())),
        LinkKind::Sim => Box::new(SimLink::new(SimVehicle::default())),
    }
}

/// Config checks shared by `doctor` and `run`.
fn validate(cfg: &Config) -> Result<()> {
    fc_doctor::check_thresholds(&cfg.safety)?;
    fc_doctor::check_link_config(&cfg.link)?;
    anyhow::ensure!((0..=100).contains(&cfg.control.speed), "control.speed must be 0..100");
    if cfg.control.command_interval_ms < 10 {
        warn!("control.command_interval_ms below 10; 10ms will be used");
    }
    Ok(())
}

fn init_detector(cfg: &Config) -> Result<Detector> {
    let Some(_model) = &cfg.detector.model else {
        if cfg.control.detector_enabled {
            warn!("control.detector_enabled set but detector.model is not configured");
        }
        return Ok(Detector::unavailable());
    };

    #[cfg(not(feature = "face-detect"))]
    {
        anyhow::bail!("detector.model set but binary not built with --features face-detect");
    }

    #[cfg(feature = "face-detect")]
    {
        use skyhand_vision::face::FaceLocator;
        let locator = FaceLocator::load(&cfg.detector).with_context(|| format!("load detector {}", _model))?;
        Ok(Detector::new(Some(Box::new(locator)), cfg.control.detector_enabled))
    }
}

/// Grabs one frame from the live stream and reports how well lit the scene is.
async fn check_lighting(link: &mut dyn FlightLink, video: &VideoConfig) -> Result<()> {
    link.streamon().await.context("streamon")?;
    let mut source = FfmpegFrames::new(video.clone());
    let grabbed = tokio::time::timeout(DOCTOR_GRAB_TIMEOUT, grab_frame(&mut source, DOCTOR_GRAB_ATTEMPTS)).await;
    source.close().await;
    if let Err(e) = link.streamoff().await {
        warn!("streamoff: {}", e);
    }

    let frame = match grabbed {
        Ok(Ok(frame)) => frame,
        Ok(Err(e)) => anyhow::bail!("no video frame from {}: {}", video.url, e),
        Err(_) => anyhow::bail!("no video frame from {} within {:?}", video.url, DOCTOR_GRAB_TIMEOUT),
    };
    let brightness = mean_brightness(&frame.image);
    let lighting = Lighting::classify(brightness);
    println!("video:       {}x{} frame", frame.width(), frame.height());
    println!("brightness:  {:.0}/255 ({})", brightness, lighting);
    if lighting != Lighting::Adequate {
        warn!("scene is {}", lighting);
    }
    Ok(())
}

async fn doctor(cfg: &Config, offline: bool) -> Result<()> {
    info!("doctor: starting");

    validate(cfg)?;
    init_detector(cfg)?;

    if cfg.video.source == VideoSourceKind::Ffmpeg {
        match tokio::process::Command::new(&cfg.video.ffmpeg).arg("-version").output().await {
            Ok(out) if out.status.success() => info!("doctor: {} found", cfg.video.ffmpeg),
            _ => warn!("{} not runnable; video will be unavailable", cfg.video.ffmpeg),
        }
    }

    if cfg.input.scheme == Scheme::Gamepad && !cfg!(feature = "gamepad") {
        warn!("input.scheme = gamepad but this binary was built without the gamepad feature");
    }

    if !offline {
        let mut link = open_link(&cfg.link);
        let report = fc_doctor::sensor_report(link.as_mut(), &SafetyGate::new(cfg.safety)).await?;
        print!("{}", report);

        if cfg.video.source == VideoSourceKind::Ffmpeg && cfg.link.kind == LinkKind::Udp {
            check_lighting(link.as_mut(), &cfg.video).await?;
        }
    }

    info!("doctor: OK");
    Ok(())
}

fn controls(cfg: &Config, scheme: Option<Scheme>) {
    if scheme != Some(Scheme::Gamepad) {
        println!("Keyboard");
        for (key, what) in KeyBindings::describe() {
            println!("  {:<10} {}", key, what);
        }
    }
    if scheme != Some(Scheme::Keyboard) {
        for (title, base) in [("Gamepad (PlayStation / generic)", ControllerMapping::standard()), ("Gamepad (Xbox)", ControllerMapping::xbox())] {
            let m = match &cfg.input.mapping {
                Some(o) => base.with_overrides(o),
                None => base,
            };
            println!("{} (deadzone {:.2})", title, m.deadzone);
            for (key, what) in describe_buttons(&m) {
                println!("  {:<12} {}", key, what);
            }
        }
    }
}

fn open_input(cfg: &InputConfig) -> Result<Box<dyn InputAdapter>> {
    match cfg.scheme {
        Scheme::Keyboard => {
            let hold = cfg.key_hold_ms.map(Duration::from_millis).unwrap_or(DEFAULT_KEY_HOLD);
            let kb = TerminalKeyboard::open(hold).context("open keyboard")?;
            Ok(Box::new(KeyboardAdapter::new(kb)))
        }
        #[cfg(feature = "gamepad")]
        Scheme::Gamepad => {
            use skyhand_input::gamepad::GamepadAdapter;
            use skyhand_input::gilrs_pad::GilrsGamepad;
            let pad = GilrsGamepad::open_first().context("open gamepad")?;
            Ok(Box::new(GamepadAdapter::new(pad, cfg.mapping.as_ref())))
        }
        #[cfg(not(feature = "gamepad"))]
        Scheme::Gamepad => anyhow::bail!("gamepad input needs a binary built with --features gamepad"),
    }
}

fn help_line(scheme: Scheme) -> String {
    match scheme {
        Scheme::Keyboard => KeyBindings::describe()
            .into_iter()
            .map(|(k, what)| format!("{} {}", k, what))
            .collect::<Vec<_>>()
            .join(" | "),
        Scheme::Gamepad => "Left stick: throttle/yaw | Right stick: pitch/roll | see `skyhand controls` for buttons".into(),
    }
}

/// Opens the render canvas once the stream is already on. On failure the
/// session is shut down before the error is returned.
async fn open_canvas<F>(session: &mut Session, open: F) -> Result<Box<dyn RenderCanvas>>
where
    F: FnOnce() -> Result<Box<dyn RenderCanvas>>,
{
    match open() {
        Ok(canvas) => Ok(canvas),
        Err(e) => {
            if let Err(shutdown) = session.shutdown().await {
                warn!("shutdown after canvas failure: {}", shutdown);
            }
            Err(e.context("open display"))
        }
    }
}

async fn run(cfg: &Config, headless: bool) -> Result<()> {
    info!("run: starting");
    validate(cfg)?;
    let detector = init_detector(cfg)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received");
                cancel.cancel();
            }
        });
    }

    let mut input = open_input(&cfg.input)?;

    let mut session = Session::new(open_link(&cfg.link), &cfg.control, cfg.safety, cfg.overlay.clone(), detector);

    let calibration = match cfg.link.kind {
        LinkKind::Udp => cfg.control.calibration_delay(),
        LinkKind::Sim => Duration::ZERO,
    };
    let gate = *session.gate();
    match startup(session.link_mut(), &gate, calibration, &cancel).await {
        Ok(_) => {}
        Err(StartupError::Cancelled) => {
            info!("run: cancelled during startup");
            return Ok(());
        }
        Err(e) => return Err(e).context("startup"),
    }

    let video_cancel = cancel.child_token();
    let source: Option<Box<dyn FrameSource>> = match (cfg.video.source, cfg.link.kind) {
        (VideoSourceKind::Off, _) => None,
        (VideoSourceKind::Ffmpeg, LinkKind::Udp) => Some(Box::new(FfmpegFrames::new(cfg.video.clone()))),
        (_, _) => Some(Box::new(BlankFrames::new(cfg.video.width, cfg.video.height, cfg.video.blank_fps))),
    };
    let (feed, video_task) = match source {
        Some(s) => {
            let (feed, task) = spawn_frame_task(s, video_cancel.clone());
            (Some(feed), Some(task))
        }
        None => (None, None),
    };

    let canvas = open_canvas(&mut session, || -> Result<Box<dyn RenderCanvas>> {
        if headless {
            Ok(Box::new(HeadlessCanvas::new()))
        } else {
            Ok(Box::new(TerminalHud::open(help_line(cfg.input.scheme))?))
        }
    })
    .await;
    let mut canvas = match canvas {
        Ok(c) => c,
        Err(e) => {
            video_cancel.cancel();
            if let Some(task) = video_task {
                let _ = task.await;
            }
            return Err(e);
        }
    };

    let result = ControlLoop::new(&mut session, input.as_mut(), canvas.as_mut(), feed, cfg.control.clone())
        .run(cancel.clone())
        .await;

    video_cancel.cancel();
    if let Some(task) = video_task {
        if let Err(e) = task.await {
            warn!("video task: {}", e);
        }
    }
    drop(canvas);
    drop(input);

    let exit = result.context("vehicle did not acknowledge the emergency stop; manual intervention may be required")?;
    info!("run: finished ({:?})", exit);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyhand_fc::sim::LinkCall;

    #[test]
    fn run_rejects_inverted_safety_thresholds() {
        let cfg: Config = toml::from_str("[safety]\ncritical_battery = 30\nlow_battery = 20\n").unwrap();
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("critical_battery"), "{}", err);
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn no_model_means_no_locator() {
        let cfg = Config::default();
        let detector = init_detector(&cfg).unwrap();
        assert!(!detector.state().available);
    }

    #[cfg(not(feature = "face-detect"))]
    #[test]
    fn model_without_face_detect_feature_is_an_error() {
        let cfg: Config = toml::from_str("[detector]\nmodel = \"seeta_fd_frontal_v1.0.bin\"\n").unwrap();
        assert!(init_detector(&cfg).is_err());
    }

    #[tokio::test]
    async fn canvas_failure_stops_the_stream() {
        let link = SimLink::new(SimVehicle::calm());
        let journal = link.journal();
        let mut session = Session::new(
            Box::new(link),
            &ControlConfig::default(),
            SafetyThresholds::default(),
            OverlayConfig::default(),
            Detector::unavailable(),
        );
        let gate = *session.gate();
        startup(session.link_mut(), &gate, Duration::ZERO, &CancellationToken::new()).await.unwrap();

        let result = open_canvas(&mut session, || anyhow::bail!("not a terminal")).await;

        assert!(result.is_err());
        let calls = journal.calls();
        assert_eq!(calls.last(), Some(&LinkCall::StreamOff));
        assert!(calls.contains(&LinkCall::StreamOn));
    }
}
