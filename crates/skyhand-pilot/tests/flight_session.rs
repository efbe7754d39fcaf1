use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use skyhand_fc::sim::{LinkCall, SimFaults, SimJournal, SimLink, SimVehicle};
use skyhand_fc::{FlightError, SafetyThresholds};
use skyhand_input::{Action, Control, InputAdapter, InputSnapshot};
use skyhand_pilot::{ControlConfig, ControlLoop, LoopExit, Session};
use skyhand_proto::{FlightState, VelocityCommand};
use skyhand_vision::overlay::{OverlayConfig, View};
use skyhand_vision::overlay::{Color, DrawInstruction};
use skyhand_vision::{spawn_frame_task, BlankFrames, Detector, Frame, HeadlessCanvas, RenderCanvas};
use tokio_util::sync::CancellationToken;

/// Replays one snapshot per tick, then reports neutral input.
struct Script {
    ticks: VecDeque<InputSnapshot>,
    panic_when_empty: bool,
}

impl Script {
    fn new(ticks: Vec<InputSnapshot>) -> Self {
        Self { ticks: ticks.into(), panic_when_empty: false }
    }
}

impl InputAdapter for Script {
    fn poll(&mut self) -> InputSnapshot {
        match self.ticks.pop_front() {
            Some(s) => s,
            None if self.panic_when_empty => panic!("input device exploded"),
            None => InputSnapshot::neutral(),
        }
    }

    fn describe(&self) -> String {
        "scripted input".into()
    }
}

fn act(a: Action) -> InputSnapshot {
    InputSnapshot { actions: vec![a], ..InputSnapshot::neutral() }
}

fn hold(controls: &[Control]) -> InputSnapshot {
    InputSnapshot { held: controls.iter().copied().collect(), ..InputSnapshot::neutral() }
}

fn idle(n: usize) -> Vec<InputSnapshot> {
    vec![InputSnapshot::neutral(); n]
}

fn session_with(link: SimLink) -> (Session, SimJournal) {
    let journal = link.journal();
    let session = Session::new(
        Box::new(link),
        &ControlConfig::default(),
        SafetyThresholds::default(),
        OverlayConfig::default(),
        Detector::unavailable(),
    );
    (session, journal)
}

async fn run(
    session: &mut Session,
    script: &mut Script,
    canvas: &mut HeadlessCanvas,
) -> Result<LoopExit, FlightError> {
    ControlLoop::new(session, script, canvas, None, ControlConfig::default())
        .run(CancellationToken::new())
        .await
}

#[tokio::test(start_paused = true)]
async fn takeoff_fly_land_quit() {
    let (mut session, journal) = session_with(SimLink::new(SimVehicle::calm()));
    let mut ticks = vec![act(Action::Takeoff)];
    ticks.extend(vec![hold(&[Control::Forward, Control::YawRight]); 3]);
    ticks.push(act(Action::Land));
    ticks.extend(idle(2));
    ticks.push(act(Action::Quit));
    let mut script = Script::new(ticks);
    let mut canvas = HeadlessCanvas::new();

    let exit = run(&mut session, &mut script, &mut canvas).await.unwrap();
    assert_eq!(exit, LoopExit::Quit);
    assert_eq!(session.state(), FlightState::Grounded);

    let calls = journal.calls();
    let takeoff = calls.iter().position(|c| *c == LinkCall::Takeoff).unwrap();
    let land = calls.iter().position(|c| *c == LinkCall::Land).unwrap();
    assert!(takeoff < land);
    assert_eq!(journal.count(LinkCall::Land), 1);
    assert!(calls.contains(&LinkCall::SetVelocity(VelocityCommand::new(0, 50, 0, 50))));
    assert_eq!(calls.last(), Some(&LinkCall::StreamOff));
    assert!(canvas.is_released());
    assert!(canvas.submissions() >= 2);
}

#[tokio::test(start_paused = true)]
async fn nothing_is_transmitted_while_grounded() {
    let (mut session, journal) = session_with(SimLink::new(SimVehicle::calm()));
    let mut ticks = vec![hold(&[Control::Up, Control::Left]); 5];
    ticks.push(act(Action::Land));
    ticks.push(act(Action::Quit));
    let mut script = Script::new(ticks);

    run(&mut session, &mut script, &mut HeadlessCanvas::new()).await.unwrap();
    assert!(!journal.calls().iter().any(|c| c.is_motion()));
}

#[tokio::test(start_paused = true)]
async fn takeoff_refused_on_critical_battery() {
    let (mut session, journal) = session_with(SimLink::new(SimVehicle { battery: 6.0, ..SimVehicle::calm() }));
    let mut ticks = vec![act(Action::Takeoff)];
    ticks.extend(vec![hold(&[Control::Forward]); 3]);
    ticks.push(act(Action::Quit));
    let mut script = Script::new(ticks);

    let exit = run(&mut session, &mut script, &mut HeadlessCanvas::new()).await.unwrap();
    assert_eq!(exit, LoopExit::Quit);
    assert!(!journal.calls().iter().any(|c| c.is_motion()));
}

#[tokio::test(start_paused = true)]
async fn quit_while_flying_lands_before_stream_off() {
    let (mut session, journal) = session_with(SimLink::new(SimVehicle::calm()));
    let mut script = Script::new(vec![act(Action::Takeoff), act(Action::Quit)]);

    let exit = run(&mut session, &mut script, &mut HeadlessCanvas::new()).await.unwrap();
    assert_eq!(exit, LoopExit::Quit);
    assert_eq!(session.state(), FlightState::Grounded);

    let calls = journal.calls();
    let n = calls.len();
    assert_eq!(
        &calls[n - 3..],
        &[LinkCall::SetVelocity(VelocityCommand::ZERO), LinkCall::Land, LinkCall::StreamOff]
    );
}

#[tokio::test(start_paused = true)]
async fn emergency_stops_the_loop() {
    let (mut session, journal) = session_with(SimLink::new(SimVehicle::calm()));
    let mut script = Script::new(vec![act(Action::Takeoff), hold(&[Control::Up]), act(Action::Emergency)]);

    let exit = run(&mut session, &mut script, &mut HeadlessCanvas::new()).await.unwrap();
    assert_eq!(exit, LoopExit::Emergency);
    assert_eq!(session.state(), FlightState::Grounded);
    assert_eq!(journal.count(LinkCall::Land), 1);
    assert_eq!(journal.count(LinkCall::StreamOff), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_runs_shutdown() {
    let (mut session, journal) = session_with(SimLink::new(SimVehicle::calm()));
    let mut ticks = vec![act(Action::Takeoff)];
    ticks.extend(idle(10_000));
    let mut script = Script::new(ticks);
    let mut canvas = HeadlessCanvas::new();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    let exit = ControlLoop::new(&mut session, &mut script, &mut canvas, None, ControlConfig::default())
        .run(cancel)
        .await
        .unwrap();
    assert_eq!(exit, LoopExit::Cancelled);
    assert_eq!(session.state(), FlightState::Grounded);
    assert_eq!(journal.count(LinkCall::Land), 1);
    assert_eq!(journal.calls().last(), Some(&LinkCall::StreamOff));
    assert!(session.telemetry().battery_percent.is_some());
}

#[tokio::test(start_paused = true)]
async fn panic_in_loop_body_still_lands() {
    let (mut session, journal) = session_with(SimLink::new(SimVehicle::calm()));
    let mut script = Script { ticks: vec![act(Action::Takeoff)].into(), panic_when_empty: true };
    let mut canvas = HeadlessCanvas::new();

    let exit = run(&mut session, &mut script, &mut canvas).await.unwrap();
    assert_eq!(exit, LoopExit::Panicked);
    assert_eq!(session.state(), FlightState::Grounded);
    assert_eq!(journal.count(LinkCall::Land), 1);
    assert_eq!(journal.calls().last(), Some(&LinkCall::StreamOff));
    assert!(canvas.is_released());
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_shutdown_emergency_is_fatal() {
    let link = SimLink::new(SimVehicle::calm()).with_faults(SimFaults { hang_land: true, ..SimFaults::default() });
    let (mut session, journal) = session_with(link);
    let mut script = Script::new(vec![act(Action::Takeoff), act(Action::Quit)]);

    let err = run(&mut session, &mut script, &mut HeadlessCanvas::new()).await.unwrap_err();
    assert!(matches!(err, FlightError::EmergencyTimeout(_)));
    assert_eq!(session.state(), FlightState::Grounded);
    assert_eq!(journal.calls().last(), Some(&LinkCall::StreamOff));
}

#[tokio::test(start_paused = true)]
async fn overlay_reflects_flight_and_frames() {
    let (mut session, _journal) = session_with(SimLink::new(SimVehicle::calm()));
    let mut ticks = vec![act(Action::Takeoff), act(Action::ToggleDetector)];
    ticks.extend(vec![hold(&[Control::Backward]); 100]);
    let mut script = Script::new(ticks);
    let mut canvas = HeadlessCanvas::new();

    let cancel = CancellationToken::new();
    let (feed, frame_task) = spawn_frame_task(Box::new(BlankFrames::new(64, 48, 30)), cancel.clone());
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        trigger.cancel();
    });

    ControlLoop::new(&mut session, &mut script, &mut canvas, Some(feed), ControlConfig::default())
        .run(cancel)
        .await
        .unwrap();
    frame_task.await.unwrap();

    let primary: Vec<_> = canvas.last(View::Primary).iter().filter_map(|d| d.as_text()).map(String::from).collect();
    assert!(primary.contains(&"Status: FLYING".to_string()));
    assert!(primary.contains(&"Active: BACK".to_string()));
    assert!(primary.contains(&"Detect: N/A".to_string()));
    assert!(primary.iter().any(|s| s.starts_with("FPS: ") && s != "FPS: 0.0"));
    assert_eq!(primary.last().map(String::as_str), Some("COLOR VIEW"));

    let label = canvas.last(View::Derived).last().unwrap();
    assert_eq!(label.position, (10, 38));
}

/// Keeps every frame handed to the canvas, per view.
#[derive(Default)]
struct FrameRecorder {
    seen: Vec<(View, Option<Frame>, Vec<DrawInstruction>)>,
}

impl RenderCanvas for FrameRecorder {
    fn submit(&mut self, view: View, frame: Option<&Frame>, draw: &[DrawInstruction]) -> anyhow::Result<()> {
        self.seen.push((view, frame.cloned(), draw.to_vec()));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn derived_view_shows_edges_of_the_latest_frame() {
    let (mut session, _journal) = session_with(SimLink::new(SimVehicle::calm()));
    let image = image::RgbImage::from_fn(64, 48, |x, _| if x < 32 { image::Rgb([0, 0, 0]) } else { image::Rgb([255, 255, 255]) });
    session.on_frame(Arc::new(Frame { seq: 4, image }));

    let mut canvas = FrameRecorder::default();
    session.render(&mut canvas);

    let (view, primary, _) = &canvas.seen[0];
    assert_eq!(*view, View::Primary);
    assert_eq!(primary.as_ref().map(|f| f.seq), Some(4));

    let (view, derived, _) = &canvas.seen[1];
    assert_eq!(*view, View::Derived);
    let edges = derived.as_ref().unwrap();
    assert_eq!(edges.seq, 4);
    assert_eq!(edges.image.get_pixel(4, 24).0, [0, 0, 0]);
    assert_eq!(edges.image.get_pixel(60, 24).0, [0, 0, 0]);
    assert!((28..36).any(|x| edges.image.get_pixel(x, 24).0 == [255, 255, 255]));
}

#[tokio::test(start_paused = true)]
async fn hot_vehicle_turns_the_temperature_line_amber() {
    let (mut session, _journal) = session_with(SimLink::new(SimVehicle { temperature_c: 75, ..SimVehicle::calm() }));
    session.refresh_telemetry().await;

    let mut canvas = FrameRecorder::default();
    session.render(&mut canvas);

    let (_, _, draw) = &canvas.seen[0];
    let temp = draw.iter().find(|d| d.as_text().map_or(false, |s| s.starts_with("Temp:"))).unwrap();
    assert_eq!(temp.color, Color::Amber);
}
