//! Heads-up overlay: turns loop state into a list of draw instructions. No
//! pixels are touched here; a [`crate::RenderCanvas`] decides how to show
//! them.

use serde::Deserialize;
use skyhand_fc::safety::ThermalLevel;
use skyhand_fc::Warning;
use skyhand_proto::{FlightState, Telemetry, VelocityCommand};

use crate::detector::DetectionState;
use crate::Detection;

const MARGIN_X: i32 = 10;
const LABEL_TAB_W: u32 = 100;
const LABEL_TAB_H: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Green,
    Amber,
    Red,
    Gray,
    Yellow,
    White,
    Black,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawKind {
    Text { content: String, scale: f32 },
    Rect { width: u32, height: u32, filled: bool },
}

/// One primitive. Text is anchored at its baseline-left, rectangles at
/// their top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub kind: DrawKind,
    pub position: (i32, i32),
    pub color: Color,
}

impl DrawInstruction {
    fn text(content: impl Into<String>, position: (i32, i32), scale: f32, color: Color) -> Self {
        Self { kind: DrawKind::Text { content: content.into(), scale }, position, color }
    }

    fn rect(position: (i32, i32), width: u32, height: u32, filled: bool, color: Color) -> Self {
        Self { kind: DrawKind::Rect { width, height, filled }, position, color }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            DrawKind::Text { content, .. } => Some(content),
            DrawKind::Rect { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The live color feed, with detection boxes.
    Primary,
    /// The edge view, telemetry only.
    Derived,
}

impl View {
    pub fn label(self) -> &'static str {
        match self {
            View::Primary => "COLOR VIEW",
            View::Derived => "EDGE VIEW",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Battery above this is drawn green.
    pub battery_ok_above: u8,
    /// Battery above this (and not ok) is drawn amber; otherwise red.
    pub battery_low_above: u8,
    pub show_active_controls: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { battery_ok_above: 30, battery_low_above: 15, show_active_controls: true }
    }
}

/// Snapshot of everything the overlay shows for one render.
#[derive(Debug, Clone)]
pub struct OverlayInput<'a> {
    pub state: FlightState,
    pub telemetry: &'a Telemetry,
    /// Colours the temperature line; `None` when the temperature is unknown.
    pub thermal: Option<ThermalLevel>,
    pub warnings: &'a [Warning],
    pub detection: DetectionState,
    pub detections: &'a [Detection],
    pub active_controls: &'a [&'static str],
    pub command: VelocityCommand,
    pub fps: f64,
    pub frame_height: u32,
}

pub fn battery_color(cfg: &OverlayConfig, battery: Option<u8>) -> Color {
    match battery {
        None => Color::Gray,
        Some(b) if b > cfg.battery_ok_above => Color::Green,
        Some(b) if b > cfg.battery_low_above => Color::Amber,
        Some(_) => Color::Red,
    }
}

fn thermal_color(level: Option<ThermalLevel>) -> Color {
    match level {
        Some(ThermalLevel::Critical) => Color::Red,
        Some(ThermalLevel::Warning) => Color::Amber,
        Some(ThermalLevel::Normal) | None => Color::White,
    }
}

fn state_color(state: FlightState) -> Color {
    match state {
        FlightState::Flying => Color::Green,
        FlightState::TakingOff | FlightState::Landing => Color::Amber,
        FlightState::Grounded | FlightState::Emergency => Color::Red,
    }
}

fn or_dash<T: std::fmt::Display>(v: Option<T>, unit: &str) -> String {
    v.map(|x| format!("{}{}", x, unit)).unwrap_or_else(|| "--".into())
}

struct Lines {
    y: i32,
    out: Vec<DrawInstruction>,
}

impl Lines {
    fn push(&mut self, text: String, scale: f32, color: Color, step: i32) {
        self.out.push(DrawInstruction::text(text, (MARGIN_X, self.y), scale, color));
        self.y += step;
    }
}

pub fn render(cfg: &OverlayConfig, input: &OverlayInput<'_>, view: View) -> Vec<DrawInstruction> {
    let mut lines = Lines { y: 25, out: Vec::new() };

    if view == View::Primary {
        for (i, d) in input.detections.iter().enumerate() {
            let out = &mut lines.out;
            out.push(DrawInstruction::rect((d.x, d.y), d.w, d.h, false, Color::Green));
            out.push(DrawInstruction::rect((d.x, d.y - LABEL_TAB_H as i32), LABEL_TAB_W, LABEL_TAB_H, true, Color::Green));
            out.push(DrawInstruction::text(format!("Target #{}", i + 1), (d.x + 2, d.y - 5), 0.6, Color::Black));
        }
    }

    lines.push(format!("Status: {}", input.state.label()), 0.5, state_color(input.state), 25);

    let t = input.telemetry;
    let battery = match t.battery_percent {
        Some(b) => format!("Bat: {}%", b),
        None => "Bat: N/A".into(),
    };
    lines.push(battery, 0.45, battery_color(cfg, t.battery_percent), 25);
    lines.push(
        format!(
            "Temp: {}  H: {}  T: {}",
            or_dash(t.temperature_c, "C"),
            or_dash(t.height_cm, "cm"),
            or_dash(t.flight_time_s, "s")
        ),
        0.4,
        thermal_color(input.thermal),
        25,
    );

    for w in input.warnings {
        lines.push(format!("! {}", w), 0.4, Color::Amber, 20);
    }

    // the detector slot stays reserved on the derived view so both views line up
    let det = input.detection;
    if view == View::Primary {
        let (text, color) = if !det.available {
            ("Detect: N/A".to_string(), Color::Gray)
        } else if det.enabled {
            (format!("Detect: ON ({})", det.last_count), Color::Green)
        } else {
            (format!("Detect: OFF ({})", det.last_count), Color::Gray)
        };
        lines.push(text, 0.45, color, 25);
    } else {
        lines.y += 25;
    }

    if cfg.show_active_controls {
        let (active, color) = if input.active_controls.is_empty() {
            ("None".to_string(), Color::Gray)
        } else {
            (input.active_controls.join(" + "), Color::Green)
        };
        lines.push(format!("Active: {}", active), 0.4, color, 20);
    }

    let (lr, fb, ud, yaw) = input.command.as_tuple();
    lines.push(format!("Vel: {:+3},{:+3},{:+3},{:+3}", lr, fb, ud, yaw), 0.35, Color::White, 20);
    lines.push(format!("FPS: {:.1}", input.fps), 0.35, Color::White, 20);

    let mut out = lines.out;
    out.push(DrawInstruction::text(
        view.label(),
        (MARGIN_X, input.frame_height as i32 - 10),
        0.45,
        Color::Yellow,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(battery: Option<u8>) -> Telemetry {
        Telemetry { battery_percent: battery, temperature_c: Some(48), height_cm: Some(120), flight_time_s: Some(9), ..Telemetry::default() }
    }

    fn input<'a>(t: &'a Telemetry, detections: &'a [Detection], active: &'a [&'static str]) -> OverlayInput<'a> {
        OverlayInput {
            state: FlightState::Flying,
            telemetry: t,
            thermal: Some(ThermalLevel::Normal),
            warnings: &[],
            detection: DetectionState { enabled: true, last_count: detections.len(), available: true },
            detections,
            active_controls: active,
            command: VelocityCommand::new(5, -50, 0, 100),
            fps: 29.76,
            frame_height: 720,
        }
    }

    fn texts(out: &[DrawInstruction]) -> Vec<&str> {
        out.iter().filter_map(|d| d.as_text()).collect()
    }

    #[test]
    fn battery_color_bands() {
        let cfg = OverlayConfig::default();
        assert_eq!(battery_color(&cfg, Some(31)), Color::Green);
        assert_eq!(battery_color(&cfg, Some(30)), Color::Amber);
        assert_eq!(battery_color(&cfg, Some(16)), Color::Amber);
        assert_eq!(battery_color(&cfg, Some(15)), Color::Red);
        assert_eq!(battery_color(&cfg, None), Color::Gray);
    }

    #[test]
    fn primary_view_lines() {
        let t = telemetry(Some(76));
        let out = render(&OverlayConfig::default(), &input(&t, &[], &["FWD", "UP"]), View::Primary);
        let lines = texts(&out);
        assert_eq!(lines[0], "Status: FLYING");
        assert_eq!(lines[1], "Bat: 76%");
        assert_eq!(lines[2], "Temp: 48C  H: 120cm  T: 9s");
        assert!(lines.contains(&"Detect: ON (0)"));
        assert!(lines.contains(&"Active: FWD + UP"));
        assert!(lines.contains(&"Vel:  +5,-50, +0,+100"));
        assert!(lines.contains(&"FPS: 29.8"));
        assert_eq!(out[0].position, (10, 25));
        assert_eq!(out[1].color, Color::Green);
        assert_eq!(out[2].color, Color::White);
    }

    #[test]
    fn temperature_line_follows_thermal_level() {
        let t = telemetry(Some(76));
        let temp_color = |thermal| {
            let out = render(&OverlayConfig::default(), &OverlayInput { thermal, ..input(&t, &[], &[]) }, View::Derived);
            out.iter().find(|d| d.as_text().map_or(false, |s| s.starts_with("Temp:"))).map(|d| d.color)
        };
        assert_eq!(temp_color(Some(ThermalLevel::Warning)), Some(Color::Amber));
        assert_eq!(temp_color(Some(ThermalLevel::Critical)), Some(Color::Red));
        assert_eq!(temp_color(None), Some(Color::White));
    }

    #[test]
    fn derived_view_has_no_detector_line_or_boxes() {
        let t = telemetry(Some(76));
        let boxes = [Detection { x: 100, y: 80, w: 40, h: 40 }];
        let primary = render(&OverlayConfig::default(), &input(&t, &boxes, &[]), View::Primary);
        let derived = render(&OverlayConfig::default(), &input(&t, &boxes, &[]), View::Derived);

        assert!(texts(&primary).contains(&"Target #1"));
        assert!(texts(&derived).iter().all(|s| !s.starts_with("Detect") && !s.starts_with("Target")));
        assert!(derived.iter().all(|d| matches!(d.kind, DrawKind::Text { .. })));

        // remaining lines keep their positions across views
        let fps_pos = |out: &[DrawInstruction]| {
            out.iter().find(|d| d.as_text().map_or(false, |s| s.starts_with("FPS"))).map(|d| d.position)
        };
        assert_eq!(fps_pos(&primary), fps_pos(&derived));
    }

    #[test]
    fn detection_box_has_filled_label_tab() {
        let t = telemetry(None);
        let boxes = [Detection { x: 100, y: 80, w: 40, h: 60 }];
        let out = render(&OverlayConfig::default(), &input(&t, &boxes, &[]), View::Primary);
        assert_eq!(out[0], DrawInstruction::rect((100, 80), 40, 60, false, Color::Green));
        assert_eq!(out[1], DrawInstruction::rect((100, 55), 100, 25, true, Color::Green));
        assert_eq!(out[2].position, (102, 75));
    }

    #[test]
    fn view_label_sits_at_bottom_in_yellow() {
        let t = telemetry(Some(50));
        let out = render(&OverlayConfig::default(), &input(&t, &[], &[]), View::Derived);
        let last = out.last().unwrap();
        assert_eq!(last.as_text(), Some("EDGE VIEW"));
        assert_eq!(last.position, (10, 710));
        assert_eq!(last.color, Color::Yellow);
    }

    #[test]
    fn unknown_battery_and_no_controls() {
        let t = telemetry(None);
        let out = render(&OverlayConfig::default(), &input(&t, &[], &[]), View::Primary);
        let bat = out.iter().find(|d| d.as_text() == Some("Bat: N/A")).unwrap();
        assert_eq!(bat.color, Color::Gray);
        let active = out.iter().find(|d| d.as_text() == Some("Active: None")).unwrap();
        assert_eq!(active.color, Color::Gray);
    }

    #[test]
    fn warnings_listed_after_telemetry() {
        let t = telemetry(Some(12));
        let warnings = [Warning::LowBattery(12)];
        let mut i = input(&t, &[], &[]);
        i.warnings = &warnings;
        let out = render(&OverlayConfig::default(), &i, View::Primary);
        assert!(texts(&out)[3].starts_with("! battery low"));
        assert_eq!(out[1].color, Color::Red);
    }
}
