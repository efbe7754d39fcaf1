use tracing::{info, warn};

use crate::frames::Frame;
use crate::{Detection, ObjectLocator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionState {
    pub enabled: bool,
    /// Boxes found by the latest pass.
    pub last_count: usize,
    /// False when no locator is configured; toggling is then refused.
    pub available: bool,
}

/// Detection on/off switch around an optional [`ObjectLocator`].
pub struct Detector {
    locator: Option<Box<dyn ObjectLocator>>,
    state: DetectionState,
    boxes: Vec<Detection>,
    failing: bool,
}

impl Detector {
    pub fn new(locator: Option<Box<dyn ObjectLocator>>, enabled: bool) -> Self {
        let available = locator.is_some();
        if let Some(l) = &locator {
            info!("detector: {} loaded", l.name());
        }
        Self {
            locator,
            state: DetectionState { enabled: enabled && available, last_count: 0, available },
            boxes: Vec::new(),
            failing: false,
        }
    }

    pub fn unavailable() -> Self {
        Self::new(None, false)
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn detections(&self) -> &[Detection] {
        &self.boxes
    }

    /// Flips detection on or off. Returns the new enabled flag.
    pub fn toggle(&mut self) -> bool {
        if !self.state.available {
            warn!("detection unavailable: no object locator configured");
            return false;
        }
        self.state.enabled = !self.state.enabled;
        if !self.state.enabled {
            self.boxes.clear();
            self.state.last_count = 0;
        }
        info!("detection: {}", if self.state.enabled { "ON" } else { "OFF" });
        self.state.enabled
    }

    /// One detection pass. A failing locator yields no boxes for this frame.
    pub fn process(&mut self, frame: &Frame) -> &[Detection] {
        if !self.state.enabled {
            return &[];
        }
        let Some(locator) = self.locator.as_mut() else {
            return &[];
        };
        match locator.locate(frame) {
            Ok(found) => {
                self.failing = false;
                self.boxes = found;
            }
            Err(e) => {
                if !self.failing {
                    warn!("detector {} failed: {:#}", locator.name(), e);
                    self.failing = true;
                }
                self.boxes.clear();
            }
        }
        self.state.last_count = self.boxes.len();
        &self.boxes
    }
}
