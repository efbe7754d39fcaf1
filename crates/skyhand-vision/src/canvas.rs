use anyhow::Result;
use tracing::{debug, info};

use crate::frames::Frame;
use crate::overlay::{DrawInstruction, View};

/// Where rendered views end up. Called from the control loop only.
pub trait RenderCanvas {
    /// Shows one view: the frame (if any) with `draw` on top.
    fn submit(&mut self, view: View, frame: Option<&Frame>, draw: &[DrawInstruction]) -> Result<()>;

    /// Tears the display down. Called once on shutdown.
    fn release(&mut self) {}
}

/// Canvas without a display. Keeps the latest instructions per view and
/// logs the status line whenever it changes.
#[derive(Debug, Default)]
pub struct HeadlessCanvas {
    primary: Vec<DrawInstruction>,
    derived: Vec<DrawInstruction>,
    last_status: Option<String>,
    submissions: usize,
    released: bool,
}

impl HeadlessCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, view: View) -> &[DrawInstruction] {
        match view {
            View::Primary => &self.primary,
            View::Derived => &self.derived,
        }
    }

    pub fn submissions(&self) -> usize {
        self.submissions
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl RenderCanvas for HeadlessCanvas {
    fn submit(&mut self, view: View, frame: Option<&Frame>, draw: &[DrawInstruction]) -> Result<()> {
        self.submissions += 1;
        if view == View::Primary {
            let status = draw.iter().filter_map(|d| d.as_text()).find(|s| s.starts_with("Status:"));
            if let Some(s) = status {
                if self.last_status.as_deref() != Some(s) {
                    info!("{}", s);
                    self.last_status = Some(s.to_string());
                }
            }
        }
        debug!(
            "{}: frame={:?} {} instructions",
            view.label(),
            frame.map(|f| f.seq),
            draw.len()
        );
        let slot = match view {
            View::Primary => &mut self.primary,
            View::Derived => &mut self.derived,
        };
        slot.clear();
        slot.extend_from_slice(draw);
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }
}
