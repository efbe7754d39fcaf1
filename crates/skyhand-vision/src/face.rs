use anyhow::Result;
use rustface::{Detector as _, ImageData};

use crate::frames::Frame;
use crate::{Detection, DetectorConfig, ObjectLocator};

/// Frontal face locator on the SeetaFace cascade model.
pub struct FaceLocator {
    inner: Box<dyn rustface::Detector>,
    name: String,
}

impl FaceLocator {
    pub fn load(cfg: &DetectorConfig) -> Result<Self> {
        let path = cfg.model.as_deref().ok_or_else(|| anyhow::anyhow!("detector.model not set"))?;
        let mut inner = rustface::create_detector(path)
            .map_err(|e| anyhow::anyhow!("failed to load face model {}: {:?}", path, e))?;
        inner.set_min_face_size(cfg.min_face_size);
        inner.set_score_thresh(cfg.score_threshold);
        inner.set_pyramid_scale_factor(cfg.pyramid_scale);
        inner.set_slide_window_step(cfg.window_step, cfg.window_step);
        Ok(Self { inner, name: format!("faces ({})", path) })
    }
}

impl ObjectLocator for FaceLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let gray = image::imageops::grayscale(&frame.image);
        let mut data = ImageData::new(gray.as_raw(), gray.width(), gray.height());
        let found = self
            .inner
            .detect(&mut data)
            .into_iter()
            .map(|face| {
                let b = face.bbox();
                Detection { x: b.x(), y: b.y(), w: b.width(), h: b.height() }
            })
            .collect();
        Ok(found)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
