use image::{GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::frames::{Frame, FrameError, FrameSource};

/// Sigma of a 5x5 Gaussian kernel when none is given explicitly.
const EDGE_BLUR_SIGMA: f32 = 1.1;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

pub const DARK_BELOW: f32 = 30.0;
pub const DIM_BELOW: f32 = 60.0;

/// Edge map of `frame` for low-light viewing: white edges on black, same
/// size and sequence number as the source.
pub fn edge_view(frame: &Frame) -> Frame {
    let gray = image::imageops::grayscale(&frame.image);
    let edges = canny(&gaussian_blur_f32(&gray, EDGE_BLUR_SIGMA), CANNY_LOW, CANNY_HIGH);
    Frame { seq: frame.seq, image: expand(&edges) }
}

fn expand(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// Mean luma in 0..=255.
pub fn mean_brightness(image: &RgbImage) -> f32 {
    let gray = image::imageops::grayscale(image);
    let n = gray.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = gray.as_raw().iter().map(|&v| u64::from(v)).sum();
    sum as f32 / n as f32
}

/// First frame `source` delivers in up to `attempts` tries. The last error
/// is returned when every try fails.
pub async fn grab_frame(source: &mut dyn FrameSource, attempts: u32) -> Result<Frame, FrameError> {
    let mut last = FrameError::Unavailable(format!("{}: no attempts made", source.describe()));
    for n in 1..=attempts {
        match source.next_frame().await {
            Ok(frame) => return Ok(frame),
            Err(e) => {
                debug!("grab {}/{} from {}: {}", n, attempts, source.describe(), e);
                last = e;
            }
        }
    }
    Err(last)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lighting {
    Dark,
    Dim,
    Adequate,
}

impl Lighting {
    pub fn classify(brightness: f32) -> Self {
        if brightness < DARK_BELOW {
            Lighting::Dark
        } else if brightness < DIM_BELOW {
            Lighting::Dim
        } else {
            Lighting::Adequate
        }
    }
}

impl std::fmt::Display for Lighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Lighting::Dark => "very dark; the vehicle's optical sensors need light",
            Lighting::Dim => "dim; more light recommended",
            Lighting::Adequate => "adequate",
        })
    }
}
