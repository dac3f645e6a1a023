//! Hair disorder scoring
//!
//! Measures edge density in the top-center band of the frame, where hair is
//! expected, and maps it to the hair sub-score:
//! - Region of interest: rows [0, H/4), columns [W/4, 3W/4)
//! - BT.601 intensity conversion
//! - Canny edge detection (50/150)
//! - Density thresholds 0.02 / 0.05

use crate::types::{HairLabel, HairScore};
use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use tracing::warn;

/// Canny hysteresis thresholds on the 8-bit intensity scale
pub const CANNY_LOW_THRESHOLD: f32 = 50.0;
pub const CANNY_HIGH_THRESHOLD: f32 = 150.0;

/// Density below which hair reads as tidy
const TIDY_BELOW: f64 = 0.02;
/// Density below which hair reads as somewhat messy
const SOMEWHAT_MESSY_BELOW: f64 = 0.05;

/// Canny only marks pixels with neighbours on every side, so narrower
/// regions cannot contain edges
const MIN_EDGE_REGION_SIDE: u32 = 3;

/// Sub-rectangle of the frame analyzed for hair disorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionOfInterest {
    /// Top-center band of a `width` x `height` frame, clamped to at least
    /// one pixel. Returns `None` for an empty frame.
    pub fn for_frame(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let x_start = width / 4;
        let x_end = ((3 * u64::from(width)) / 4) as u32;
        let roi_width = x_end.saturating_sub(x_start).max(1).min(width - x_start);
        let roi_height = (height / 4).max(1);

        Some(Self {
            x: x_start,
            y: 0,
            width: roi_width,
            height: roi_height,
        })
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Scorer for the hair disorder sub-score
pub struct HairDisorderScorer;

impl HairDisorderScorer {
    /// Score a frame
    pub fn score(frame: &RgbImage) -> HairScore {
        Self::classify(Self::edge_density(frame))
    }

    /// Fraction of edge pixels inside the region of interest.
    ///
    /// Empty frames measure 0.0.
    pub fn edge_density(frame: &RgbImage) -> f64 {
        let Some(roi) = RegionOfInterest::for_frame(frame.width(), frame.height()) else {
            warn!(
                width = frame.width(),
                height = frame.height(),
                "empty frame, hair region has no pixels"
            );
            return 0.0;
        };

        if roi.width < MIN_EDGE_REGION_SIDE || roi.height < MIN_EDGE_REGION_SIDE {
            return 0.0;
        }

        let intensity = region_intensity(frame, &roi);
        let edges = canny(&intensity, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
        let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count();

        edge_pixels as f64 / roi.area() as f64
    }

    /// Map an edge density to the hair sub-score; a boundary value belongs to
    /// the messier band
    pub fn classify(edge_density: f64) -> HairScore {
        let (score, label) = if edge_density < TIDY_BELOW {
            (0, HairLabel::RambutRapih)
        } else if edge_density < SOMEWHAT_MESSY_BELOW {
            (2, HairLabel::RambutAgakAcak)
        } else {
            (4, HairLabel::RambutSangatAcak)
        };

        HairScore {
            score,
            label,
            edge_density,
        }
    }
}

/// Single-channel intensity of the region, ITU-R BT.601 weights
fn region_intensity(frame: &RgbImage, roi: &RegionOfInterest) -> GrayImage {
    GrayImage::from_fn(roi.width, roi.height, |x, y| {
        let [r, g, b] = frame.get_pixel(roi.x + x, roi.y + y).0;
        Luma([luma(r, g, b)])
    })
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((weighted + 500) / 1000) as u8
}
