// src/estimation/contact.rs
//
// Where a tracked box touches the road, and how big it roughly is.

use crate::estimation::intrinsics::CamIntrinsics;
use crate::types::{BoundingBox, PixelPoint, SizeModel};

pub const DEFAULT_CONTACT_BIAS_PX: f64 = 2.0;

/// Bottom-center of the box, nudged `bias_px` below the bottom edge and
/// kept inside the image. Assumes the bottom edge sits on the road plane.
pub fn contact_point(bbox: &BoundingBox, image_height: u32, bias_px: f64) -> PixelPoint {
    let u = bbox.x as f64 + bbox.w as f64 * 0.5;
    let bottom = bbox.y as f64 + bbox.h as f64 - 1.0 + bias_px;
    let v = bottom.min(image_height as f64 - 1.0);
    PixelPoint::new(u, v)
}

/// Crude ground-footprint area in m² for the dashboard.
///
/// `Legacy` scales pixels by `D / (img_h / 2)` on both axes, which ignores the
/// focal length. `Principled` uses the pinhole footprint `w·h·D² / (fx·fy)`.
pub fn rough_area_m2(
    model: SizeModel,
    bbox: &BoundingBox,
    distance_m: f64,
    image_height: u32,
    intrinsics: &CamIntrinsics,
) -> f64 {
    let w = bbox.w as f64;
    let h = bbox.h as f64;
    match model {
        SizeModel::Legacy => {
            let scale = distance_m / (image_height as f64 * 0.5);
            (w * scale) * (h * scale)
        }
        SizeModel::Principled => w * h * distance_m * distance_m / (intrinsics.fx() * intrinsics.fy()),
    }
}
