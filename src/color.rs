use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Mix, Srgb};

// ---------------------------------------------------------------------------
// Severity colour scale: joint z-distance → Color32
// ---------------------------------------------------------------------------

/// Maps a point's joint z-distance to a colour between a calm inlier hue and
/// a hot outlier hue.
#[derive(Debug, Clone, Copy)]
pub struct SeverityScale {
    calm: Hsl,
    hot: Hsl,
    /// Distance at which the hot colour is reached.
    saturation_point: f64,
}

impl SeverityScale {
    /// Scale that reaches full heat at the joint-test boundary.
    pub fn new(threshold: f64, joint_multiplier: f64) -> Self {
        Self {
            calm: Hsl::new(205.0, 0.70, 0.55),
            hot: Hsl::new(0.0, 0.85, 0.55),
            saturation_point: (threshold * joint_multiplier).max(f64::EPSILON),
        }
    }

    /// Colour for a point at `distance`; outliers always get the hot colour.
    pub fn color_for(&self, distance: f64, is_outlier: bool) -> Color32 {
        let t = (distance / self.saturation_point).clamp(0.0, 1.0) as f32;
        if is_outlier || t >= 1.0 {
            return self.outlier_color();
        }
        if t <= 0.0 {
            return self.inlier_color();
        }
        to_color32(self.calm.mix(self.hot, t))
    }

    /// Which of `bands` equal-width distance bands `distance` falls in.
    pub fn band_of(&self, distance: f64, bands: usize) -> usize {
        let bands = bands.max(1);
        let t = (distance / self.saturation_point).clamp(0.0, 1.0);
        ((t * bands as f64) as usize).min(bands - 1)
    }

    /// Representative inlier colour for a band (its midpoint).
    pub fn band_color(&self, band: usize, bands: usize) -> Color32 {
        let mid = (band as f64 + 0.5) / bands.max(1) as f64;
        self.color_for(mid * self.saturation_point, false)
    }

    pub fn outlier_color(&self) -> Color32 {
        to_color32(self.hot)
    }

    pub fn inlier_color(&self) -> Color32 {
        to_color32(self.calm)
    }
}

fn to_color32(hsl: Hsl) -> Color32 {
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}
