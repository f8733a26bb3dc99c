use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::mask::{Channel, HsvRange};

/// Label localization tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Color band of the label background ("white" under the expected light).
    pub white: HsvRange,
    /// Closing radius merging the label into one blob.
    pub close_radius: u32,
    /// Opening radius erasing background specks.
    pub open_radius: u32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            white: HsvRange {
                hue: None,
                saturation: (0, 60),
                value: (150, 255),
            },
            close_radius: 10,
            open_radius: 30,
        }
    }
}

/// Vertical symbol-band isolation tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerticalConfig {
    /// Channel used as the grayscale base.
    pub channel: Channel,
    pub base_median_kernel: u32,
    /// Near-black pixels treated as symbol structure.
    pub dark: HsvRange,
    pub dark_close_radius: u32,
    pub structure_dilate_radius: u32,
    pub background_median_kernel: u32,
    pub edge_median_kernel: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub edge_dilate_radius: u32,
    pub consolidate_radius: u32,
    /// The band is merged by a horizontal dilation of `width / band_merge_divisor`.
    pub band_merge_divisor: u32,
}

impl Default for VerticalConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Red,
            base_median_kernel: 3,
            dark: HsvRange {
                hue: None,
                saturation: (0, 255),
                value: (0, 64),
            },
            dark_close_radius: 5,
            structure_dilate_radius: 10,
            background_median_kernel: 5,
            edge_median_kernel: 5,
            canny_low: 127.0,
            canny_high: 200.0,
            edge_dilate_radius: 1,
            consolidate_radius: 15,
            band_merge_divisor: 6,
        }
    }
}

/// Horizontal symbol-band isolation tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalConfig {
    /// Border excluded on each side before analysis and restored afterwards.
    pub margin: i32,
    pub dilate_x_divisor: u32,
    pub dilate_y_divisor: u32,
}

impl Default for HorizontalConfig {
    fn default() -> Self {
        Self {
            margin: 20,
            dilate_x_divisor: 40,
            dilate_y_divisor: 40,
        }
    }
}

/// Rotational alignment tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub dilate_x_divisor: u32,
    pub dilate_y_divisor: u32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            dilate_x_divisor: 40,
            dilate_y_divisor: 40,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub label: LabelConfig,
    pub vertical: VerticalConfig,
    pub horizontal: HorizontalConfig,
    pub align: AlignConfig,
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(s).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&text)
    }
}

/// Median kernel size to the radius `imageproc` expects.
pub(crate) fn kernel_radius(kernel: u32) -> u32 {
    kernel / 2
}

/// `extent / divisor`, treating a zero divisor as "no growth".
pub(crate) fn divided(extent: i32, divisor: u32) -> u32 {
    if divisor == 0 || extent <= 0 {
        0
    } else {
        extent as u32 / divisor
    }
}
