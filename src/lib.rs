//! # labelcrop - Label and Symbol Band Extraction
//!
//! labelcrop finds a light label in a photograph, isolates the band of dark
//! symbols printed on it and returns that band as a small, level image ready
//! for recognition.
//!
//! ## Features
//!
//! - **Four stages**: label localization, vertical and horizontal symbol band
//!   isolation, rotational alignment; each usable on its own
//! - **Pure Rust**: built on `image` and `imageproc`, no OpenCV
//! - **Tunable**: every constant lives in a serde config with working defaults
//! - **Observable**: `tracing` spans per stage and an injectable observer for
//!   intermediate images
//! - **C ABI**: optional `ffi` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use labelcrop::{LabelCrop, PipelineConfig};
//!
//! let crop = LabelCrop::new(PipelineConfig::default());
//! let result = crop.crop("photo.jpg")?;
//!
//! for stage in &result.report.stages {
//!     println!("{}: {}x{}", stage.stage, stage.width, stage.height);
//! }
//! result.image.save("symbols.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Stages can also be driven one at a time on a [`Mat`]:
//!
//! ```rust,no_run
//! use labelcrop::{find_label, imread, LabelConfig, NoopObserver};
//!
//! let mut img = imread("photo.jpg")?;
//! find_label(&mut img, &LabelConfig::default(), &mut NoopObserver)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
mod crop;
mod error;
mod image_impl;
mod label;
mod pipeline;
mod symbols;
mod types;

// Building blocks
pub mod contours;
pub mod debug;
pub mod geometry;
pub mod mask;
pub mod morphology;

// FFI module for C bindings
#[cfg(feature = "ffi")]
pub mod ffi;

// Public API exports
pub use crate::debug::{DumpObserver, Frame, NoopObserver, StageObserver, TracingObserver};
pub use crate::error::{PipelineError, Stage};
pub use crate::image_impl::{imread, imwrite, Mat, Point2f, Rect, RotatedRect, Size};
pub use crate::label::find_label;
pub use crate::pipeline::{LabelPipeline, PipelineOutput, StageReport};
pub use crate::symbols::{align_symbols, find_symbols_horizontally, find_symbols_vertically};
pub use crate::types::{AlignConfig, HorizontalConfig, LabelConfig, PipelineConfig, VerticalConfig};

use std::path::Path;

use image::DynamicImage;

/// Final symbol band together with the per-stage report.
#[derive(Debug, Clone)]
pub struct CropResult {
    pub image: DynamicImage,
    pub report: PipelineOutput,
}

/// Main labelcrop interface
pub struct LabelCrop {
    inner: LabelPipeline,
}

impl LabelCrop {
    /// Create a new instance with the given tunables
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            inner: LabelPipeline::new(config),
        }
    }

    pub fn pipeline(&self) -> &LabelPipeline {
        &self.inner
    }

    /// Run every stage on an image file
    pub fn crop<P: AsRef<Path>>(&self, image_path: P) -> Result<CropResult, PipelineError> {
        let (img, report) = self.inner.run(image_path)?;
        Ok(CropResult {
            image: img.into_dynamic(),
            report,
        })
    }

    /// Run every stage on encoded image data in memory
    pub fn crop_from_bytes(&self, image_data: &[u8]) -> Result<CropResult, PipelineError> {
        let mut img = Mat::from_bytes(image_data)?;
        let report = self.inner.run_on_mat(&mut img, Stage::Align, &mut NoopObserver)?;
        Ok(CropResult {
            image: img.into_dynamic(),
            report,
        })
    }
}
