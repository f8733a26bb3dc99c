use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image_impl::Rect;

/// The four pipeline stages, in the order they normally run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Label,
    Vertical,
    Horizontal,
    Align,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Label, Stage::Vertical, Stage::Horizontal, Stage::Align];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Label => "label",
            Stage::Vertical => "vertical",
            Stage::Horizontal => "horizontal",
            Stage::Align => "align",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("{stage}: could not set up stage resources: {reason}")]
    Init { stage: Stage, reason: String },

    #[error("{stage}: no matching region found")]
    NoMatch { stage: Stage },

    #[error("{stage}: rectangle {rect} does not fit a {width}x{height} image")]
    InvalidGeometry {
        stage: Stage,
        rect: Rect,
        width: i32,
        height: i32,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn init(stage: Stage, reason: impl Into<String>) -> Self {
        PipelineError::Init {
            stage,
            reason: reason.into(),
        }
    }

    /// Stage the failure happened in, if it came from a stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Init { stage, .. }
            | PipelineError::NoMatch { stage }
            | PipelineError::InvalidGeometry { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Integer status for the C ABI: 0 is success, and each failure kind is
    /// more negative the further into a stage it happened.
    pub fn status_code(&self) -> i32 {
        match self {
            PipelineError::Init { .. } => -1,
            PipelineError::NoMatch { .. } => -2,
            PipelineError::InvalidGeometry { .. } => -3,
            PipelineError::Image(_) | PipelineError::Io(_) | PipelineError::Config(_) => -4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_ranked_by_phase() {
        let init = PipelineError::init(Stage::Label, "oom");
        let none = PipelineError::NoMatch { stage: Stage::Label };
        let geom = PipelineError::InvalidGeometry {
            stage: Stage::Vertical,
            rect: Rect::new(0, -3, 10, 10),
            width: 10,
            height: 10,
        };
        assert!(init.status_code() > none.status_code());
        assert!(none.status_code() > geom.status_code());
        assert_eq!(geom.stage(), Some(Stage::Vertical));
    }

    #[test]
    fn test_display_names_stage() {
        let err = PipelineError::NoMatch { stage: Stage::Horizontal };
        assert_eq!(err.to_string(), "horizontal: no matching region found");
    }
}
