//! Physical page description, in PDF points (1/72 inch).

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// 10 mm expressed in points.
pub const DEFAULT_MARGIN: f32 = 28.35;

/// Supported paper presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Paper {
    #[default]
    A4,
    Letter,
}

impl Paper {
    /// Width and height in points.
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            Paper::A4 => (595.28, 841.89),
            Paper::Letter => (612.0, 792.0),
        }
    }
}

/// Page size and uniform margin. Constant for a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    pub fn new(width: f32, height: f32, margin: f32) -> Self {
        Self { width, height, margin }
    }

    pub fn for_paper(paper: Paper, margin: f32) -> Self {
        let (width, height) = paper.dimensions();
        Self { width, height, margin }
    }

    pub fn a4() -> Self {
        Self::for_paper(Paper::A4, DEFAULT_MARGIN)
    }

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }

    /// Reject geometries that leave no printable area.
    pub fn validate(&self) -> Result<()> {
        let finite = [self.width, self.height, self.margin].iter().all(|v| v.is_finite());
        if !finite || self.margin < 0.0 {
            return Err(Error::PaginationFailure(format!("invalid page geometry {:?}", self)));
        }
        if self.content_width() <= 0.0 || self.content_height() <= 0.0 {
            return Err(Error::PaginationFailure(format!(
                "margin {} leaves no content area on a {}x{} page",
                self.margin, self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}
