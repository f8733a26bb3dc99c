// Contour extraction on binary masks.
// Border following is delegated to imageproc (Suzuki-Abe); only outer borders
// are kept, so each connected component contributes exactly one contour.

use image::{imageops, GrayImage};
use imageproc::contours::{self, BorderType};

#[derive(Debug, Clone, Default)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
}

impl Contour {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Area enclosed by the border polygon (shoelace formula, unsigned).
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0i64;
        for i in 0..n {
            let (x0, y0) = self.points[i];
            let (x1, y1) = self.points[(i + 1) % n];
            twice += x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64;
        }
        twice.abs() as f64 / 2.0
    }
}

/// Find the outer border of every connected foreground (non-zero) region.
///
/// The mask is traced inside a one-pixel empty frame so that regions touching
/// the image border are found too; points are reported in mask coordinates.
pub fn find_contours(binary_img: &GrayImage) -> Vec<Contour> {
    let (width, height) = binary_img.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut padded, binary_img, 1, 1);

    contours::find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .map(|c| Contour {
            points: c.points.iter().map(|p| (p.x - 1, p.y - 1)).collect(),
        })
        .filter(|c| !c.is_empty())
        .collect()
}

/// Contour with the largest enclosed area. Ties go to the contour with more
/// border points, then to the first one found.
pub fn largest(contours: &[Contour]) -> Option<&Contour> {
    let mut best: Option<(&Contour, f64)> = None;
    for c in contours {
        let area = c.area();
        let better = match best {
            None => true,
            Some((b, b_area)) => area > b_area || (area == b_area && c.len() > b.len()),
        };
        if better {
            best = Some((c, area));
        }
    }
    best.map(|(c, _)| c)
}
