use image::{DynamicImage, ImageBuffer, Pixel};
use nalgebra::Matrix3;

use crate::contours::Contour;
use crate::image_impl::{Point2f, Rect, RotatedRect};

/// Rotations closer to zero than this (degrees) are treated as none, so an
/// already aligned region is cropped without resampling.
const ANGLE_EPSILON: f32 = 1e-3;

/// Axis-aligned bounding rectangle of the contour's pixels.
pub fn bounding_rect(contour: &Contour) -> Option<Rect> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y) = *first;
    let (mut max_x, mut max_y) = *first;
    for &(x, y) in &contour.points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Some(Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

fn cross(o: Point2f, a: Point2f, b: Point2f) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull (Andrew's monotone chain), counter-clockwise, without
/// collinear points.
pub fn convex_hull(points: &[Point2f]) -> Vec<Point2f> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point2f> = Vec::with_capacity(sorted.len() * 2);
    for &pt in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], pt) <= 0.0 {
            hull.pop();
        }
        hull.push(pt);
    }
    let lower_len = hull.len() + 1;
    for &pt in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(hull[hull.len() - 2], hull[hull.len() - 1], pt) <= 0.0
        {
            hull.pop();
        }
        hull.push(pt);
    }
    hull.pop();
    hull
}

/// Minimum-area enclosing rectangle of the contour (rotating calipers over
/// the convex hull). The result is normalized to an angle in (-45, 45].
/// Degenerate contours (a single point or collinear points) have none.
pub fn min_area_rect(contour: &Contour) -> Option<RotatedRect> {
    let points: Vec<Point2f> = contour
        .points
        .iter()
        .map(|&(x, y)| Point2f::new(x as f32, y as f32))
        .collect();
    let hull = convex_hull(&points);

    // a point or a line has no area to crop to
    if hull.len() < 3 {
        return None;
    }

    let mut min_area = f32::MAX;
    let mut best_rect = None;

    let n = hull.len();
    for i in 0..n {
        let p1 = hull[i];
        let p2 = hull[(i + 1) % n];

        let edge_x = p2.x - p1.x;
        let edge_y = p2.y - p1.y;
        let edge_len = (edge_x * edge_x + edge_y * edge_y).sqrt();
        if edge_len < 1e-6 {
            continue;
        }

        // edge direction and its perpendicular
        let ux = edge_x / edge_len;
        let uy = edge_y / edge_len;
        let vx = -uy;
        let vy = ux;

        let mut min_u = f32::MAX;
        let mut max_u = f32::MIN;
        let mut min_v = f32::MAX;
        let mut max_v = f32::MIN;
        for pt in &hull {
            let u = pt.x * ux + pt.y * uy;
            let v = pt.x * vx + pt.y * vy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;
        if area < min_area {
            min_area = area;
            let center_u = (min_u + max_u) / 2.0;
            let center_v = (min_v + max_v) / 2.0;
            let center = Point2f::new(center_u * ux + center_v * vx, center_u * uy + center_v * vy);
            best_rect = Some(RotatedRect::new(center, width, height, uy.atan2(ux).to_degrees()));
        }
    }

    best_rect
        .filter(|r| r.width > 0.0 && r.height > 0.0)
        .map(|r| r.normalized())
}

/// Pixel rectangle covering every pixel centre of an axis-aligned rectangle
/// given by its centre and size.
fn covering_rect(cx: f32, cy: f32, width: f32, height: f32) -> Rect {
    let left = (cx - width / 2.0).round() as i32;
    let right = (cx + width / 2.0).round() as i32;
    let top = (cy - height / 2.0).round() as i32;
    let bottom = (cy + height / 2.0).round() as i32;
    Rect::new(left, top, right - left + 1, bottom - top + 1)
}

/// Rotate `img` about the centre of `rect` so that `rect` becomes
/// axis-aligned, and return the rotated image together with the rectangle's
/// position in it.
///
/// The canvas grows to hold the whole rotated image, so the returned
/// rectangle only needs clipping for sub-pixel rounding. Uncovered canvas
/// pixels are black.
pub fn rotate_to_rect(img: &DynamicImage, rect: &RotatedRect) -> (DynamicImage, Rect) {
    let rect = rect.normalized();
    let (cx, cy) = (rect.center.x, rect.center.y);

    if rect.angle.abs() < ANGLE_EPSILON {
        return (img.clone(), covering_rect(cx, cy, rect.width, rect.height));
    }

    let theta = (rect.angle as f64).to_radians();
    let (sin_t, cos_t) = theta.sin_cos();
    let (cx64, cy64) = (cx as f64, cy as f64);

    // R(-theta) about the rect centre
    let rotate = |x: f64, y: f64| -> (f64, f64) {
        let dx = x - cx64;
        let dy = y - cy64;
        (dx * cos_t + dy * sin_t, -dx * sin_t + dy * cos_t)
    };

    let last_x = img.width().saturating_sub(1) as f64;
    let last_y = img.height().saturating_sub(1) as f64;
    let corners = [(0.0, 0.0), (last_x, 0.0), (0.0, last_y), (last_x, last_y)].map(|(x, y)| rotate(x, y));
    let min_x = corners.iter().map(|c| c.0).fold(f64::MAX, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::MIN, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::MAX, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::MIN, f64::max);

    let out_w = (max_x - min_x).ceil() as u32 + 1;
    let out_h = (max_y - min_y).ceil() as u32 + 1;
    let (tx, ty) = (-min_x, -min_y);

    let forward = Matrix3::new(
        cos_t, sin_t, tx - (cos_t * cx64 + sin_t * cy64),
        -sin_t, cos_t, ty - (-sin_t * cx64 + cos_t * cy64),
        0.0, 0.0, 1.0,
    );
    // rigid motion: the closed-form inverse transposes the rotation block
    let inverse = forward.try_inverse().unwrap_or_else(|| {
        Matrix3::new(
            cos_t, -sin_t, cx64 - (cos_t * tx - sin_t * ty),
            sin_t, cos_t, cy64 - (sin_t * tx + cos_t * ty),
            0.0, 0.0, 1.0,
        )
    });

    let rotated = match img {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(warp_affine(gray, &inverse, out_w, out_h)),
        other => DynamicImage::ImageRgb8(warp_affine(&other.to_rgb8(), &inverse, out_w, out_h)),
    };

    let axis_rect = covering_rect(tx as f32, ty as f32, rect.width, rect.height);
    (rotated, axis_rect)
}

/// Inverse-mapped affine warp with bilinear interpolation, falling back to
/// nearest neighbour on the last row/column.
fn warp_affine<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    inverse: &Matrix3<f64>,
    out_w: u32,
    out_h: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut out_img: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(out_w, out_h);
    let channels = P::CHANNEL_COUNT as usize;
    let src_cols = src.width() as i32;
    let src_rows = src.height() as i32;

    let (m00, m01, m02) = (inverse[(0, 0)], inverse[(0, 1)], inverse[(0, 2)]);
    let (m10, m11, m12) = (inverse[(1, 0)], inverse[(1, 1)], inverse[(1, 2)]);

    let mut vals = [0u8; 4];
    for y in 0..out_h {
        let y_f = y as f64;
        let m01y = m01 * y_f + m02;
        let m11y = m11 * y_f + m12;

        for x in 0..out_w {
            let x_f = x as f64;
            let src_x_f = m00 * x_f + m01y;
            let src_y_f = m10 * x_f + m11y;

            let x0 = src_x_f.floor() as i32;
            let y0 = src_y_f.floor() as i32;
            let x1 = x0 + 1;
            let y1 = y0 + 1;

            if x0 >= 0 && x1 < src_cols && y0 >= 0 && y1 < src_rows {
                let fx = src_x_f - x0 as f64;
                let fy = src_y_f - y0 as f64;

                let p00 = src.get_pixel(x0 as u32, y0 as u32).channels();
                let p10 = src.get_pixel(x1 as u32, y0 as u32).channels();
                let p01 = src.get_pixel(x0 as u32, y1 as u32).channels();
                let p11 = src.get_pixel(x1 as u32, y1 as u32).channels();

                for c in 0..channels {
                    let v = (1.0 - fx) * (1.0 - fy) * p00[c] as f64
                        + fx * (1.0 - fy) * p10[c] as f64
                        + (1.0 - fx) * fy * p01[c] as f64
                        + fx * fy * p11[c] as f64;
                    vals[c] = v.round().clamp(0.0, 255.0) as u8;
                }
                out_img.put_pixel(x, y, *P::from_slice(&vals[..channels]));
            } else {
                let xn = src_x_f.round() as i32;
                let yn = src_y_f.round() as i32;
                if xn >= 0 && xn < src_cols && yn >= 0 && yn < src_rows {
                    out_img.put_pixel(x, y, *src.get_pixel(xn as u32, yn as u32));
                }
            }
        }
    }

    out_img
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn rotated_rect_contour(cx: f32, cy: f32, w: f32, h: f32, angle: f32) -> Contour {
        let r = RotatedRect::new(Point2f::new(cx, cy), w, h, angle);
        Contour {
            points: r
                .points()
                .iter()
                .map(|p| (p.x.round() as i32, p.y.round() as i32))
                .collect(),
        }
    }

    #[test]
    fn test_bounding_rect_is_inclusive() {
        let c = Contour {
            points: vec![(3, 4), (10, 4), (10, 9), (3, 9)],
        };
        assert_eq!(bounding_rect(&c), Some(Rect::new(3, 4, 8, 6)));
        assert_eq!(bounding_rect(&Contour::new()), None);
    }

    #[test]
    fn test_convex_hull_drops_interior_points() {
        let pts = [
            Point2f::new(0.0, 0.0),
            Point2f::new(4.0, 0.0),
            Point2f::new(2.0, 1.0),
            Point2f::new(4.0, 4.0),
            Point2f::new(0.0, 4.0),
            Point2f::new(2.0, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
    }

    #[test]
    fn test_min_area_rect_recovers_rotation() {
        let c = rotated_rect_contour(200.0, 150.0, 200.0, 100.0, 15.0);
        let r = min_area_rect(&c).unwrap();
        assert!((r.angle - 15.0).abs() < 1.0, "angle {}", r.angle);
        assert!((r.width - 200.0).abs() < 2.0);
        assert!((r.height - 100.0).abs() < 2.0);
        assert!((r.center.x - 200.0).abs() < 1.0);
        assert!((r.center.y - 150.0).abs() < 1.0);
    }

    #[test]
    fn test_min_area_rect_rejects_degenerate_contours() {
        let point = Contour { points: vec![(7, 3)] };
        assert!(min_area_rect(&point).is_none());
        let line = Contour {
            points: vec![(0, 5), (4, 5), (9, 5), (4, 5)],
        };
        assert!(min_area_rect(&line).is_none());
        let diagonal = Contour {
            points: vec![(0, 0), (3, 3), (6, 6)],
        };
        assert!(min_area_rect(&diagonal).is_none());
        assert!(min_area_rect(&Contour::new()).is_none());
    }

    #[test]
    fn test_min_area_rect_of_axis_aligned_box_has_zero_angle() {
        let c = Contour {
            points: vec![(10, 10), (50, 10), (50, 30), (10, 30)],
        };
        let r = min_area_rect(&c).unwrap();
        assert!(r.angle.abs() < 1e-3);
        assert_eq!((r.width, r.height), (40.0, 20.0));
    }

    #[test]
    fn test_rotate_to_rect_without_angle_keeps_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 20, Luma([7])));
        let rect = RotatedRect::new(Point2f::new(15.0, 10.0), 10.0, 6.0, 0.0);
        let (out, axis) = rotate_to_rect(&img, &rect);
        assert_eq!((out.width(), out.height()), (30, 20));
        assert_eq!(axis, Rect::new(10, 7, 11, 7));
    }

    #[test]
    fn test_rotate_to_rect_aligns_rotated_block() {
        // bright block rotated by 20 degrees on a dark canvas
        let mut img = GrayImage::new(200, 200);
        let rect = RotatedRect::new(Point2f::new(100.0, 100.0), 80.0, 40.0, 20.0);
        let (sin_t, cos_t) = 20f32.to_radians().sin_cos();
        for (x, y, p) in img.enumerate_pixels_mut() {
            let dx = x as f32 - 100.0;
            let dy = y as f32 - 100.0;
            let u = dx * cos_t + dy * sin_t;
            let v = -dx * sin_t + dy * cos_t;
            if u.abs() <= 40.0 && v.abs() <= 20.0 {
                *p = Luma([255]);
            }
        }

        let (out, axis) = rotate_to_rect(&DynamicImage::ImageLuma8(img), &rect);
        let gray = out.to_luma8();
        let inner = Rect::new(axis.x + 3, axis.y + 3, axis.width - 6, axis.height - 6);
        for y in inner.y..inner.bottom() {
            for x in inner.x..inner.right() {
                assert!(gray.get_pixel(x as u32, y as u32)[0] > 200, "dark pixel at {x},{y}");
            }
        }
        assert!(gray.get_pixel((axis.x - 4) as u32, (axis.y - 4) as u32)[0] < 50);
    }
}
