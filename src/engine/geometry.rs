//! Page-space → viewport-space geometry.
//!
//! PDF page space has its origin at the bottom-left with y growing upwards;
//! a viewport has its origin at the top-left with y growing downwards and is
//! scaled by the zoom factor. Both are expressed as 2-D affine matrices
//! `[a, b, c, d, e, f]`, and a text item's position in the viewport is the
//! viewport matrix composed with the item's own matrix.

use serde::{Deserialize, Serialize};

/// 2-D affine transform `[a, b, c, d, e, f]`, mapping `(x, y)` to
/// `(a·x + c·y + e, b·x + d·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [f32; 6]);

impl Transform {
    pub const IDENTITY: Transform = Transform([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// Uniform scale plus translation, the shape of a text item's matrix.
    pub fn scale_translate(scale: f32, x: f32, y: f32) -> Self {
        Transform([scale, 0.0, 0.0, scale, x, y])
    }

    /// `self × other`: apply `other` first, then `self`.
    pub fn multiply(&self, other: &Transform) -> Transform {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Transform([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    pub fn translation(&self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }
}

/// Unscaled page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// A page laid out at a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub transform: Transform,
}

impl Viewport {
    pub fn new(page: PageSize, scale: f32) -> Self {
        Self {
            width: page.width * scale,
            height: page.height * scale,
            scale,
            // flip y, then scale
            transform: Transform([scale, 0.0, 0.0, -scale, 0.0, page.height * scale]),
        }
    }

    /// Pixel size of a raster surface for this viewport (at least 1×1).
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let t = Transform([2.0, 0.5, -1.0, 3.0, 7.0, 9.0]);
        assert_eq!(Transform::IDENTITY.multiply(&t), t);
        assert_eq!(t.multiply(&Transform::IDENTITY), t);
    }

    #[test]
    fn viewport_flips_y_axis() {
        let vp = Viewport::new(PageSize { width: 600.0, height: 800.0 }, 1.0);
        // bottom-left of the page maps to the bottom-left of the viewport
        assert_eq!(vp.transform.apply(0.0, 0.0), (0.0, 800.0));
        // top-left maps to the origin
        assert_eq!(vp.transform.apply(0.0, 800.0), (0.0, 0.0));
    }

    #[test]
    fn composed_position_scales_with_zoom() {
        let page = PageSize { width: 600.0, height: 800.0 };
        let item = Transform::scale_translate(12.0, 100.0, 700.0);

        let at_1 = Viewport::new(page, 1.0).transform.multiply(&item);
        assert_eq!(at_1.translation(), (100.0, 100.0));

        let at_2 = Viewport::new(page, 2.0).transform.multiply(&item);
        assert_eq!(at_2.translation(), (200.0, 200.0));
        // font matrix scales too
        assert_eq!(at_2.0[0], 24.0);
    }

    #[test]
    fn pixel_size_never_zero() {
        let vp = Viewport::new(PageSize { width: 0.1, height: 0.1 }, 0.5);
        assert_eq!(vp.pixel_size(), (1, 1));
    }
}
