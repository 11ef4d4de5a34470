//! Frame compositor: maps a render state onto source pixels and draws the
//! zoomed view into an offscreen surface.
//!
//! All rectangles here are absolute physical pixels. Nothing in this module
//! fails: out-of-range geometry is clipped away during the blit.

use image::{Rgba, RgbaImage};
use serde::Serialize;

use zoomreel_project_model::{CropRegion, RenderState, MIN_SCALE};

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// An axis-aligned rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Where to read from in the source frame and where to draw on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub src: PixelRect,
    pub dst: PixelRect,
}

/// Compute the source sub-rectangle for `state` and its letterboxed
/// placement inside a `dest_width` x `dest_height` surface.
pub fn project(
    crop: &CropRegion,
    state: &RenderState,
    device_pixel_ratio: f64,
    dest_width: u32,
    dest_height: u32,
) -> Projection {
    let scale = if state.scale.is_finite() && state.scale > 0.0 {
        state.scale
    } else {
        MIN_SCALE
    };

    let view_width = crop.width * device_pixel_ratio / scale;
    let view_height = crop.height * device_pixel_ratio / scale;
    let center_x = (crop.x + state.center.x) * device_pixel_ratio;
    let center_y = (crop.y + state.center.y) * device_pixel_ratio;

    let src = PixelRect {
        x: center_x - view_width / 2.0,
        y: center_y - view_height / 2.0,
        width: view_width,
        height: view_height,
    };

    Projection {
        src,
        dst: letterbox(crop.aspect(), f64::from(dest_width), f64::from(dest_height)),
    }
}

/// Largest rectangle of `aspect` centered inside the destination.
fn letterbox(aspect: f64, dest_width: f64, dest_height: f64) -> PixelRect {
    let dest_aspect = if dest_height > 0.0 {
        dest_width / dest_height
    } else {
        aspect
    };

    if aspect > dest_aspect {
        let height = dest_width / aspect;
        PixelRect {
            x: 0.0,
            y: (dest_height - height) / 2.0,
            width: dest_width,
            height,
        }
    } else {
        let width = dest_height * aspect;
        PixelRect {
            x: (dest_width - width) / 2.0,
            y: 0.0,
            width,
            height: dest_height,
        }
    }
}

/// Nearest-neighbour scaled copy of `projection.src` in `frame` onto
/// `projection.dst` in `surface`.
///
/// Destination pixels whose sample falls outside the frame are left as they
/// are, as are pixels outside `dst`.
pub fn blit(surface: &mut RgbaImage, frame: &RgbaImage, projection: &Projection) {
    let Projection { src, dst } = *projection;
    if src.is_empty() || dst.is_empty() || frame.width() == 0 || frame.height() == 0 {
        return;
    }

    let x_range = pixel_span(dst.x, dst.right(), surface.width());
    let y_range = pixel_span(dst.y, dst.bottom(), surface.height());
    let frame_w = f64::from(frame.width());
    let frame_h = f64::from(frame.height());

    for py in y_range {
        let v = (f64::from(py) + 0.5 - dst.y) / dst.height;
        if !(0.0..1.0).contains(&v) {
            continue;
        }
        let sy = (src.y + v * src.height).floor();
        if sy < 0.0 || sy >= frame_h {
            continue;
        }

        for px in x_range.clone() {
            let u = (f64::from(px) + 0.5 - dst.x) / dst.width;
            if !(0.0..1.0).contains(&u) {
                continue;
            }
            let sx = (src.x + u * src.width).floor();
            if sx < 0.0 || sx >= frame_w {
                continue;
            }
            surface.put_pixel(px, py, *frame.get_pixel(sx as u32, sy as u32));
        }
    }
}

fn pixel_span(start: f64, end: f64, limit: u32) -> std::ops::Range<u32> {
    let lo = start.floor().max(0.0).min(f64::from(limit)) as u32;
    let hi = end.ceil().max(0.0).min(f64::from(limit)) as u32;
    lo..hi.max(lo)
}

/// Owns the offscreen surface frames are composed onto.
#[derive(Debug, Clone)]
pub struct Compositor {
    surface: RgbaImage,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: RgbaImage::from_pixel(width, height, BLACK),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Fill the surface with black.
    pub fn clear(&mut self) {
        for pixel in self.surface.pixels_mut() {
            *pixel = BLACK;
        }
    }

    /// Compose one output frame and return the surface.
    pub fn render(
        &mut self,
        frame: &RgbaImage,
        crop: &CropRegion,
        state: &RenderState,
        device_pixel_ratio: f64,
    ) -> &RgbaImage {
        let (width, height) = self.size();
        let projection = project(crop, state, device_pixel_ratio, width, height);
        self.clear();
        blit(&mut self.surface, frame, &projection);
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoomreel_project_model::LogicalPoint;

    fn crop() -> CropRegion {
        CropRegion::new(100.0, 50.0, 800.0, 600.0)
    }

    fn checkerboard(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 40) as u8, (y * 40) as u8, 200, 255])
        })
    }

    #[test]
    fn test_source_rect_follows_scale_and_center() {
        let state = RenderState {
            scale: 1.5,
            center: LogicalPoint::new(400.0, 300.0),
        };
        let projection = project(&crop(), &state, 1.0, 1280, 720);

        assert!((projection.src.width - 533.333_333).abs() < 1e-3);
        assert!((projection.src.height - 400.0).abs() < 1e-9);
        let (cx, cy) = projection.src.center();
        assert!((cx - 500.0).abs() < 1e-9);
        assert!((cy - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_device_pixel_ratio_scales_source() {
        let state = RenderState::identity(&crop());
        let projection = project(&crop(), &state, 2.0, 1600, 1200);
        assert_eq!(projection.src.x, 200.0);
        assert_eq!(projection.src.y, 100.0);
        assert_eq!(projection.src.width, 1600.0);
        assert_eq!(projection.src.height, 1200.0);
    }

    #[test]
    fn test_narrow_crop_is_pillarboxed() {
        let projection = project(&crop(), &RenderState::identity(&crop()), 1.0, 1280, 720);
        assert_eq!(projection.dst.width, 960.0);
        assert_eq!(projection.dst.height, 720.0);
        assert_eq!(projection.dst.x, 160.0);
        assert_eq!(projection.dst.y, 0.0);
    }

    #[test]
    fn test_wide_crop_is_letterboxed() {
        let wide = CropRegion::new(0.0, 0.0, 1600.0, 400.0);
        let projection = project(&wide, &RenderState::identity(&wide), 1.0, 800, 600);
        assert_eq!(projection.dst.width, 800.0);
        assert_eq!(projection.dst.height, 200.0);
        assert_eq!(projection.dst.y, 200.0);
    }

    #[test]
    fn test_identity_blit_copies_frame() {
        let frame = checkerboard(4, 4);
        let full = CropRegion::new(0.0, 0.0, 4.0, 4.0);
        let mut compositor = Compositor::new(4, 4);

        let surface = compositor.render(&frame, &full, &RenderState::identity(&full), 1.0);
        assert_eq!(surface, &frame);
    }

    #[test]
    fn test_zoomed_blit_samples_center() {
        let frame = checkerboard(4, 4);
        let full = CropRegion::new(0.0, 0.0, 4.0, 4.0);
        let state = RenderState {
            scale: 2.0,
            center: LogicalPoint::new(2.0, 2.0),
        };
        let mut compositor = Compositor::new(4, 4);
        let surface = compositor.render(&frame, &full, &state, 1.0);

        assert_eq!(surface.get_pixel(0, 0), frame.get_pixel(1, 1));
        assert_eq!(surface.get_pixel(3, 3), frame.get_pixel(2, 2));
    }

    #[test]
    fn test_out_of_frame_source_is_clipped() {
        let frame = checkerboard(4, 4);
        let full = CropRegion::new(0.0, 0.0, 4.0, 4.0);
        let state = RenderState {
            scale: 1.0,
            center: LogicalPoint::new(0.0, 2.0),
        };
        let mut compositor = Compositor::new(4, 4);
        let surface = compositor.render(&frame, &full, &state, 1.0);

        // Left half samples x < 0 and stays black.
        assert_eq!(*surface.get_pixel(0, 1), BLACK);
        assert_eq!(*surface.get_pixel(1, 1), BLACK);
        assert_eq!(surface.get_pixel(2, 1), frame.get_pixel(0, 1));
    }

    #[test]
    fn test_degenerate_projection_is_ignored() {
        let frame = checkerboard(4, 4);
        let mut surface = RgbaImage::from_pixel(4, 4, BLACK);
        let projection = Projection {
            src: PixelRect {
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 4.0,
            },
            dst: PixelRect {
                x: -10.0,
                y: -10.0,
                width: 100.0,
                height: 100.0,
            },
        };
        blit(&mut surface, &frame, &projection);
        assert!(surface.pixels().all(|p| *p == BLACK));
    }
}
