//! Story map canvas
//!
//! An optional raster drawing surface tied to the current story. The
//! surface only exists while the canvas panel is open; opening the panel
//! requests a surface that is created after a short mount delay, and any
//! earlier surface is disposed before the new one is built.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::ticket::{Generation, Ticket};
use crate::story::canvas_export_name;

pub const DEFAULT_WIDTH: u32 = 600;
pub const DEFAULT_HEIGHT: u32 = 400;
pub const BACKGROUND: Rgba<u8> = Rgba([0x33, 0x33, 0x33, 0xff]);
pub const DEFAULT_BRUSH_COLOR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
pub const DEFAULT_BRUSH_WIDTH: u32 = 3;

/// Errors from canvas operations
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("No canvas surface is active")]
    NoSurface,

    #[error("Invalid colour: {0}")]
    InvalidColor(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse `#rrggbb` or `#rgb`
pub fn parse_color(text: &str) -> Result<Rgba<u8>, CanvasError> {
    let invalid = || CanvasError::InvalidColor(text.to_string());
    let hex = text.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        6 => Ok(Rgba([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            0xff,
        ])),
        3 => {
            let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Ok(Rgba([short(0)?, short(1)?, short(2)?, 0xff]))
        }
        _ => Err(invalid()),
    }
}

/// Free-drawing brush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brush {
    pub color: Rgba<u8>,
    pub width: u32,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: DEFAULT_BRUSH_COLOR,
            width: DEFAULT_BRUSH_WIDTH,
        }
    }
}

/// A live drawing surface
///
/// Counts itself in the owning session's live-surface counter while it
/// exists.
#[derive(Debug)]
pub struct Surface {
    id: u64,
    pixels: RgbaImage,
    live: Arc<AtomicUsize>,
}

impl Surface {
    fn new(id: u64, width: u32, height: u32, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            id,
            pixels: RgbaImage::from_pixel(width, height, BACKGROUND),
            live,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        (x < self.width() && y < self.height()).then(|| *self.pixels.get_pixel(x, y))
    }

    /// Wipe the drawing back to the background colour
    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = BACKGROUND;
        }
    }

    /// Draw a straight stroke from `from` to `to`. The part of the line
    /// outside the surface (plus one brush width) is never walked.
    pub fn stroke(&mut self, from: (i32, i32), to: (i32, i32), brush: &Brush) {
        let margin = f64::from(brush.width.max(1));
        let min = (-margin, -margin);
        let max = (
            f64::from(self.width()) + margin,
            f64::from(self.height()) + margin,
        );
        let from = (f64::from(from.0), f64::from(from.1));
        let to = (f64::from(to.0), f64::from(to.1));
        let Some((start, end)) = clip_segment(from, to, min, max) else {
            return;
        };

        let (dx, dy) = (end.0 - start.0, end.1 - start.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
        for step in 0..=steps {
            let t = f64::from(step) / f64::from(steps);
            let x = start.0 + dx * t;
            let y = start.1 + dy * t;
            self.dab(x.round() as i32, y.round() as i32, brush);
        }
    }

    /// Stamp one brush-sized disc centred on (cx, cy)
    fn dab(&mut self, cx: i32, cy: i32, brush: &Brush) {
        let radius = (brush.width.max(1) as f32) / 2.0;
        let reach = radius.ceil() as i32;
        for y in (cy - reach)..=(cy + reach) {
            for x in (cx - reach)..=(cx + reach) {
                if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
                    continue;
                }
                let (fx, fy) = ((x - cx) as f32, (y - cy) as f32);
                if fx * fx + fy * fy <= radius * radius {
                    self.pixels.put_pixel(x as u32, y as u32, brush.color);
                }
            }
        }
    }

    /// Encode as PNG
    pub fn to_png(&self) -> Result<Vec<u8>, CanvasError> {
        let mut buffer = Cursor::new(Vec::new());
        self.pixels.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Replace the drawing with an image, scaled to the surface size
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<(), CanvasError> {
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        self.pixels = if decoded.dimensions() == self.pixels.dimensions() {
            decoded
        } else {
            image::imageops::resize(&decoded, self.width(), self.height(), FilterType::Triangle)
        };
        Ok(())
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Clip the segment `from`..`to` to the box `min`..`max` (Liang-Barsky).
/// `None` when no part of it lies inside.
fn clip_segment(
    from: (f64, f64),
    to: (f64, f64),
    min: (f64, f64),
    max: (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut enter, mut leave) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, from.0 - min.0),
        (dx, max.0 - from.0),
        (-dy, from.1 - min.1),
        (dy, max.1 - from.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            enter = enter.max(r);
        } else {
            leave = leave.min(r);
        }
        if enter > leave {
            return None;
        }
    }
    Some((
        (from.0 + dx * enter, from.1 + dy * enter),
        (from.0 + dx * leave, from.1 + dy * leave),
    ))
}

/// Canvas panel state
#[derive(Debug)]
pub struct CanvasSession {
    panel_open: bool,
    surface: Option<Surface>,
    brush: Brush,
    size: (u32, u32),
    next_id: u64,
    live: Arc<AtomicUsize>,
    mount: Generation,
    load: Generation,
}

impl Default for CanvasSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasSession {
    pub fn new() -> Self {
        Self::with_size(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            panel_open: false,
            surface: None,
            brush: Brush::default(),
            size: (width, height),
            next_id: 0,
            live: Arc::new(AtomicUsize::new(0)),
            mount: Generation::new(),
            load: Generation::new(),
        }
    }

    /// Open the panel. The surface is built by [`mount`](Self::mount) once
    /// the returned ticket's delay has passed.
    pub fn open(&mut self) -> Ticket {
        self.panel_open = true;
        self.mount.issue()
    }

    /// Build the surface for an `open` request, disposing any prior one.
    /// Returns false when the request was superseded or the panel closed.
    pub fn mount(&mut self, ticket: Ticket) -> bool {
        if !self.panel_open || !self.mount.is_current(ticket) {
            return false;
        }
        // Dispose before creating so two surfaces never coexist.
        self.surface = None;
        self.next_id += 1;
        self.surface = Some(Surface::new(
            self.next_id,
            self.size.0,
            self.size.1,
            Arc::clone(&self.live),
        ));
        self.brush = Brush::default();
        tracing::debug!(surface = self.next_id, "Canvas surface mounted");
        true
    }

    /// Close the panel and dispose the surface
    pub fn close(&mut self) {
        self.panel_open = false;
        self.surface = None;
        self.mount.invalidate();
        self.load.invalidate();
    }

    pub fn is_open(&self) -> bool {
        self.panel_open
    }

    /// True when a surface exists
    pub fn is_active(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    /// Number of surfaces alive right now
    pub fn live_surfaces(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Change the brush colour; false when no surface is active
    pub fn set_brush_color(&mut self, color: &str) -> Result<bool, CanvasError> {
        let parsed = parse_color(color)?;
        if self.surface.is_none() {
            return Ok(false);
        }
        self.brush.color = parsed;
        Ok(true)
    }

    /// Draw a stroke with the current brush; false when no surface is active
    pub fn stroke(&mut self, from: (i32, i32), to: (i32, i32)) -> bool {
        let brush = self.brush;
        match self.surface.as_mut() {
            Some(surface) => {
                surface.stroke(from, to, &brush);
                true
            }
            None => false,
        }
    }

    /// Wipe the surface; false when no surface is active
    pub fn clear(&mut self) -> bool {
        match self.surface.as_mut() {
            Some(surface) => {
                surface.clear();
                true
            }
            None => false,
        }
    }

    /// Blank the drawing for a different story and drop pending loads
    pub fn reset_for_story(&mut self) {
        self.load.invalidate();
        self.clear();
    }

    /// Write the drawing as `<name>-map.png` into `dir`
    pub fn export_local(&self, dir: &Path, name: &str) -> Result<PathBuf, CanvasError> {
        let surface = self.surface.as_ref().ok_or(CanvasError::NoSurface)?;
        let path = dir.join(canvas_export_name(name));
        std::fs::write(&path, surface.to_png()?)?;
        Ok(path)
    }

    /// PNG of the drawing, base64 encoded for the store
    pub fn encode_base64(&self) -> Result<String, CanvasError> {
        let surface = self.surface.as_ref().ok_or(CanvasError::NoSurface)?;
        Ok(BASE64.encode(surface.to_png()?))
    }

    /// Start a remote load
    pub fn begin_load(&mut self) -> Ticket {
        self.load.issue()
    }

    /// Apply a loaded base64 PNG. `Ok(false)` when the load is stale or the
    /// surface went away in the meantime.
    pub fn finish_load(&mut self, ticket: Ticket, png_base64: &str) -> Result<bool, CanvasError> {
        if !self.load.is_current(ticket) {
            tracing::debug!(%ticket, "Stale canvas load dropped");
            return Ok(false);
        }
        let Some(surface) = self.surface.as_mut() else {
            return Ok(false);
        };
        let bytes = BASE64.decode(png_base64.trim())?;
        surface.load_image(&bytes)?;
        Ok(true)
    }

    /// True when `ticket` is the latest load request
    pub fn is_current_load(&self, ticket: Ticket) -> bool {
        self.load.is_current(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted() -> CanvasSession {
        let mut canvas = CanvasSession::with_size(40, 30);
        let ticket = canvas.open();
        assert!(canvas.mount(ticket));
        canvas
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff0000").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_color("#0f0").unwrap(), Rgba([0, 255, 0, 255]));
        assert!(parse_color("red").is_err());
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#gg0000").is_err());
    }

    #[test]
    fn test_open_twice_disposes_first_surface() {
        let mut canvas = CanvasSession::with_size(10, 10);
        let first = canvas.open();
        assert!(canvas.mount(first));
        assert_eq!(canvas.surface().unwrap().id(), 1);

        let second = canvas.open();
        assert!(canvas.mount(second));
        assert_eq!(canvas.surface().unwrap().id(), 2);
        assert_eq!(canvas.live_surfaces(), 1);
    }

    #[test]
    fn test_superseded_mount_ignored() {
        let mut canvas = CanvasSession::with_size(10, 10);
        let first = canvas.open();
        let second = canvas.open();
        assert!(!canvas.mount(first));
        assert!(canvas.mount(second));
        assert_eq!(canvas.live_surfaces(), 1);
    }

    #[test]
    fn test_mount_after_close_ignored() {
        let mut canvas = CanvasSession::with_size(10, 10);
        let ticket = canvas.open();
        canvas.close();
        assert!(!canvas.mount(ticket));
        assert!(!canvas.is_active());
        assert_eq!(canvas.live_surfaces(), 0);
    }

    #[test]
    fn test_close_disposes_surface() {
        let mut canvas = mounted();
        assert_eq!(canvas.live_surfaces(), 1);
        canvas.close();
        assert_eq!(canvas.live_surfaces(), 0);
        assert!(!canvas.is_open());
    }

    #[test]
    fn test_no_surface_no_ops() {
        let mut canvas = CanvasSession::new();
        assert!(!canvas.set_brush_color("#ff0000").unwrap());
        assert!(!canvas.clear());
        assert!(!canvas.stroke((0, 0), (5, 5)));
        assert!(matches!(canvas.encode_base64(), Err(CanvasError::NoSurface)));
    }

    #[test]
    fn test_stroke_and_clear() {
        let mut canvas = mounted();
        canvas.set_brush_color("#ff0000").unwrap();
        assert!(canvas.stroke((5, 5), (20, 5)));
        let red = Rgba([255, 0, 0, 255]);
        assert_eq!(canvas.surface().unwrap().pixel(12, 5), Some(red));
        assert_eq!(canvas.surface().unwrap().pixel(12, 20), Some(BACKGROUND));

        canvas.clear();
        assert_eq!(canvas.surface().unwrap().pixel(12, 5), Some(BACKGROUND));
    }

    #[test]
    fn test_stroke_with_extreme_coordinates() {
        let mut canvas = mounted();
        canvas.set_brush_color("#ff0000").unwrap();
        let red = Rgba([255, 0, 0, 255]);

        assert!(canvas.stroke((i32::MIN, 10), (i32::MAX, 10)));
        assert_eq!(canvas.surface().unwrap().pixel(0, 10), Some(red));
        assert_eq!(canvas.surface().unwrap().pixel(39, 10), Some(red));

        canvas.clear();
        assert!(canvas.stroke((0, 0), (2_000_000_000, 0)));
        assert_eq!(canvas.surface().unwrap().pixel(39, 0), Some(red));

        canvas.clear();
        assert!(canvas.stroke((-500, -500), (-100, i32::MAX)));
        assert_eq!(canvas.surface().unwrap().pixel(0, 15), Some(BACKGROUND));
    }

    #[test]
    fn test_clip_segment() {
        let clipped = clip_segment((-10.0, 5.0), (30.0, 5.0), (0.0, 0.0), (20.0, 10.0));
        assert_eq!(clipped, Some(((0.0, 5.0), (20.0, 5.0))));
        assert_eq!(clip_segment((-10.0, -5.0), (50.0, -5.0), (0.0, 0.0), (20.0, 10.0)), None);
        assert_eq!(clip_segment((30.0, 5.0), (30.0, 5.0), (0.0, 0.0), (20.0, 10.0)), None);
    }

    #[test]
    fn test_png_round_trip_through_base64() {
        let mut source = mounted();
        source.set_brush_color("#00ff00").unwrap();
        source.stroke((0, 0), (39, 29));
        let encoded = source.encode_base64().unwrap();

        let mut target = mounted();
        let ticket = target.begin_load();
        assert!(target.finish_load(ticket, &encoded).unwrap());
        assert_eq!(
            target.surface().unwrap().pixel(0, 0),
            source.surface().unwrap().pixel(0, 0)
        );
    }

    #[test]
    fn test_loaded_image_scaled_to_surface() {
        let mut small = CanvasSession::with_size(10, 10);
        let t = small.open();
        small.mount(t);
        let encoded = small.encode_base64().unwrap();

        let mut canvas = mounted();
        let ticket = canvas.begin_load();
        canvas.finish_load(ticket, &encoded).unwrap();
        assert_eq!(canvas.surface().unwrap().width(), 40);
        assert_eq!(canvas.surface().unwrap().height(), 30);
    }

    #[test]
    fn test_stale_load_dropped() {
        let mut canvas = mounted();
        let encoded = canvas.encode_base64().unwrap();
        let old = canvas.begin_load();
        canvas.reset_for_story();
        assert!(!canvas.finish_load(old, &encoded).unwrap());
    }

    #[test]
    fn test_bad_payload() {
        let mut canvas = mounted();
        let ticket = canvas.begin_load();
        assert!(matches!(
            canvas.finish_load(ticket, "!!!"),
            Err(CanvasError::Base64(_))
        ));
        let ticket = canvas.begin_load();
        assert!(matches!(
            canvas.finish_load(ticket, &BASE64.encode(b"not a png")),
            Err(CanvasError::Image(_))
        ));
    }

    #[test]
    fn test_export_local() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = mounted();
        let path = canvas.export_local(dir.path(), "").unwrap();
        assert_eq!(path.file_name().unwrap(), "story-map.png");
        let bytes = std::fs::read(&path).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
    }
}
