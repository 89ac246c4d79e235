//! Viewer-space ↔ display-space coordinate mapping.
//!
//! The host display is captured at its native resolution and shrunk to a
//! fixed stream width before it is sent to the viewer.  The viewer reports
//! pointer positions in the coordinates of that shrunk image ("viewer
//! space"), so every incoming point must be scaled back up into the host's
//! native pixels ("display space") before it is injected.
//!
//! ```text
//! display 1440×900  ──(× 0.667)──►  stream 960×600
//!        ▲                                 │
//!        └────────(÷ 0.667)────────────────┘  viewer point (480,300) → (720,450)
//! ```
//!
//! A single scale factor (`stream.width / display.width`) is used for both
//! axes; the stream height is derived from it so the aspect ratio is kept.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

/// Errors raised by [`CoordinateMapper`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The display reported a zero dimension.
    #[error("invalid display geometry {width}x{height}: both dimensions must be positive")]
    InvalidGeometry { width: u32, height: u32 },

    /// The configured stream width is zero.
    #[error("invalid stream width 0: must be positive")]
    InvalidStreamWidth,

    /// A point was mapped before any screen connection established geometry.
    #[error("coordinate mapping requested before display geometry was established")]
    NotEstablished,
}

/// A pixel position.  Whether it is in viewer or display space depends on
/// where it came from; the type does not track that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Native pixel dimensions of the host display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
}

impl DisplayGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Dimensions of the streamed (resized) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
}

impl StreamGeometry {
    /// Derives the stream geometry for `display` at a fixed `width`.
    ///
    /// `height = round(width * display.height / display.width)`, never less
    /// than one pixel.
    ///
    /// # Errors
    ///
    /// [`GeometryError::InvalidGeometry`] if either display dimension is zero,
    /// [`GeometryError::InvalidStreamWidth`] if `width` is zero.
    pub fn for_display(display: DisplayGeometry, width: u32) -> Result<Self, GeometryError> {
        if display.width == 0 || display.height == 0 {
            return Err(GeometryError::InvalidGeometry {
                width: display.width,
                height: display.height,
            });
        }
        if width == 0 {
            return Err(GeometryError::InvalidStreamWidth);
        }

        // Integer round-half-up of width * dh / dw.
        let numerator = 2 * u64::from(width) * u64::from(display.height) + u64::from(display.width);
        let height = numerator / (2 * u64::from(display.width));
        let height = u32::try_from(height).unwrap_or(u32::MAX).max(1);

        Ok(Self { width, height })
    }
}

/// The established display/stream pair.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Mapping {
    display: DisplayGeometry,
    stream: StreamGeometry,
    scale: f64,
}

/// Maps viewer-space points to display space and back.
///
/// Starts out unestablished; [`establish`](Self::establish) is called by the
/// screen loop once per connection.  Until then every mapping request fails
/// with [`GeometryError::NotEstablished`] rather than guessing a scale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateMapper {
    mapping: Option<Mapping>,
}

impl CoordinateMapper {
    /// Creates an unestablished mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes and stores the stream geometry and scale for `display`.
    ///
    /// Replaces any previously established geometry.  On error the previous
    /// state is left untouched.
    ///
    /// # Errors
    ///
    /// See [`StreamGeometry::for_display`].
    pub fn establish(
        &mut self,
        display: DisplayGeometry,
        configured_width: u32,
    ) -> Result<StreamGeometry, GeometryError> {
        let stream = StreamGeometry::for_display(display, configured_width)?;
        let scale = f64::from(stream.width) / f64::from(display.width);
        self.mapping = Some(Mapping {
            display,
            stream,
            scale,
        });
        Ok(stream)
    }

    /// Returns `true` once [`establish`](Self::establish) has succeeded.
    pub fn is_established(&self) -> bool {
        self.mapping.is_some()
    }

    /// `stream.width / display.width`.  Always positive once established.
    pub fn scale(&self) -> Result<f64, GeometryError> {
        self.mapping().map(|m| m.scale)
    }

    pub fn stream_geometry(&self) -> Result<StreamGeometry, GeometryError> {
        self.mapping().map(|m| m.stream)
    }

    pub fn display_geometry(&self) -> Result<DisplayGeometry, GeometryError> {
        self.mapping().map(|m| m.display)
    }

    /// Converts a viewer-space point to display space: both axes divided by
    /// the scale, rounded to the nearest pixel.
    ///
    /// # Errors
    ///
    /// [`GeometryError::NotEstablished`] before the first `establish`.
    pub fn to_display(&self, viewer: Point) -> Result<Point, GeometryError> {
        let m = self.mapping()?;
        let ratio = f64::from(m.display.width) / f64::from(m.stream.width);
        Ok(Point::new(
            scale_axis(viewer.x, ratio),
            scale_axis(viewer.y, ratio),
        ))
    }

    /// Converts a display-space point to viewer space (the forward direction
    /// frames are shrunk in).
    ///
    /// # Errors
    ///
    /// [`GeometryError::NotEstablished`] before the first `establish`.
    pub fn to_viewer(&self, display: Point) -> Result<Point, GeometryError> {
        let m = self.mapping()?;
        Ok(Point::new(
            scale_axis(display.x, m.scale),
            scale_axis(display.y, m.scale),
        ))
    }

    fn mapping(&self) -> Result<&Mapping, GeometryError> {
        self.mapping.as_ref().ok_or(GeometryError::NotEstablished)
    }
}

fn scale_axis(value: i32, factor: f64) -> i32 {
    let scaled = (f64::from(value) * factor).round();
    // `as` saturates on overflow, which is what a pointer position wants.
    scaled as i32
}

/// Cloneable handle to the one [`CoordinateMapper`] shared by the screen
/// loop (writer, once per connection) and the input loop (reader, per event).
///
/// The lock gives the happens-before edge: a point mapped after
/// [`establish`](Self::establish) returns always sees the new geometry.
#[derive(Debug, Clone, Default)]
pub struct SharedMapper {
    inner: Arc<RwLock<CoordinateMapper>>,
}

impl SharedMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establishes geometry for a new screen connection.
    ///
    /// # Errors
    ///
    /// See [`CoordinateMapper::establish`].
    pub fn establish(
        &self,
        display: DisplayGeometry,
        configured_width: u32,
    ) -> Result<StreamGeometry, GeometryError> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let stream = guard.establish(display, configured_width)?;
        let DisplayGeometry {
            width: display_width,
            height: display_height,
        } = display;
        tracing::debug!(
            "geometry established: display {display_width}x{display_height} → stream {}x{}",
            stream.width,
            stream.height
        );
        Ok(stream)
    }

    /// Maps a viewer point under the current geometry.
    ///
    /// # Errors
    ///
    /// [`GeometryError::NotEstablished`] if no screen connection has
    /// established geometry yet.
    pub fn to_display(&self, viewer: Point) -> Result<Point, GeometryError> {
        self.with(|mapper| mapper.to_display(viewer))
    }

    /// Runs `f` against the current mapper under a read lock.
    pub fn with<R>(&self, f: impl FnOnce(&CoordinateMapper) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Returns a copy of the current mapper.
    pub fn snapshot(&self) -> CoordinateMapper {
        self.with(CoordinateMapper::clone)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn established(dw: u32, dh: u32, width: u32) -> CoordinateMapper {
        let mut mapper = CoordinateMapper::new();
        mapper
            .establish(DisplayGeometry::new(dw, dh), width)
            .expect("geometry must be valid");
        mapper
    }

    #[test]
    fn test_stream_geometry_preserves_aspect_ratio_for_1440x900() {
        let stream = StreamGeometry::for_display(DisplayGeometry::new(1440, 900), 960).unwrap();
        assert_eq!(stream, StreamGeometry { width: 960, height: 600 });
    }

    #[test]
    fn test_stream_geometry_rounds_height_to_nearest() {
        // 960 * 1080 / 1366 = 758.96…
        let stream = StreamGeometry::for_display(DisplayGeometry::new(1366, 1080), 960).unwrap();
        assert_eq!(stream.height, 759);
    }

    #[test]
    fn test_stream_geometry_height_never_zero() {
        let stream = StreamGeometry::for_display(DisplayGeometry::new(10_000, 1), 10).unwrap();
        assert_eq!(stream.height, 1);
    }

    #[test]
    fn test_establish_rejects_zero_width_display() {
        let mut mapper = CoordinateMapper::new();
        let result = mapper.establish(DisplayGeometry::new(0, 900), 960);
        assert_eq!(
            result,
            Err(GeometryError::InvalidGeometry { width: 0, height: 900 })
        );
        assert!(!mapper.is_established());
    }

    #[test]
    fn test_establish_rejects_zero_stream_width() {
        let mut mapper = CoordinateMapper::new();
        let result = mapper.establish(DisplayGeometry::new(1440, 900), 0);
        assert_eq!(result, Err(GeometryError::InvalidStreamWidth));
    }

    #[test]
    fn test_failed_establish_keeps_previous_geometry() {
        let mut mapper = established(1440, 900, 960);
        let _ = mapper.establish(DisplayGeometry::new(0, 0), 960);
        assert_eq!(
            mapper.display_geometry().unwrap(),
            DisplayGeometry::new(1440, 900)
        );
    }

    #[test]
    fn test_scale_for_1440_display_is_two_thirds() {
        let mapper = established(1440, 900, 960);
        let scale = mapper.scale().unwrap();
        assert!((scale - 0.6667).abs() < 0.001, "scale was {scale}");
    }

    #[test]
    fn test_to_display_scenario_center_point() {
        // Arrange
        let mapper = established(1440, 900, 960);

        // Act
        let p = mapper.to_display(Point::new(480, 300)).unwrap();

        // Assert
        assert!((p.x - 720).abs() <= 1, "x was {}", p.x);
        assert!((p.y - 450).abs() <= 1, "y was {}", p.y);
    }

    #[test]
    fn test_to_display_half_scale_doubles_coordinates() {
        let mapper = established(1920, 1080, 960);
        assert_eq!(
            mapper.to_display(Point::new(200, 200)).unwrap(),
            Point::new(400, 400)
        );
    }

    #[test]
    fn test_to_display_identity_at_scale_one() {
        let mapper = established(960, 600, 960);
        assert_eq!(
            mapper.to_display(Point::new(150, 100)).unwrap(),
            Point::new(150, 100)
        );
    }

    #[test]
    fn test_to_display_handles_negative_coordinates() {
        let mapper = established(1920, 1080, 960);
        assert_eq!(
            mapper.to_display(Point::new(-5, -1)).unwrap(),
            Point::new(-10, -2)
        );
    }

    #[test]
    fn test_to_display_before_establish_is_rejected() {
        let mapper = CoordinateMapper::new();
        assert_eq!(
            mapper.to_display(Point::new(1, 1)),
            Err(GeometryError::NotEstablished)
        );
    }

    #[test]
    fn test_to_viewer_is_forward_scale() {
        let mapper = established(1440, 900, 960);
        assert_eq!(
            mapper.to_viewer(Point::new(720, 450)).unwrap(),
            Point::new(480, 300)
        );
    }

    #[test]
    fn test_shared_mapper_rejects_before_establish() {
        let shared = SharedMapper::new();
        assert_eq!(
            shared.to_display(Point::new(3, 4)),
            Err(GeometryError::NotEstablished)
        );
    }

    #[test]
    fn test_shared_mapper_clones_see_establish() {
        // Arrange: the input loop holds a clone taken before the screen loop connects.
        let screen_side = SharedMapper::new();
        let input_side = screen_side.clone();

        // Act
        screen_side
            .establish(DisplayGeometry::new(1920, 1080), 960)
            .unwrap();

        // Assert
        assert_eq!(
            input_side.to_display(Point::new(10, 10)).unwrap(),
            Point::new(20, 20)
        );
    }

    #[test]
    fn test_shared_mapper_establish_returns_stream_geometry() {
        let shared = SharedMapper::new();

        let stream = shared.establish(DisplayGeometry::new(1440, 900), 960).unwrap();

        assert_eq!((stream.width, stream.height), (960, 600));
        assert_eq!(
            shared.snapshot().display_geometry().unwrap(),
            DisplayGeometry::new(1440, 900)
        );
    }

    #[test]
    fn test_shared_mapper_reestablish_replaces_geometry() {
        let shared = SharedMapper::new();
        shared.establish(DisplayGeometry::new(1920, 1080), 960).unwrap();
        shared.establish(DisplayGeometry::new(960, 540), 960).unwrap();
        assert_eq!(shared.snapshot().scale().unwrap(), 1.0);
    }

    #[test]
    fn test_shared_mapper_visible_across_threads() {
        let shared = SharedMapper::new();
        let writer = shared.clone();
        std::thread::spawn(move || {
            writer
                .establish(DisplayGeometry::new(2880, 1800), 1440)
                .unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(
            shared.to_display(Point::new(100, 50)).unwrap(),
            Point::new(200, 100)
        );
    }
}
