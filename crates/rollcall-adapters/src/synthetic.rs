//! Synthetic capture and detection collaborators
//!
//! Stand-ins for the real screen grabber and face counter, used by the
//! `rehearse` command to drive the engine through a full dry run. The
//! frame source emits a real encoded PNG so everything downstream (the
//! artifact store, anyone opening the saved file) sees a well-formed
//! image; the detector reports a fixed count so the threshold outcome
//! is chosen by the operator, not by a model.

use async_trait::async_trait;
use png::{BitDepth, ColorType, Encoder};
use rollcall_core::ports::{
    CaptureError, CapturePort, CapturedFrame, DetectorError, DetectorPort,
};
use std::io::BufWriter;
use tracing::debug;

const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Flat fill standing in for a conference gallery.
const GALLERY_GRAY: [u8; 4] = [0x2e, 0x2e, 0x2e, 0xff];

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 360;

/// Capture adapter that generates a frame instead of grabbing one.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
}

impl SyntheticFrameSource {
    /// Creates a source emitting frames at the default size.
    pub fn new() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    /// Creates a source emitting frames at a specific size.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Encodes RGBA pixels as PNG.
    fn encode_png(rgba_data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CaptureError> {
        let mut png_data = Vec::new();
        {
            let buf_writer = BufWriter::new(&mut png_data);
            let mut encoder = Encoder::new(buf_writer, width, height);
            encoder.set_color(ColorType::Rgba);
            encoder.set_depth(BitDepth::Eight);

            let mut writer = encoder
                .write_header()
                .map_err(|e| CaptureError::Failed(format!("PNG header error: {}", e)))?;
            writer
                .write_image_data(rgba_data)
                .map_err(|e| CaptureError::Failed(format!("PNG encoding error: {}", e)))?;
        }

        Ok(png_data)
    }
}

impl Default for SyntheticFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapturePort for SyntheticFrameSource {
    async fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        let pixel_count = self.width as usize * self.height as usize;
        let mut rgba = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            rgba.extend_from_slice(&GALLERY_GRAY);
        }

        let data = Self::encode_png(&rgba, self.width, self.height)?;
        debug!(
            "Synthetic frame generated: {}x{}, {} bytes PNG",
            self.width,
            self.height,
            data.len()
        );

        Ok(CapturedFrame {
            data,
            width: self.width,
            height: self.height,
        })
    }
}

/// Detector adapter that reports a fixed face count.
///
/// Still refuses frames that are not PNG, so a rehearsal exercises the
/// same frame handoff the real detector would see.
pub struct FixedCountDetector {
    count: u32,
}

impl FixedCountDetector {
    pub fn new(count: u32) -> Self {
        Self { count }
    }
}

#[async_trait]
impl DetectorPort for FixedCountDetector {
    async fn count_faces(&self, frame: &CapturedFrame) -> Result<u32, DetectorError> {
        if frame.data.len() < PNG_MAGIC.len() || frame.data[..PNG_MAGIC.len()] != PNG_MAGIC {
            return Err(DetectorError::InvalidFrame);
        }
        Ok(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_frame_is_valid_png() {
        let source = SyntheticFrameSource::new();
        let frame = source.capture().await.expect("capture failed");

        assert_eq!(&frame.data[..8], &PNG_MAGIC);
        assert_eq!(frame.width, DEFAULT_WIDTH);
        assert_eq!(frame.height, DEFAULT_HEIGHT);
    }

    #[tokio::test]
    async fn test_synthetic_frame_honors_dimensions() {
        let source = SyntheticFrameSource::with_dimensions(32, 18);
        let frame = source.capture().await.expect("capture failed");

        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 18);
        assert_eq!(&frame.data[..8], &PNG_MAGIC);
    }

    #[tokio::test]
    async fn test_fixed_count_reports_configured_count() {
        let source = SyntheticFrameSource::with_dimensions(16, 16);
        let detector = FixedCountDetector::new(12);

        let frame = source.capture().await.expect("capture failed");
        let count = detector.count_faces(&frame).await.expect("detect failed");

        assert_eq!(count, 12);
    }

    #[tokio::test]
    async fn test_fixed_count_rejects_garbage_frames() {
        let detector = FixedCountDetector::new(5);
        let frame = CapturedFrame {
            data: vec![0u8; 16],
            width: 4,
            height: 1,
        };

        let result = detector.count_faces(&frame).await;
        assert!(matches!(result, Err(DetectorError::InvalidFrame)));
    }

    #[test]
    fn test_default_source_matches_new() {
        let source = SyntheticFrameSource::default();
        assert_eq!(source.width, DEFAULT_WIDTH);
        assert_eq!(source.height, DEFAULT_HEIGHT);
    }
}
