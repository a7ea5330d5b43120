use std::path::{Path, PathBuf};

use crate::capture::domain::display_surface::DisplaySurface;
use crate::overlay::annotation_slot::AnnotationSlot;
use crate::overlay::frame_annotator::{annotate, DEFAULT_THICKNESS};
use crate::shared::frame::Frame;

/// Display surface that writes every presented frame, with its annotations
/// drawn in, as `frame_NNNNNN.png` into an output directory.
pub struct AnnotatedImageSurface {
    output_dir: PathBuf,
    thickness: u32,
    written: usize,
}

impl AnnotatedImageSurface {
    pub fn new(output_dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            thickness: DEFAULT_THICKNESS,
            written: 0,
        })
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path_for(&self, frame_index: usize) -> PathBuf {
        self.output_dir.join(format!("frame_{frame_index:06}.png"))
    }
}

impl DisplaySurface for AnnotatedImageSurface {
    fn present(
        &mut self,
        frame: &Frame,
        annotations: &[AnnotationSlot],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let annotated = annotate(frame, annotations, self.thickness);
        let (w, h) = (annotated.width(), annotated.height());
        let data = annotated.data().to_vec();
        let path = self.path_for(frame.index());

        match annotated.channels() {
            3 => image::RgbImage::from_raw(w, h, data)
                .ok_or("Frame buffer does not match its dimensions")?
                .save(&path)?,
            4 => image::RgbaImage::from_raw(w, h, data)
                .ok_or("Frame buffer does not match its dimensions")?
                .save(&path)?,
            1 => image::GrayImage::from_raw(w, h, data)
                .ok_or("Frame buffer does not match its dimensions")?
                .save(&path)?,
            c => return Err(format!("Cannot save a {c}-channel frame").into()),
        }
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::identity_match::{IdentityMatch, ResultBatch};
    use crate::overlay::overlay_manager::OverlayManager;
    use crate::shared::region::DetectionRegion;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_writes_annotated_png() {
        let dir = TempDir::new().unwrap();
        let mut surface = AnnotatedImageSurface::new(&dir.path().join("out")).unwrap();
        let mut overlay = OverlayManager::new(2);
        overlay.apply_results(&ResultBatch::new(
            0,
            Duration::ZERO,
            vec![IdentityMatch::unknown(DetectionRegion::new(0, 0, 4, 4))],
        ));
        let frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 7);

        surface.present(&frame, overlay.slots()).unwrap();

        let path = surface.path_for(7);
        assert!(path.ends_with("frame_000007.png"));
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(8, 1).0, [0, 0, 0]);
        assert_eq!(surface.written(), 1);
    }

    #[test]
    fn test_thickness_applies_to_outline() {
        let dir = TempDir::new().unwrap();
        let mut surface = AnnotatedImageSurface::new(dir.path())
            .unwrap()
            .with_thickness(3);
        let mut overlay = OverlayManager::new(1);
        overlay.apply_results(&ResultBatch::new(
            0,
            Duration::ZERO,
            vec![IdentityMatch::unknown(DetectionRegion::new(0, 0, 10, 10))],
        ));
        let frame = Frame::new(vec![0u8; 30 * 30 * 3], 30, 30, 3, 0);

        surface.present(&frame, overlay.slots()).unwrap();

        let img = image::open(surface.path_for(0)).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(2, 5).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(3, 5).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(7, 5).0, [255, 0, 0]);
    }

    #[test]
    fn test_malformed_frame_is_error() {
        let dir = TempDir::new().unwrap();
        let mut surface = AnnotatedImageSurface::new(dir.path()).unwrap();
        let frame = Frame::new(vec![0u8; 5], 10, 10, 3, 0);
        assert!(surface.present(&frame, &[]).is_err());
        assert_eq!(surface.written(), 0);
    }
}
