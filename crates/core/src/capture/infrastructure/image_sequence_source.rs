use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::capture::domain::frame_source::{FrameSource, SourceMetadata};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

pub const DEFAULT_FPS: f64 = 30.0;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },
    #[error("no images found in {}", path.display())]
    Empty { path: PathBuf },
    #[error("failed to list {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("frame rate must be positive, got {0}")]
    InvalidFps(f64),
    #[error("image sequence source has not been opened")]
    NotOpened,
}

/// Plays a still image, or a directory of images sorted by file name, as a
/// video stream at a fixed frame rate.
///
/// Images are decoded lazily as the iterator advances and converted to RGB.
/// Frame `i` is stamped `i / fps` seconds after the start.
pub struct ImageSequenceSource {
    fps: f64,
    paths: Option<Vec<PathBuf>>,
}

impl ImageSequenceSource {
    pub fn new(fps: f64) -> Self {
        Self { fps, paths: None }
    }
}

impl Default for ImageSequenceSource {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(SourceError::InvalidFps(self.fps).into());
        }
        if !path.exists() {
            return Err(SourceError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let paths = if path.is_dir() {
            list_images(path)?
        } else {
            vec![path.to_path_buf()]
        };
        let first = paths.first().ok_or_else(|| SourceError::Empty {
            path: path.to_path_buf(),
        })?;
        let (width, height) = image::image_dimensions(first)?;

        log::info!(
            "Opened {} image(s) from {} at {} fps",
            paths.len(),
            path.display(),
            self.fps
        );

        let metadata = SourceMetadata {
            width,
            height,
            fps: self.fps,
            total_frames: paths.len(),
            source_path: Some(path.to_path_buf()),
        };
        self.paths = Some(paths);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(paths) = self.paths.as_ref() else {
            return Box::new(std::iter::once(Err(SourceError::NotOpened.into())));
        };
        let fps = self.fps;
        Box::new(
            paths
                .iter()
                .enumerate()
                .map(move |(index, path)| load_frame(path, index, fps)),
        )
    }

    fn close(&mut self) {
        self.paths = None;
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let read_dir_error = |source: std::io::Error| SourceError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_frame(path: &Path, index: usize, fps: f64) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, index)
        .with_timestamp(Duration::from_secs_f64(index as f64 / fps)))
}
