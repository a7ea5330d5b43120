use std::sync::Arc;
use std::time::Duration;

use ndarray::ArrayView3;

/// A single captured frame: contiguous interleaved bytes in row-major order.
///
/// Pixel storage is shared, so cloning a frame to hand it to another thread
/// never copies pixels and nobody can mutate it after capture.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    timestamp: Duration,
}

impl Frame {
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        channels: u8,
        index: usize,
    ) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            channels,
            index,
            timestamp: Duration::ZERO,
        }
    }

    /// Sets the capture timestamp (offset from the start of the stream).
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// True when the frame has non-zero dimensions and a buffer that matches them.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.channels > 0
            && self.data.len() == self.expected_len()
    }

    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, ndarray::ShapeError> {
        ArrayView3::from_shape(self.shape(), &self.data)
    }

    fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5).with_timestamp(Duration::from_millis(40));
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.timestamp(), Duration::from_millis(40));
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_default_timestamp_is_zero() {
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, 0);
        assert_eq!(frame.timestamp(), Duration::ZERO);
    }

    #[test]
    fn test_clone_shares_pixels() {
        let frame = Frame::new(vec![100u8; 12], 2, 2, 3, 0);
        let cloned = frame.clone();
        assert!(std::ptr::eq(frame.data().as_ptr(), cloned.data().as_ptr()));
    }

    #[rstest]
    #[case::valid(vec![0u8; 12], 2, 2, 3, true)]
    #[case::zero_width(vec![], 0, 2, 3, false)]
    #[case::zero_height(vec![], 2, 0, 3, false)]
    #[case::zero_channels(vec![], 2, 2, 0, false)]
    #[case::short_buffer(vec![0u8; 10], 2, 2, 3, false)]
    #[case::long_buffer(vec![0u8; 13], 2, 2, 3, false)]
    fn test_is_well_formed(
        #[case] data: Vec<u8>,
        #[case] width: u32,
        #[case] height: u32,
        #[case] channels: u8,
        #[case] expected: bool,
    ) {
        let frame = Frame::new(data, width, height, channels, 0);
        assert_eq!(frame.is_well_formed(), expected);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 3, 0); // 2x4x3
        let arr = frame.as_ndarray().unwrap();
        assert_eq!(arr.shape(), &[2, 4, 3]); // (height, width, channels)
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        // 2x2 RGB: set pixel (row=1, col=0) to red
        let mut data = vec![0u8; 12];
        data[6] = 255;
        let frame = Frame::new(data, 2, 2, 3, 0);
        let arr = frame.as_ndarray().unwrap();
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
        assert_eq!(arr[[1, 0, 2]], 0);
    }

    #[test]
    fn test_as_ndarray_rejects_malformed() {
        let frame = Frame::new(vec![0u8; 10], 2, 2, 3, 0);
        assert!(frame.as_ndarray().is_err());
    }
}
