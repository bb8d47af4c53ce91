use crate::error::TransformError;

/// Number of colour channels per pixel. Buffers are always RGB.
pub const CHANNELS: usize = 3;

/// Owned H × W × 3 byte buffer stored row-major as (row, column, channel).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    height: usize,
    width: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(height: usize, width: usize, data: Vec<u8>) -> Result<Self, TransformError> {
        let expected = height * width * CHANNELS;
        if data.len() != expected {
            return Err(TransformError::ShapeMismatch {
                context: "PixelBuffer",
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    pub fn zeros(height: usize, width: usize) -> Self {
        Self::filled(height, width, [0; CHANNELS])
    }

    /// Buffer where every pixel carries the same triplet.
    pub fn filled(height: usize, width: usize, pixel: [u8; CHANNELS]) -> Self {
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(height * width * CHANNELS)
            .collect();
        Self {
            height,
            width,
            data,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, CHANNELS)
    }

    /// Number of pixels (H × W), the length of a flattened triplet sequence.
    pub fn pixel_count(&self) -> usize {
        self.height * self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; CHANNELS]> {
        let offset = self.offset(row, col)?;
        let mut out = [0u8; CHANNELS];
        out.copy_from_slice(&self.data[offset..offset + CHANNELS]);
        Some(out)
    }

    pub fn set_pixel(&mut self, row: usize, col: usize, value: [u8; CHANNELS]) -> bool {
        match self.offset(row, col) {
            Some(offset) => {
                self.data[offset..offset + CHANNELS].copy_from_slice(&value);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width
    }

    /// Iterates over pixel triplets in flat (row-major) order.
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(CHANNELS)
    }

    /// Rebuilds a buffer of this shape from new sample data.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            height: self.height,
            width: self.width,
            data,
        }
    }

    /// Applies `f` to every sample, producing a new buffer of the same shape.
    pub(crate) fn map_samples(self, mut f: impl FnMut(u8) -> u8) -> Self {
        let Self {
            height,
            width,
            mut data,
        } = self;
        for sample in data.iter_mut() {
            *sample = f(*sample);
        }
        Self {
            height,
            width,
            data,
        }
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        if !self.contains(row, col) {
            return None;
        }
        Some((row * self.width + col) * CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = PixelBuffer::new(2, 2, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            TransformError::ShapeMismatch {
                expected: 12,
                found: 11,
                ..
            }
        ));
    }

    #[test]
    fn pixel_accessors_follow_row_major_layout() {
        let data: Vec<u8> = (0u8..18).collect();
        let mut buffer = PixelBuffer::new(2, 3, data).unwrap();
        assert_eq!(buffer.pixel(0, 0), Some([0, 1, 2]));
        assert_eq!(buffer.pixel(1, 2), Some([15, 16, 17]));
        assert_eq!(buffer.pixel(2, 0), None);
        assert!(buffer.set_pixel(0, 1, [9, 9, 9]));
        assert_eq!(&buffer.as_bytes()[3..6], &[9, 9, 9]);
        assert!(!buffer.set_pixel(0, 3, [1, 1, 1]));
    }

    #[test]
    fn filled_repeats_triplet() {
        let buffer = PixelBuffer::filled(2, 2, [1, 2, 3]);
        assert_eq!(buffer.shape(), (2, 2, 3));
        assert!(buffer.pixels().all(|p| p == [1, 2, 3]));
    }
}
