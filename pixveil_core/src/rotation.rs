use crate::buffer::{CHANNELS, PixelBuffer};

/// Rolls each pixel's channel values right by `shift`: `out[c] = in[(c - shift) mod 3]`.
pub fn apply(buffer: PixelBuffer, shift: i64) -> PixelBuffer {
    let offset = shift.rem_euclid(CHANNELS as i64) as usize;
    if offset == 0 {
        return buffer;
    }
    let mut data = buffer.as_bytes().to_vec();
    for pixel in data.chunks_exact_mut(CHANNELS) {
        pixel.rotate_right(offset);
    }
    buffer.with_data(data)
}

pub fn invert(buffer: PixelBuffer, shift: i64) -> PixelBuffer {
    // i64::MIN has no negation; its residue modulo 3 is what matters.
    apply(buffer, -(shift % CHANNELS as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rolls_right_like_an_axis_roll() {
        let buffer = PixelBuffer::filled(1, 2, [10, 20, 30]);
        let rotated = apply(buffer, 1);
        assert_eq!(rotated.pixel(0, 0), Some([30, 10, 20]));
        assert_eq!(rotated.pixel(0, 1), Some([30, 10, 20]));
    }

    #[test]
    fn negative_and_wrapping_shifts() {
        let buffer = PixelBuffer::filled(1, 1, [1, 2, 3]);
        assert_eq!(apply(buffer.clone(), -1).pixel(0, 0), Some([2, 3, 1]));
        assert_eq!(apply(buffer.clone(), 3), buffer);
        assert_eq!(apply(buffer.clone(), 5), apply(buffer, 2));
    }

    proptest! {
        #[test]
        fn rotation_inverts_for_any_shift(
            data in prop::collection::vec(any::<u8>(), 2 * 2 * CHANNELS),
            shift in any::<i64>(),
        ) {
            let buffer = PixelBuffer::new(2, 2, data).unwrap();
            prop_assert_eq!(invert(apply(buffer.clone(), shift), shift), buffer);
        }
    }
}
