//! System volume and saturation applied to a finished block.

use bm_ir::{BLOCK_SIZE, MAX_VOLUME_LOG2};

/// Finalized output samples for one block.
pub type OutputBlock = heapless::Vec<i16, BLOCK_SIZE>;

/// Scale an accumulated sample by the system volume and saturate to 16 bits.
///
/// At `MAX_VOLUME` this is an identity followed by a clamp.
#[inline]
pub fn finalize_sample(sample: i32, volume: i32) -> i16 {
    let scaled = (i64::from(sample) * i64::from(volume >> 1)) >> (MAX_VOLUME_LOG2 - 1);
    scaled.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

/// Finalize every sample of `block`. `block` must not exceed `BLOCK_SIZE`.
pub fn finalize_block(block: &[i32], volume: i32) -> OutputBlock {
    debug_assert!(block.len() <= BLOCK_SIZE);
    block.iter().take(BLOCK_SIZE).map(|&s| finalize_sample(s, volume)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_ir::MAX_VOLUME;

    #[test]
    fn full_volume_is_identity_in_range() {
        for s in [-32768, -1, 0, 1, 1234, 32767] {
            assert_eq!(finalize_sample(s, MAX_VOLUME), s as i16);
        }
    }

    #[test]
    fn full_volume_saturates_instead_of_wrapping() {
        assert_eq!(finalize_sample(40_000, MAX_VOLUME), i16::MAX);
        assert_eq!(finalize_sample(-40_000, MAX_VOLUME), i16::MIN);
        assert_eq!(finalize_sample(i32::MAX, MAX_VOLUME), i16::MAX);
        assert_eq!(finalize_sample(i32::MIN, MAX_VOLUME), i16::MIN);
    }

    #[test]
    fn half_volume_halves() {
        assert_eq!(finalize_sample(1000, MAX_VOLUME / 2), 500);
        assert_eq!(finalize_sample(-1000, MAX_VOLUME / 2), -500);
    }

    #[test]
    fn muted_output_is_exact_zero() {
        for s in [i32::MIN, -5, 0, 5, i32::MAX] {
            assert_eq!(finalize_sample(s, 0), 0);
        }
    }

    #[test]
    fn block_keeps_length() {
        let out = finalize_block(&[1, 2, 3, 70_000], MAX_VOLUME);
        assert_eq!(&out[..], &[1, 2, 3, i16::MAX]);
    }
}
