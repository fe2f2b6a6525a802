//! Binary kernels: Hamming distance and Jaccard index over packed bitsets.
//!
//! Bit `i` of a bitset lives in byte `i / 8` at position `i % 8` (LSB-first).
//! A bitset of `bits` logical bits occupies exactly `ceil(bits / 8)` bytes;
//! unused high bits of the final byte are ignored.

use super::{popcount_and_or, popcount_xor, ElementType};
use crate::dispatch::{self, Resolved};
use crate::error::KernelError;

/// Split `bits` into whole bytes and the mask for a trailing partial byte.
fn layout(a: &[u8], b: &[u8], bits: usize) -> Result<(usize, Option<u8>), KernelError> {
    let bytes = bits.div_ceil(8);
    if a.len() != b.len() {
        return Err(KernelError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.len() != bytes {
        return Err(KernelError::LengthMismatch {
            left: a.len(),
            right: bytes,
        });
    }

    let rem = bits % 8;
    if rem == 0 {
        Ok((bytes, None))
    } else {
        Ok((bytes - 1, Some((1u8 << rem) - 1)))
    }
}

/// Number of differing bits between two byte-aligned bitsets.
pub fn hamming(a: &[u8], b: &[u8]) -> Result<u64, KernelError> {
    hamming_bits(a, b, a.len() * 8)
}

/// Number of differing bits among the first `bits` bits.
pub fn hamming_bits(a: &[u8], b: &[u8], bits: usize) -> Result<u64, KernelError> {
    hamming_with(dispatch::select(ElementType::U8, a.len()), a, b, bits)
}

/// [`hamming_bits`] on an explicit backend.
pub fn hamming_with(path: Resolved, a: &[u8], b: &[u8], bits: usize) -> Result<u64, KernelError> {
    let (full, tail_mask) = layout(a, b, bits)?;
    let mut count = popcount_xor(path, &a[..full], &b[..full]);
    if let Some(mask) = tail_mask {
        count += ((a[full] ^ b[full]) & mask).count_ones() as u64;
    }
    Ok(count)
}

/// Jaccard index `|A ∩ B| / |A ∪ B|` of two byte-aligned bitsets.
pub fn jaccard(a: &[u8], b: &[u8]) -> Result<f64, KernelError> {
    jaccard_bits(a, b, a.len() * 8)
}

/// Jaccard index over the first `bits` bits. Two empty sets give `1.0`.
pub fn jaccard_bits(a: &[u8], b: &[u8], bits: usize) -> Result<f64, KernelError> {
    jaccard_with(dispatch::select(ElementType::U8, a.len()), a, b, bits)
}

/// [`jaccard_bits`] on an explicit backend.
pub fn jaccard_with(path: Resolved, a: &[u8], b: &[u8], bits: usize) -> Result<f64, KernelError> {
    let (full, tail_mask) = layout(a, b, bits)?;
    let (mut inter, mut union) = popcount_and_or(path, &a[..full], &b[..full]);
    if let Some(mask) = tail_mask {
        let (x, y) = (a[full] & mask, b[full] & mask);
        inter += (x & y).count_ones() as u64;
        union += (x | y).count_ones() as u64;
    }

    if union == 0 {
        return Ok(1.0);
    }
    Ok(inter as f64 / union as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn wide() -> Resolved {
        dispatch::resolve(dispatch::capabilities().best_backend())
    }

    fn random_bytes(rng: &mut StdRng, n: usize) -> Vec<u8> {
        (0..n).map(|_| rng.gen()).collect()
    }

    #[test]
    fn test_hamming_known() {
        assert_eq!(hamming(&[0b1010_1010], &[0b0101_0101]).unwrap(), 8);
        assert_eq!(hamming(&[0xff, 0x00], &[0xff, 0x01]).unwrap(), 1);
        assert_eq!(hamming(&[], &[]).unwrap(), 0);
    }

    #[test]
    fn test_hamming_self_and_symmetry() {
        let mut rng = StdRng::seed_from_u64(1);
        for n in [1, 15, 16, 17, 31, 32, 33, 100] {
            let a = random_bytes(&mut rng, n);
            let b = random_bytes(&mut rng, n);
            assert_eq!(hamming(&a, &a).unwrap(), 0);
            assert_eq!(hamming(&a, &b).unwrap(), hamming(&b, &a).unwrap());
        }
    }

    #[test]
    fn test_partial_byte_is_masked() {
        // Only the low 3 bits of the second byte count
        let a = [0x00u8, 0b1111_1000];
        let b = [0x00u8, 0b0000_0001];
        assert_eq!(hamming_bits(&a, &b, 11).unwrap(), 1);
        assert_eq!(hamming_bits(&a, &b, 16).unwrap(), 6);
        assert_eq!(jaccard_bits(&a, &b, 11).unwrap(), 0.0);
    }

    #[test]
    fn test_bit_length_must_match_bytes() {
        assert_eq!(
            hamming_bits(&[0u8; 2], &[0u8; 2], 17),
            Err(KernelError::LengthMismatch { left: 2, right: 3 })
        );
        assert_eq!(
            jaccard(&[0u8; 2], &[0u8; 3]),
            Err(KernelError::LengthMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn test_jaccard_known() {
        // A = {0, 1}, B = {1, 2}
        assert_eq!(jaccard(&[0b011], &[0b110]).unwrap(), 1.0 / 3.0);
        assert_eq!(jaccard(&[0xf0], &[0x0f]).unwrap(), 0.0);
    }

    #[test]
    fn test_jaccard_self_and_empty() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = random_bytes(&mut rng, 40);
        assert_eq!(jaccard(&a, &a).unwrap(), 1.0);
        assert_eq!(jaccard(&[0u8; 4], &[0u8; 4]).unwrap(), 1.0);
        // High bits beyond the logical length do not make the union non-empty
        assert_eq!(jaccard_bits(&[0x80], &[0x00], 7).unwrap(), 1.0);
    }

    #[test]
    fn test_scalar_and_wide_agree() {
        let mut rng = StdRng::seed_from_u64(4);
        for n in (0..=70).chain([255, 256, 1025]) {
            let a = random_bytes(&mut rng, n);
            let b = random_bytes(&mut rng, n);
            let bits = (n * 8).saturating_sub(n % 5);
            let bytes = bits.div_ceil(8);
            let (a, b) = (&a[..bytes], &b[..bytes]);
            assert_eq!(
                hamming_with(Resolved::SCALAR, a, b, bits).unwrap(),
                hamming_with(wide(), a, b, bits).unwrap(),
                "hamming n={}",
                n
            );
            assert_eq!(
                jaccard_with(Resolved::SCALAR, a, b, bits).unwrap(),
                jaccard_with(wide(), a, b, bits).unwrap(),
                "jaccard n={}",
                n
            );
        }
    }
}
