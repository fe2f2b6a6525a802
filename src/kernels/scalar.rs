//! Portable scalar reductions.
//!
//! Reference implementations for every wide loop, also used for the tail
//! elements the wide loops leave behind.

use super::{Dot3, Element};

/// Scalar `(a·b, a·a, b·b)`.
#[inline]
pub fn dot3<T: Element>(a: &[T], b: &[T]) -> Dot3 {
    debug_assert_eq!(a.len(), b.len());
    let mut acc = Dot3::default();
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = x.to_f64();
        let y = y.to_f64();
        acc.ab += x * y;
        acc.aa += x * x;
        acc.bb += y * y;
    }
    acc
}

/// Scalar `Σ (a_i - b_i)²`.
#[inline]
pub fn sqdiff<T: Element>(a: &[T], b: &[T]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).fold(0.0f64, |acc, (&x, &y)| {
        let d = x.to_f64() - y.to_f64();
        acc + d * d
    })
}

/// Scalar `Σ a_i`.
#[inline]
pub fn sum<T: Element>(a: &[T]) -> f64 {
    a.iter().map(|x| x.to_f64()).sum()
}

/// Count of set bits in `a ^ b`, eight bytes at a time.
pub fn popcount_xor(a: &[u8], b: &[u8]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    let mut total = 0u64;
    let mut a_words = a.chunks_exact(8);
    let mut b_words = b.chunks_exact(8);
    for (x, y) in (&mut a_words).zip(&mut b_words) {
        total += (load_u64(x) ^ load_u64(y)).count_ones() as u64;
    }
    for (x, y) in a_words.remainder().iter().zip(b_words.remainder()) {
        total += (x ^ y).count_ones() as u64;
    }
    total
}

/// `(popcount(a & b), popcount(a | b))`, eight bytes at a time.
pub fn popcount_and_or(a: &[u8], b: &[u8]) -> (u64, u64) {
    debug_assert_eq!(a.len(), b.len());
    let mut inter = 0u64;
    let mut union = 0u64;
    let mut a_words = a.chunks_exact(8);
    let mut b_words = b.chunks_exact(8);
    for (x, y) in (&mut a_words).zip(&mut b_words) {
        let (x, y) = (load_u64(x), load_u64(y));
        inter += (x & y).count_ones() as u64;
        union += (x | y).count_ones() as u64;
    }
    for (x, y) in a_words.remainder().iter().zip(b_words.remainder()) {
        inter += (x & y).count_ones() as u64;
        union += (x | y).count_ones() as u64;
    }
    (inter, union)
}

#[inline(always)]
fn load_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    u64::from_le_bytes(word)
}
