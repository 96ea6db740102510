//! Proof-of-work targets.
//!
//! A target is a 32-byte big-endian number. A header hash satisfies it when the
//! hash, read as a big-endian number, is strictly below the target.

use crate::hash::Hash256;

/// Target whose "difficulty 1" reference value the difficulty ratio is measured
/// against: `0x00000000ffff0000...`.
pub const REFERENCE_TARGET_BITS: u32 = 0x1d00ffff;

/// Largest target: every hash except `ff..ff` satisfies it.
pub const MAX_TARGET: Hash256 = [0xff; 32];

/// Check if a hash satisfies a target (`hash < target`, big-endian).
#[inline]
pub fn hash_meets_target(hash: &Hash256, target: &Hash256) -> bool {
    // lexicographic order of equal-length arrays is big-endian numeric order
    hash < target
}

/// Count leading zero bits of a hash, most significant byte first.
pub fn leading_zero_bits(hash: &Hash256) -> u32 {
    let mut zeros = 0u32;
    for byte in hash {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros
}

/// A target met exactly by hashes with at least `zero_bits` leading zero bits.
///
/// The target is `2^(256 - zero_bits)`, so `target_with_leading_zero_bits(16)`
/// accepts the hashes starting with two zero bytes. Zero bits gives
/// [`MAX_TARGET`]; values above 256 are clamped to 256.
pub fn target_with_leading_zero_bits(zero_bits: u32) -> Hash256 {
    if zero_bits == 0 {
        return MAX_TARGET;
    }

    let power = 256 - zero_bits.min(256);
    let mut target = [0u8; 32];
    target[31 - (power / 8) as usize] = 1 << (power % 8);
    target
}

/// Expand a compact "bits" value into a 32-byte target.
///
/// `target = mantissa * 256^(exponent - 3)`; a set sign bit or zero exponent
/// yields the all-zero target. Mantissa bytes shifted past the 32-byte width
/// are dropped.
pub fn bits_to_target(bits: u32) -> Hash256 {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007f_ffff;
    let mut target = [0u8; 32];

    if bits & 0x0080_0000 != 0 || exponent == 0 {
        return target;
    }

    let mantissa_bytes = [(mantissa >> 16) as u8, (mantissa >> 8) as u8, mantissa as u8];

    // most significant mantissa byte lands at index 32 - exponent
    for (offset, byte) in mantissa_bytes.iter().enumerate() {
        let pos = 32 + offset;
        if pos < exponent {
            continue;
        }
        let index = pos - exponent;
        if index < 32 {
            target[index] = *byte;
        }
    }

    target
}

/// Compress a 32-byte target into compact "bits" form (lossy).
pub fn target_to_bits(target: &Hash256) -> u32 {
    let first_nonzero = match target.iter().position(|&b| b != 0) {
        Some(pos) => pos,
        None => return 0,
    };

    let mut exponent = (32 - first_nonzero) as u32;
    let mut mantissa = target[first_nonzero..]
        .iter()
        .chain(core::iter::repeat(&0u8))
        .take(3)
        .fold(0u32, |acc, &b| (acc << 8) | b as u32);

    // keep the sign bit clear
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        exponent += 1;
    }

    (exponent << 24) | mantissa
}

/// Difficulty of a target relative to [`REFERENCE_TARGET_BITS`].
pub fn target_difficulty(target: &Hash256) -> f64 {
    let current = target_to_f64(target);
    if current == 0.0 {
        return f64::INFINITY;
    }
    target_to_f64(&bits_to_target(REFERENCE_TARGET_BITS)) / current
}

/// Average number of hashes needed to satisfy `target`.
pub fn expected_hashes(target: &Hash256) -> f64 {
    let current = target_to_f64(target);
    if current == 0.0 {
        return f64::INFINITY;
    }
    2f64.powi(256) / (current + 1.0)
}

fn target_to_f64(target: &Hash256) -> f64 {
    target.iter().fold(0.0, |acc, &b| acc * 256.0 + b as f64)
}

/// Format difficulty for display (e.g. "1.23T").
pub fn format_difficulty(difficulty: f64) -> String {
    const UNITS: [(f64, &str); 5] = [(1e15, "P"), (1e12, "T"), (1e9, "G"), (1e6, "M"), (1e3, "K")];

    UNITS
        .iter()
        .find(|(scale, _)| difficulty >= *scale)
        .map(|(scale, unit)| format!("{:.2}{}", difficulty / scale, unit))
        .unwrap_or_else(|| format!("{:.2}", difficulty))
}
