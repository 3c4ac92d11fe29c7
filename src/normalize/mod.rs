//! Per-component sample normalization and the bilevel pack step.
//!
//! Each raw sample is right-shifted by the fraction bit count (arithmetic
//! shift, sign preserving), offset by the level shift and clamped to the
//! component's range. All intermediate arithmetic is 64-bit so 32-bit
//! unsigned components cannot overflow.

/// Normalization parameters of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleNormalizer {
    fraction_bits: u32,
    level_shift: i64,
    min: i64,
    max: i64,
}

impl SampleNormalizer {
    /// Create a normalizer.
    pub fn new(fraction_bits: u32, level_shift: i64, min: i64, max: i64) -> Self {
        Self {
            fraction_bits,
            level_shift,
            min,
            max,
        }
    }

    /// Same shift, range forced to `{0, 1}`.
    pub fn bilevel(self) -> Self {
        Self {
            min: 0,
            max: 1,
            ..self
        }
    }

    /// Lowest value produced.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Highest value produced.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Normalize one raw sample.
    #[inline]
    pub fn sample(&self, raw: i32) -> i32 {
        let shifted = (raw as i64) >> self.fraction_bits.min(63);
        (shifted + self.level_shift).clamp(self.min, self.max) as i32
    }

    /// Normalize a contiguous row.
    pub fn normalize(&self, raw: &[i32], out: &mut [i32]) {
        for (dst, &v) in out.iter_mut().zip(raw) {
            *dst = self.sample(v);
        }
    }

    /// Normalize every `step`-th sample of `raw` starting at `first`,
    /// filling `out` completely.
    pub fn normalize_strided(&self, raw: &[i32], first: usize, step: usize, out: &mut [i32]) {
        let picked = raw.iter().skip(first).step_by(step.max(1));
        for (dst, &v) in out.iter_mut().zip(picked) {
            *dst = self.sample(v);
        }
    }

    /// Strided normalization into a one-byte-per-pixel buffer, for ranges
    /// that fit a byte (the bilevel path).
    pub fn normalize_bytes_strided(&self, raw: &[i32], first: usize, step: usize, out: &mut [u8]) {
        let picked = raw.iter().skip(first).step_by(step.max(1));
        for (dst, &v) in out.iter_mut().zip(picked) {
            *dst = self.sample(v) as u8;
        }
    }
}

/// Pack one-byte-per-pixel bilevel values into an MSB-first bit row.
///
/// Pixel `i` of `pixels` lands at bit position `bit_offset + i` of `row`,
/// bit 7 of a byte being its leftmost pixel. Any non-zero byte sets the bit.
/// Bits outside the written range are preserved.
pub fn pack_bilevel_row(pixels: &[u8], row: &mut [u8], bit_offset: usize) {
    for (i, &p) in pixels.iter().enumerate() {
        let bit = bit_offset + i;
        let mask = 0x80u8 >> (bit & 7);
        if p != 0 {
            row[bit >> 3] |= mask;
        } else {
            row[bit >> 3] &= !mask;
        }
    }
}
