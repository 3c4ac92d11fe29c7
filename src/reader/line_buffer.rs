//! Reusable scanline scratch space.

/// Scratch buffers for one raw row and its normalized output.
///
/// Buffers only ever grow. Each call hands out slices of exactly the
/// requested length; their previous contents are unspecified and callers
/// overwrite them completely.
#[derive(Debug, Default)]
pub struct LineBuffer {
    raw: Vec<i32>,
    samples: Vec<i32>,
    bytes: Vec<u8>,
}

fn grow<T: Copy + Default>(buf: &mut Vec<T>, len: usize) {
    if buf.len() < len {
        buf.resize(len, T::default());
    }
}

impl LineBuffer {
    /// Create empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Widest raw row served so far.
    pub fn capacity(&self) -> usize {
        self.raw.len()
    }

    /// Raw row of `raw_len` samples plus an output row of `out_len`.
    pub fn rows(&mut self, raw_len: usize, out_len: usize) -> (&mut [i32], &mut [i32]) {
        grow(&mut self.raw, raw_len);
        grow(&mut self.samples, out_len);
        (&mut self.raw[..raw_len], &mut self.samples[..out_len])
    }

    /// Raw row plus a one-byte-per-pixel output row for bilevel data.
    pub fn bilevel_rows(&mut self, raw_len: usize, out_len: usize) -> (&mut [i32], &mut [u8]) {
        grow(&mut self.raw, raw_len);
        grow(&mut self.bytes, out_len);
        (&mut self.raw[..raw_len], &mut self.bytes[..out_len])
    }
}
