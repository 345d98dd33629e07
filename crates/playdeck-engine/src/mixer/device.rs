// crates/playdeck-engine/src/mixer/device.rs
//
// Buffer objects for the compositor.
//
// The pipeline in mod.rs is written against upload-buffer / render-target
// semantics: map a transfer buffer and fill it from a frame plane, draw it
// onto a target with standard over blending, then read the target back one
// job later. This module is the software device with those semantics; the
// pipeline never touches pixels directly, so a hardware device with real
// asynchronous transfers can replace it without changing the job order.
//
// Blend rule per channel: out = src·α + dst·(1−α), α = source alpha. The
// same factors apply to the alpha channel itself.

use rayon::prelude::*;

/// Pixel-upload buffer (PBO analog): pinned staging memory a frame plane is
/// copied into before the draw.
pub struct TransferBuffer {
    data: Vec<u8>,
}

impl TransferBuffer {
    pub fn new(size: usize) -> Self {
        Self { data: vec![0u8; size] }
    }

    /// Map and fill from CPU memory. `src` must match the buffer size.
    pub fn write(&mut self, src: &[u8]) {
        debug_assert_eq!(src.len(), self.data.len());
        self.data.copy_from_slice(src);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Framebuffer (FBO analog): the composition target with a pack buffer for
/// readback.
pub struct RenderTarget {
    data: Vec<u8>,
    row_bytes: usize,
}

impl RenderTarget {
    pub fn new(width: usize, height: usize) -> Self {
        Self { data: vec![0u8; width * height * 4], row_bytes: width * 4 }
    }

    /// Clear to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Draw a fullscreen textured quad from `src` with over blending.
    /// Draw order is composition order: lowest z first.
    pub fn draw_blended(&mut self, src: &TransferBuffer) {
        let row = self.row_bytes;
        self.data
            .par_chunks_mut(row)
            .zip(src.data.par_chunks(row))
            .for_each(|(dst_row, src_row)| {
                for (dst_px, src_px) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                    let a = src_px[3] as u32;
                    if a == 255 {
                        dst_px.copy_from_slice(src_px);
                    } else if a != 0 {
                        let na = 255 - a;
                        for c in 0..4 {
                            let blended =
                                src_px[c] as u32 * a + dst_px[c] as u32 * na;
                            dst_px[c] = ((blended + 127) / 255) as u8;
                        }
                    }
                }
            });
    }

    /// Complete the asynchronous pack read into `dst`. On this device the
    /// transfer is immediate; the pipeline still defers the call one job to
    /// preserve hardware overlap semantics.
    pub fn read_into(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.data);
    }
}
