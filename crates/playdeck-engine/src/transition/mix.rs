// crates/playdeck-engine/src/transition/mix.rs
//
// Linear dissolve between the outgoing and incoming frames.
//
// Runs in gamma-encoded byte space over all four BGRA channels — blending
// the alpha channel too is what lets a mix over an empty (transparent)
// source read as a fade-in from black once composited.

use rayon::prelude::*;

/// Blend two gamma-encoded bytes; `delta = 0` → `source`, `1` → `dest`.
#[inline]
pub fn blend_byte(source: u8, dest: u8, delta: f64) -> u8 {
    ((1.0 - delta) * source as f64 + delta * dest as f64).round() as u8
}

/// `result = source·(1−δ) + dest·δ` over every byte of the plane.
pub fn render(source: &[u8], dest: &[u8], delta: f64) -> Vec<u8> {
    debug_assert_eq!(source.len(), dest.len());

    let mut out = vec![0u8; source.len()];
    out.par_chunks_mut(16 * 1024)
        .zip(source.par_chunks(16 * 1024).zip(dest.par_chunks(16 * 1024)))
        .for_each(|(o, (s, d))| {
            for ((o, &s), &d) in o.iter_mut().zip(s).zip(d) {
                *o = blend_byte(s, d, delta);
            }
        });
    out
}
