// crates/playdeck-engine/src/transition/wipe.rs
//
// Wipe: a vertical reveal sweeps across the frame. Neither input moves;
// pixels switch from source to destination as the edge passes, with an
// optional colored border straddling the edge.
//
// FromLeft at progress δ the edge sits at column c = δ·(w + border);
// the border occupies the `border` columns centered on c (clipped to the
// frame), destination pixels lie left of it, source pixels right of it.

use crate::transition::Direction;

pub fn render(
    source: &[u8],
    dest: &[u8],
    width: usize,
    height: usize,
    delta: f64,
    direction: Direction,
    border_width: usize,
    border_color: [u8; 4],
) -> Vec<u8> {
    debug_assert_eq!(source.len(), width * height * 4);
    debug_assert_eq!(dest.len(), source.len());

    // Edge position over the widened travel so the border fully clears the
    // frame at δ = 1.
    let c = delta * (width + border_width) as f64;
    let border_start = (c - border_width as f64 / 2.0).round() as i64;
    let border_end = border_start + border_width as i64;

    let row_bytes = width * 4;
    let mut out = vec![0u8; source.len()];

    for y in 0..height {
        let row = y * row_bytes;
        for x in 0..width {
            // Mirror the classification for right-to-left travel.
            let e = match direction {
                Direction::FromLeft => x as i64,
                Direction::FromRight => (width - 1 - x) as i64,
            };
            let px = row + x * 4;
            let out_px = &mut out[px..px + 4];
            if e < border_start {
                out_px.copy_from_slice(&dest[px..px + 4]);
            } else if e < border_end {
                out_px.copy_from_slice(&border_color);
            } else {
                out_px.copy_from_slice(&source[px..px + 4]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::test_support::{column_value, solid_frame};

    const W: usize = 16;
    const H: usize = 2;
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    #[test]
    fn no_border_endpoints() {
        let s = solid_frame(W, H, [200, 0, 0, 255]);
        let d = solid_frame(W, H, [50, 0, 0, 255]);
        assert_eq!(render(&s, &d, W, H, 0.0, Direction::FromLeft, 0, GREEN), s);
        assert_eq!(render(&s, &d, W, H, 1.0, Direction::FromLeft, 0, GREEN), d);
    }

    #[test]
    fn border_straddles_the_edge() {
        let s = solid_frame(W, H, [200, 200, 200, 255]);
        let d = solid_frame(W, H, [50, 50, 50, 255]);
        // δ = 0.5, border 4 → edge at (16+4)/2 = 10, border cols 8..12.
        let out = render(&s, &d, W, H, 0.5, Direction::FromLeft, 4, GREEN);

        assert_eq!(column_value(&out, W, 7), 50, "left of border is dest");
        for x in 8..12 {
            assert_eq!(&out[x * 4..x * 4 + 4], &GREEN, "column {x} is border");
        }
        assert_eq!(column_value(&out, W, 12), 200, "right of border is source");
    }

    #[test]
    fn from_right_reveals_right_first() {
        let s = solid_frame(W, H, [200, 0, 0, 255]);
        let d = solid_frame(W, H, [50, 0, 0, 255]);
        let out = render(&s, &d, W, H, 0.25, Direction::FromRight, 0, GREEN);

        // c = 4: the rightmost 4 columns are revealed dest.
        assert_eq!(column_value(&out, W, W - 1), 50);
        assert_eq!(column_value(&out, W, W - 4), 50);
        assert_eq!(column_value(&out, W, W - 5), 200);
        assert_eq!(column_value(&out, W, 0), 200);
    }
}
