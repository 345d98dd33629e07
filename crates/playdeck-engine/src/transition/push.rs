// crates/playdeck-engine/src/transition/push.rs
//
// Push: the destination slides in while the source slides out the same way,
// as if both were on one filmstrip. Every output pixel is copied verbatim
// from exactly one input — no blending.
//
// FromLeft at progress δ, boundary b = round(δ·w):
//   screen x <  b → dest,   source column x + (w−b)   (its trailing columns)
//   screen x >= b → source, source column x − b        (pushed right)
// FromRight is the same with the screen mirrored.

use crate::transition::Direction;

pub fn render(
    source: &[u8],
    dest: &[u8],
    width: usize,
    height: usize,
    delta: f64,
    direction: Direction,
) -> Vec<u8> {
    debug_assert_eq!(source.len(), width * height * 4);
    debug_assert_eq!(dest.len(), source.len());

    let b = ((delta * width as f64).round() as usize).min(width);
    let row_bytes = width * 4;
    let mut out = vec![0u8; source.len()];

    for y in 0..height {
        let row = y * row_bytes;
        let src_row = &source[row..row + row_bytes];
        let dst_row = &dest[row..row + row_bytes];
        let out_row = &mut out[row..row + row_bytes];

        match direction {
            Direction::FromLeft => {
                // Dest occupies [0, b), source the rest, both shifted right.
                out_row[..b * 4].copy_from_slice(&dst_row[(width - b) * 4..]);
                out_row[b * 4..].copy_from_slice(&src_row[..(width - b) * 4]);
            }
            Direction::FromRight => {
                // Source shifted left, dest enters at the right edge.
                out_row[..(width - b) * 4].copy_from_slice(&src_row[b * 4..]);
                out_row[(width - b) * 4..].copy_from_slice(&dst_row[..b * 4]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::test_support::{column_value, gradient_frame, solid_frame};

    const W: usize = 8;
    const H: usize = 2;

    #[test]
    fn delta_zero_is_all_source() {
        let s = solid_frame(W, H, [200, 0, 0, 255]);
        let d = solid_frame(W, H, [50, 0, 0, 255]);
        let out = render(&s, &d, W, H, 0.0, Direction::FromLeft);
        assert_eq!(out, s);
    }

    #[test]
    fn delta_one_is_all_dest() {
        let s = solid_frame(W, H, [200, 0, 0, 255]);
        let d = solid_frame(W, H, [50, 0, 0, 255]);
        for dir in [Direction::FromLeft, Direction::FromRight] {
            let out = render(&s, &d, W, H, 1.0, dir);
            assert_eq!(out, d, "{dir:?}");
        }
    }

    #[test]
    fn from_left_samples_correct_columns() {
        // Source columns valued 0..8, dest columns valued 100..108.
        let s = gradient_frame(W, H, 0);
        let d = gradient_frame(W, H, 100);
        let out = render(&s, &d, W, H, 0.5, Direction::FromLeft);

        // b = 4: screen cols 0..4 show dest cols 4..8, cols 4..8 show
        // source cols 0..4.
        assert_eq!(column_value(&out, W, 0), 104);
        assert_eq!(column_value(&out, W, 3), 107);
        assert_eq!(column_value(&out, W, 4), 0);
        assert_eq!(column_value(&out, W, 7), 3);
    }

    #[test]
    fn from_right_mirrors_from_left() {
        let s = solid_frame(W, H, [10, 10, 10, 255]);
        let d = solid_frame(W, H, [90, 90, 90, 255]);
        let left = render(&s, &d, W, H, 0.25, Direction::FromLeft);
        let right = render(&s, &d, W, H, 0.25, Direction::FromRight);
        // Region boundaries reflect across the vertical axis.
        for x in 0..W {
            assert_eq!(
                column_value(&left, W, x),
                column_value(&right, W, W - 1 - x),
                "column {x}"
            );
        }
    }
}
