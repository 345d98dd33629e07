// crates/playdeck-engine/src/transition/slide.rs
//
// Slide: the destination slides in over a stationary source. Unlike push,
// the source never moves — it is progressively covered.
//
// FromLeft at progress δ, boundary b = round(δ·w):
//   screen x <  b → dest, source column x + (w−b)
//   screen x >= b → source, column x (unmoved)

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
    let mut out = source.to_vec();

    for y in 0..height {
        let row = y * row_bytes;
        let dst_row = &dest[row..row + row_bytes];
        let out_row = &mut out[row..row + row_bytes];

        match direction {
            Direction::FromLeft => {
                out_row[..b * 4].copy_from_slice(&dst_row[(width - b) * 4..]);
            }
            Direction::FromRight => {
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
    fn endpoints() {
        let s = solid_frame(W, H, [200, 0, 0, 255]);
        let d = solid_frame(W, H, [50, 0, 0, 255]);
        assert_eq!(render(&s, &d, W, H, 0.0, Direction::FromLeft), s);
        assert_eq!(render(&s, &d, W, H, 1.0, Direction::FromLeft), d);
    }

    #[test]
    fn source_stays_stationary() {
        let s = gradient_frame(W, H, 0);
        let d = gradient_frame(W, H, 100);
        let out = render(&s, &d, W, H, 0.5, Direction::FromLeft);

        // Covered region shows the dest's trailing columns; the uncovered
        // source keeps its own column values (not shifted).
        assert_eq!(column_value(&out, W, 0), 104);
        assert_eq!(column_value(&out, W, 4), 4);
        assert_eq!(column_value(&out, W, 7), 7);
    }

    #[test]
    fn from_right_covers_right_edge_first() {
        let s = gradient_frame(W, H, 0);
        let d = gradient_frame(W, H, 100);
        let out = render(&s, &d, W, H, 0.25, Direction::FromRight);

        // b = 2: screen cols 6,7 show dest cols 0,1; the rest is source.
        assert_eq!(column_value(&out, W, 5), 5);
        assert_eq!(column_value(&out, W, 6), 100);
        assert_eq!(column_value(&out, W, 7), 101);
    }
}
