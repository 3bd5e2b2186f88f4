//! SIMD objectness screen using the `wide` crate.
//!
//! Most cells of a feature map are background. The screen compares eight raw
//! objectness values at a time against the decoder's score cut and only
//! reports columns that may pass, so the full per-cell decode runs on a small
//! fraction of the grid.

use wide::{f32x8, CmpGt};

const LANES: usize = 8;

/// Slack below the cut so rounding in `sigmoid(logit(p))` never hides a cell.
const SCREEN_MARGIN: f32 = 1e-3;

#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Pushes the column of every value in `row` above `cut - SCREEN_MARGIN`.
pub(crate) fn screen_row(row: &[f32], cut: f32, hits: &mut Vec<usize>) {
    let cut = cut - SCREEN_MARGIN;
    let cut_v = f32x8::splat(cut);
    let simd_end = row.len() / LANES * LANES;

    for base in (0..simd_end).step_by(LANES) {
        let mask = load_f32x8(&row[base..base + LANES]).cmp_gt(cut_v).move_mask();
        if mask == 0 {
            continue;
        }
        for lane in 0..LANES {
            if (mask >> lane) & 1 != 0 {
                hits.push(base + lane);
            }
        }
    }

    for (col, &value) in row.iter().enumerate().skip(simd_end) {
        if value > cut {
            hits.push(col);
        }
    }
}
