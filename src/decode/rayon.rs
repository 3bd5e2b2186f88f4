//! Rayon-parallel decoding (feature-gated).
//!
//! Work is split into one task per `(scale, anchor, row)`. Tasks share nothing
//! but the [`BoundedOutput`] counter, so under overflow the kept subset depends
//! on scheduling and is not stable between runs.

use crate::config::NetworkConfig;
use crate::decode::{finish, prepare_scans, scan_row, BoundedOutput, BoxDecoder, FeatureMap};
use crate::detection::RawPredictions;
use crate::trace::trace_span;
use crate::util::YoloPostResult;
use rayon::prelude::*;

/// Decodes all scales in parallel.
///
/// Produces the same candidate set as [`crate::decode::decode`] whenever the
/// candidates fit in the configured capacity; only the order differs.
pub fn decode_par<D: BoxDecoder + Sync>(
    maps: &[FeatureMap<'_>],
    cfg: &NetworkConfig,
    decoder: &D,
) -> YoloPostResult<RawPredictions> {
    let _span = trace_span!("decode_par", scales = maps.len()).entered();
    let scans = prepare_scans(maps, cfg, decoder)?;
    let out = BoundedOutput::with_capacity(cfg.max_output_boxes);

    let units: Vec<(usize, usize, usize)> = scans
        .iter()
        .enumerate()
        .flat_map(|(scale, scan)| {
            let rows = scan.grid_height();
            (0..scan.spec.priors.len())
                .flat_map(move |anchor| (0..rows).map(move |row| (scale, anchor, row)))
        })
        .collect();

    units.into_par_iter().for_each(|(scale, anchor, row)| {
        scan_row(&scans[scale], anchor, row, decoder, &out);
    });

    finish(out)
}
