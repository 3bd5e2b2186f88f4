//! Detection records and the flat raw-prediction buffer.
//!
//! The engine reports candidates as one flat `f32` buffer: slot 0 carries the
//! number of valid records, followed by `capacity` records of
//! [`DETECTION_SIZE`] floats each, laid out `[cx, cy, w, h, conf, class_id]`.

use crate::util::{YoloPostError, YoloPostResult};

/// Floats per serialized detection record.
pub const DETECTION_SIZE: usize = 6;

/// One detected object.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Detection {
    /// Box as `[cx, cy, w, h]` or `[x1, y1, x2, y2]` depending on the stage.
    pub bbox: [f32; 4],
    /// Objectness times best-class probability.
    pub conf: f32,
    /// Class index stored as a float, matching the engine layout.
    pub class_id: f32,
}

impl Detection {
    /// Creates a detection from its parts.
    pub fn new(bbox: [f32; 4], conf: f32, class_id: usize) -> Self {
        Self {
            bbox,
            conf,
            class_id: class_id as f32,
        }
    }

    /// Class index truncated to an integer.
    pub fn class_index(&self) -> usize {
        self.class_id as usize
    }

    /// Reads a record from `DETECTION_SIZE` consecutive floats.
    pub fn from_record(record: &[f32]) -> Option<Self> {
        let record = record.get(..DETECTION_SIZE)?;
        Some(Self {
            bbox: [record[0], record[1], record[2], record[3]],
            conf: record[4],
            class_id: record[5],
        })
    }

    /// Serializes into the engine record layout.
    pub fn to_record(&self) -> [f32; DETECTION_SIZE] {
        [
            self.bbox[0],
            self.bbox[1],
            self.bbox[2],
            self.bbox[3],
            self.conf,
            self.class_id,
        ]
    }
}

/// Candidates produced by one decode pass, bounded by `capacity`.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPredictions {
    capacity: usize,
    items: Vec<Detection>,
}

impl RawPredictions {
    /// Wraps an already bounded candidate list.
    ///
    /// Items beyond `capacity` are dropped.
    pub fn new(mut items: Vec<Detection>, capacity: usize) -> Self {
        items.truncate(capacity);
        Self { capacity, items }
    }

    /// Parses the engine's flat output buffer.
    ///
    /// The count slot is never trusted beyond `capacity` or beyond the number
    /// of whole records present in `buf`; negative and NaN counts read as zero
    /// and an infinite count reads as `capacity`.
    pub fn from_flat(buf: &[f32], capacity: usize) -> YoloPostResult<Self> {
        let Some((&count_slot, records)) = buf.split_first() else {
            return Err(YoloPostError::BufferTooSmall { needed: 1, got: 0 });
        };
        let claimed = if count_slot > 0.0 {
            count_slot as usize
        } else {
            0
        };
        let available = records.len() / DETECTION_SIZE;
        let count = claimed.min(capacity).min(available);

        let items = records
            .chunks_exact(DETECTION_SIZE)
            .take(count)
            .filter_map(Detection::from_record)
            .collect();
        Ok(Self { capacity, items })
    }

    /// Writes the engine layout: `1 + capacity * DETECTION_SIZE` floats.
    pub fn to_flat(&self) -> Vec<f32> {
        let mut buf = vec![0.0f32; 1 + self.capacity * DETECTION_SIZE];
        self.write_flat(&mut buf);
        buf
    }

    /// Writes the engine layout into `buf`, zero-filling unused records.
    ///
    /// Records that do not fit in `buf` are skipped and not counted.
    pub fn write_flat(&self, buf: &mut [f32]) {
        buf.fill(0.0);
        let Some((count_slot, records)) = buf.split_first_mut() else {
            return;
        };
        let mut written = 0usize;
        for (dst, det) in records.chunks_exact_mut(DETECTION_SIZE).zip(&self.items) {
            dst.copy_from_slice(&det.to_record());
            written += 1;
        }
        *count_slot = written as f32;
    }

    /// Maximum number of candidates this buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid candidates.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when no candidate survived decoding.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Valid candidates, in commit order.
    pub fn as_slice(&self) -> &[Detection] {
        &self.items
    }

    /// Consumes the buffer and returns the candidates.
    pub fn into_vec(self) -> Vec<Detection> {
        self.items
    }
}
