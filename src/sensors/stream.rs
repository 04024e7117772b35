//! Per-source raw-detection streams.

use super::dispatch::SensorSource;
use crate::dynamic_object::{TimeFrame, Timestamp};

/// Time-ordered raw detections of one sensor source.
#[derive(Debug, Clone)]
pub struct RawDetectionStream {
    source: SensorSource,
    frames: Vec<TimeFrame>,
}

impl RawDetectionStream {
    /// Create a stream; frames are sorted by timestamp (stable).
    pub fn new(source: SensorSource, mut frames: Vec<TimeFrame>) -> Self {
        frames.sort_by_key(|f| f.timestamp());
        Self { source, frames }
    }

    pub fn source(&self) -> SensorSource {
        self.source
    }

    pub fn frames(&self) -> &[TimeFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame nearest to `timestamp` if it lies within `tolerance` microseconds.
    ///
    /// On equal distance the earlier frame wins.
    pub fn frame_at(&self, timestamp: Timestamp, tolerance: Timestamp) -> Option<&TimeFrame> {
        let idx = self.frames.partition_point(|f| f.timestamp() < timestamp);
        let after = self.frames.get(idx);
        let before = idx.checked_sub(1).and_then(|i| self.frames.get(i));

        let nearest = match (before, after) {
            (Some(b), Some(a)) => {
                if timestamp - b.timestamp() <= a.timestamp() - timestamp {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        (nearest.timestamp().abs_diff(timestamp) <= tolerance).then_some(nearest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::sensor_by_name;

    fn stream() -> RawDetectionStream {
        let frames = [300, 100, 200].iter().map(|&t| TimeFrame::empty(t)).collect();
        RawDetectionStream::new(sensor_by_name("front").unwrap(), frames)
    }

    #[test]
    fn test_frames_sorted() {
        let ts: Vec<_> = stream().frames().iter().map(|f| f.timestamp()).collect();
        assert_eq!(ts, vec![100, 200, 300]);
    }

    #[test]
    fn test_frame_at_nearest_within_tolerance() {
        let s = stream();
        assert_eq!(s.frame_at(190, 20).map(|f| f.timestamp()), Some(200));
        assert_eq!(s.frame_at(150, 50).map(|f| f.timestamp()), Some(100));
        assert_eq!(s.frame_at(400, 50), None);
        assert_eq!(s.frame_at(0, 100).map(|f| f.timestamp()), Some(100));
        assert_eq!(s.frame_at(200, 0).map(|f| f.timestamp()), Some(200));
    }
}
