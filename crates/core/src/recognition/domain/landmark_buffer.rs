use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::shared::landmarks::{LandmarkFrame, LandmarkWindow};
use crate::shared::session_store::{EvictionPolicy, SessionKey, SessionStore};

/// Bounded per-key history of landmark frames that yields recognition windows.
pub struct LandmarkBuffer {
    frames: SessionStore<VecDeque<Arc<LandmarkFrame>>>,
    window_size: usize,
    max_len: usize,
}

impl LandmarkBuffer {
    pub fn new(window_size: usize, max_len: usize, policy: Arc<dyn EvictionPolicy>) -> Self {
        Self {
            frames: SessionStore::new(policy),
            window_size,
            max_len: max_len.max(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Appends a frame and drops the oldest entries beyond the cap.
    ///
    /// A frame older than the newest buffered one is discarded, so buffered
    /// timestamps never decrease. Returns the buffered length after trimming.
    pub fn append(&self, key: &SessionKey, frame: LandmarkFrame) -> usize {
        self.frames.with_entry(key, |buf| {
            if let Some(newest) = buf.back() {
                if frame.timestamp < newest.timestamp {
                    log::warn!(
                        "Discarding stale frame {} for {key}, newest is {}",
                        frame.timestamp,
                        newest.timestamp
                    );
                    return buf.len();
                }
            }
            buf.push_back(Arc::new(frame));
            while buf.len() > self.max_len {
                buf.pop_front();
            }
            buf.len()
        })
    }

    /// Window over the newest `window_size` frames, or `None` while the
    /// key has fewer frames than that.
    pub fn window(&self, key: &SessionKey) -> Option<LandmarkWindow> {
        let frames: Vec<Arc<LandmarkFrame>> = self.frames.peek(key, |buf| {
            if buf.len() < self.window_size {
                return Vec::new();
            }
            buf.iter()
                .skip(buf.len() - self.window_size)
                .cloned()
                .collect()
        })?;
        if frames.is_empty() {
            return None;
        }
        match LandmarkWindow::new(frames, self.window_size) {
            Ok(window) => Some(window),
            Err(e) => {
                log::warn!("Dropping window for {key}: {e}");
                None
            }
        }
    }

    pub fn len(&self, key: &SessionKey) -> usize {
        self.frames.peek(key, |buf| buf.len()).unwrap_or(0)
    }

    pub fn reset(&self, key: &SessionKey) {
        self.frames.remove(key);
    }

    pub fn evict_idle(&self, now: Instant) -> usize {
        self.frames.evict_idle(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::session_store::NeverEvict;

    fn buffer(window: usize, cap: usize) -> LandmarkBuffer {
        LandmarkBuffer::new(window, cap, Arc::new(NeverEvict))
    }

    fn key() -> SessionKey {
        SessionKey::new("s", "u")
    }

    #[test]
    fn test_not_ready_below_window_size() {
        let buf = buffer(10, 30);
        for ts in 0..9 {
            buf.append(&key(), LandmarkFrame::empty(ts));
            assert!(buf.window(&key()).is_none());
        }
        buf.append(&key(), LandmarkFrame::empty(9));
        let w = buf.window(&key()).unwrap();
        assert_eq!(w.len(), 10);
        assert_eq!(w.ts_start(), 0);
        assert_eq!(w.ts_end(), 9);
    }

    #[test]
    fn test_window_is_newest_suffix() {
        let buf = buffer(3, 30);
        for ts in 0..7 {
            buf.append(&key(), LandmarkFrame::empty(ts));
        }
        let w = buf.window(&key()).unwrap();
        let ts: Vec<i64> = w.frames().iter().map(|f| f.timestamp).collect();
        assert_eq!(ts, vec![4, 5, 6]);
    }

    #[test]
    fn test_cap_is_never_exceeded() {
        let buf = buffer(10, 30);
        for ts in 0..100 {
            let len = buf.append(&key(), LandmarkFrame::empty(ts));
            assert!(len <= 30);
        }
        assert_eq!(buf.len(&key()), 30);
    }

    #[test]
    fn test_unknown_key_has_no_window() {
        let buf = buffer(10, 30);
        assert!(buf.window(&key()).is_none());
        assert_eq!(buf.len(&key()), 0);
    }

    #[test]
    fn test_keys_do_not_share_frames() {
        let buf = buffer(2, 30);
        buf.append(&key(), LandmarkFrame::empty(0));
        buf.append(&SessionKey::new("s", "other"), LandmarkFrame::empty(1));
        assert!(buf.window(&key()).is_none());
    }

    #[test]
    fn test_stale_frame_is_discarded() {
        let buf = buffer(2, 30);
        assert_eq!(buf.append(&key(), LandmarkFrame::empty(10)), 1);
        assert_eq!(buf.append(&key(), LandmarkFrame::empty(5)), 1);
        assert!(buf.window(&key()).is_none());

        assert_eq!(buf.append(&key(), LandmarkFrame::empty(11)), 2);
        let w = buf.window(&key()).unwrap();
        assert_eq!(w.ts_start(), 10);
        assert_eq!(w.ts_end(), 11);
    }

    #[test]
    fn test_equal_timestamps_are_kept() {
        let buf = buffer(2, 30);
        buf.append(&key(), LandmarkFrame::empty(3));
        assert_eq!(buf.append(&key(), LandmarkFrame::empty(3)), 2);
        assert!(buf.window(&key()).is_some());
    }

    #[test]
    fn test_reset_forgets_frames() {
        let buf = buffer(2, 30);
        buf.append(&key(), LandmarkFrame::empty(0));
        buf.reset(&key());
        assert_eq!(buf.len(&key()), 0);
    }
}
