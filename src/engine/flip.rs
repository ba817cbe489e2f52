//! The synchronized-flip handshake. No target presents its finished
//! frame until every draw bucket of that frame has completed.

use std::sync::{Condvar, Mutex};

/// Where the current frame stands between drawing and presentation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlipState {
    /// Draw buckets are still working on the frame.
    Drawing,
    /// Every draw bucket finished; back buffers hold the frame.
    Synced,
    /// The frame is on screen.
    Flipped,
}

struct Inner {
    state: FlipState,
    outstanding: usize,
}

/// Tracks one frame's march from drawing to presentation. The frame
/// driver arms it with the number of draw buckets; each bucket steps it
/// down on completion, and whichever bucket clears the last one performs
/// the move to synced and wakes waiters.
pub(crate) struct FlipController {
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl FlipController {
    pub fn new() -> Self {
        FlipController {
            inner: Mutex::new(Inner {
                state: FlipState::Flipped,
                outstanding: 0,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn state(&self) -> FlipState {
        self.inner.lock().unwrap().state
    }

    /// Arms the handshake for a frame with `buckets` draw buckets. A
    /// frame with nothing to draw syncs immediately.
    pub fn begin_frame(&self, buckets: usize) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(
            inner.outstanding, 0,
            "frame armed while previous draw buckets are outstanding"
        );

        if buckets == 0 {
            inner.state = FlipState::Synced;
            self.cv.notify_all();
        } else {
            inner.state = FlipState::Drawing;
            inner.outstanding = buckets;
        }
    }

    /// Marks one draw bucket finished.
    pub fn bucket_done(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert!(
            inner.outstanding > 0,
            "draw bucket completed with none outstanding"
        );

        inner.outstanding -= 1;
        if inner.outstanding == 0 {
            inner.state = FlipState::Synced;
            self.cv.notify_all();
        }
    }

    /// Blocks until every draw bucket of the current frame has finished.
    pub fn wait_synced(&self) {
        let mut inner = self.inner.lock().unwrap();
        while inner.state == FlipState::Drawing {
            inner = self.cv.wait(inner).unwrap();
        }
    }

    /// Records that back buffers went on screen.
    pub fn mark_flipped(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(
            inner.state,
            FlipState::Synced,
            "flip attempted before draw buckets synced"
        );
        inner.state = FlipState::Flipped;
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn walks_forward_through_states() {
        let flip = FlipController::new();
        assert_eq!(flip.state(), FlipState::Flipped);

        flip.begin_frame(2);
        assert_eq!(flip.state(), FlipState::Drawing);

        flip.bucket_done();
        assert_eq!(flip.state(), FlipState::Drawing);

        flip.bucket_done();
        assert_eq!(flip.state(), FlipState::Synced);

        flip.mark_flipped();
        assert_eq!(flip.state(), FlipState::Flipped);
    }

    #[test]
    fn empty_frame_syncs_immediately() {
        let flip = FlipController::new();
        flip.begin_frame(0);
        assert_eq!(flip.state(), FlipState::Synced);
        flip.wait_synced();
    }

    #[test]
    fn wait_unblocks_on_last_bucket() {
        let flip = Arc::new(FlipController::new());
        flip.begin_frame(3);

        let worker = {
            let flip = flip.clone();
            thread::spawn(move || {
                for _ in 0..3 {
                    flip.bucket_done();
                }
            })
        };

        flip.wait_synced();
        assert_eq!(flip.state(), FlipState::Synced);
        worker.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "flip attempted before draw buckets synced")]
    fn flip_while_drawing_is_fatal() {
        let flip = FlipController::new();
        flip.begin_frame(1);
        flip.mark_flipped();
    }

    #[test]
    #[should_panic(expected = "draw bucket completed with none outstanding")]
    fn unarmed_bucket_completion_is_fatal() {
        let flip = FlipController::new();
        flip.bucket_done();
    }
}
