//! Cooperative frame sampling loop.
//!
//! There is no worker thread. The sampler holds at most one pending tick;
//! the owner polls it with the current time and, when a tick is due, the
//! sampler captures one frame and runs one decode synchronously. Each
//! schedule has a generation number so that a tick issued for a cancelled
//! schedule is ignored instead of racing the new one.

use std::time::Duration;

use medcard_core::{GrayImage, SymbolCodec, SymbolDecode};

use crate::device::{DeviceError, VideoTrack};

/// Proof that a tick of a given schedule is due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickToken {
    generation: u64,
}

/// What one tick produced.
#[derive(Debug)]
pub enum TickOutcome {
    /// The token belongs to a cancelled schedule; nothing was sampled.
    Stale,
    Miss,
    Hit(SymbolDecode),
    CaptureFailed(DeviceError),
}

#[derive(Clone, Copy, Debug)]
struct Schedule {
    generation: u64,
    next_due_ms: i64,
}

pub struct FrameSampler {
    interval: Duration,
    generation: u64,
    schedule: Option<Schedule>,
    buffer: GrayImage,
    ticks: u64,
}

impl FrameSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: 0,
            schedule: None,
            buffer: GrayImage::default(),
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn interval_ms(&self) -> i64 {
        i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX)
    }

    /// Start a fresh schedule, cancelling any previous one first.
    pub fn start(&mut self, now_ms: i64) {
        self.cancel();
        self.generation += 1;
        self.schedule = Some(Schedule {
            generation: self.generation,
            next_due_ms: now_ms.saturating_add(self.interval_ms()),
        });
        log::debug!("sampler schedule #{} started", self.generation);
    }

    /// Drop the pending tick. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(s) = self.schedule.take() {
            log::debug!("sampler schedule #{} cancelled", s.generation);
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Number of ticks waiting to fire (0 or 1).
    pub fn pending_ticks(&self) -> usize {
        usize::from(self.schedule.is_some())
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        self.schedule.map(|s| s.next_due_ms)
    }

    /// Total ticks sampled over the sampler's lifetime.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Claim the pending tick if it is due at `now_ms`.
    pub fn poll(&self, now_ms: i64) -> Option<TickToken> {
        let s = self.schedule?;
        (now_ms >= s.next_due_ms).then_some(TickToken {
            generation: s.generation,
        })
    }

    /// Run one tick: capture into the offscreen buffer, then decode.
    ///
    /// On a miss the next tick is scheduled one interval after `now_ms`. On a
    /// hit or a capture failure the schedule is cancelled before returning,
    /// so no further tick of this schedule can fire.
    pub fn sample<C: SymbolCodec + ?Sized>(
        &mut self,
        token: TickToken,
        now_ms: i64,
        track: &mut dyn VideoTrack,
        codec: &C,
    ) -> TickOutcome {
        match self.schedule {
            Some(s) if s.generation == token.generation => {}
            _ => return TickOutcome::Stale,
        }
        self.ticks += 1;

        let (w, h) = track.dimensions();
        self.buffer.ensure_size(w, h);
        if let Err(err) = track.capture(&mut self.buffer) {
            self.cancel();
            return TickOutcome::CaptureFailed(err);
        }

        match codec.decode(&self.buffer.view()) {
            Some(hit) => {
                self.cancel();
                TickOutcome::Hit(hit)
            }
            None => {
                let next = now_ms.saturating_add(self.interval_ms());
                if let Some(s) = self.schedule.as_mut() {
                    s.next_due_ms = next;
                }
                TickOutcome::Miss
            }
        }
    }

    /// The most recently captured frame.
    pub fn frame(&self) -> &GrayImage {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcard_core::{EccLevel, GrayImageView, SymbolError, SymbolRaster};

    struct BrightCodec;

    impl SymbolCodec for BrightCodec {
        fn render(&self, _data: &[u8], _ecc: EccLevel) -> Result<SymbolRaster, SymbolError> {
            Err(SymbolError::Render("unused".into()))
        }

        fn decode(&self, frame: &GrayImageView<'_>) -> Option<SymbolDecode> {
            (frame.data.first() == Some(&255)).then(|| SymbolDecode {
                text: "hit".into(),
                location: None,
            })
        }
    }

    struct Frames {
        values: Vec<u8>,
        i: usize,
    }

    impl VideoTrack for Frames {
        fn dimensions(&self) -> (usize, usize) {
            (4, 3)
        }

        fn capture(&mut self, buffer: &mut GrayImage) -> Result<(), DeviceError> {
            buffer.data.fill(self.values[self.i.min(self.values.len() - 1)]);
            self.i += 1;
            Ok(())
        }

        fn is_live(&self) -> bool {
            true
        }

        fn stop(&mut self) {}
    }

    #[test]
    fn tick_is_not_due_before_interval() {
        let mut s = FrameSampler::new(Duration::from_millis(150));
        s.start(1_000);
        assert!(s.poll(1_100).is_none());
        assert!(s.poll(1_150).is_some());
    }

    #[test]
    fn hit_cancels_schedule() {
        let mut s = FrameSampler::new(Duration::from_millis(100));
        let mut track = Frames {
            values: vec![0, 0, 255],
            i: 0,
        };
        s.start(0);
        let mut now = 0;
        let mut misses = 0;
        loop {
            now += 100;
            let token = s.poll(now).expect("due");
            match s.sample(token, now, &mut track, &BrightCodec) {
                TickOutcome::Miss => misses += 1,
                TickOutcome::Hit(hit) => {
                    assert_eq!(hit.text, "hit");
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(misses, 2);
        assert_eq!(s.pending_ticks(), 0);
        assert!(s.poll(now + 1_000).is_none());
        assert_eq!((s.frame().width, s.frame().height), (4, 3));
    }

    #[test]
    fn miss_reschedules_one_interval_after_the_tick() {
        let mut s = FrameSampler::new(Duration::from_millis(150));
        let mut track = Frames {
            values: vec![0],
            i: 0,
        };
        s.start(1_000);
        // tick ran late
        let token = s.poll(1_210).expect("due");
        assert!(matches!(
            s.sample(token, 1_210, &mut track, &BrightCodec),
            TickOutcome::Miss
        ));
        assert_eq!(s.next_due_ms(), Some(1_360));
        assert_eq!(s.pending_ticks(), 1);
        assert!(s.poll(1_359).is_none());
        assert!(s.poll(1_360).is_some());
    }

    #[test]
    fn restart_invalidates_old_tokens() {
        let mut s = FrameSampler::new(Duration::from_millis(100));
        let mut track = Frames {
            values: vec![255],
            i: 0,
        };
        s.start(0);
        let old = s.poll(100).expect("due");
        s.start(100);
        assert!(matches!(
            s.sample(old, 100, &mut track, &BrightCodec),
            TickOutcome::Stale
        ));
        assert_eq!(s.ticks(), 0);
        assert_eq!(s.pending_ticks(), 1);
    }
}
