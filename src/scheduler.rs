use crate::Millis;

// Upper bound on ticks replayed after a stall (suspended terminal, debugger).
const MAX_CATCHUP_TICKS: u32 = 64;

/// Fixed-period timer driven by an external clock.
#[derive(Clone, Debug)]
pub(crate) struct Ticker {
    every_ms: Millis,
    next_at: Option<Millis>,
}

impl Ticker {
    pub(crate) fn new(every_ms: Millis) -> Self {
        Self {
            every_ms: every_ms.max(1),
            next_at: None,
        }
    }

    /// (Re)arm; the first tick fires one period after `now`.
    pub(crate) fn start(&mut self, now: Millis) {
        self.next_at = Some(now.saturating_add(self.every_ms));
    }

    pub(crate) fn cancel(&mut self) {
        self.next_at = None;
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.next_at.is_some()
    }

    /// Number of periods that elapsed up to `now`.
    pub(crate) fn poll(&mut self, now: Millis) -> u32 {
        let Some(mut next) = self.next_at else {
            return 0;
        };
        let mut fired = 0;
        while now >= next {
            fired += 1;
            next = next.saturating_add(self.every_ms);
            if fired == MAX_CATCHUP_TICKS {
                // drop the backlog, keep the phase
                while now >= next {
                    next = next.saturating_add(self.every_ms);
                }
                break;
            }
        }
        self.next_at = Some(next);
        fired
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Due {
    pub(crate) decay: u32,
    pub(crate) frame: u32,
}

/// The slow needs tick and the fast sprite tick.
#[derive(Clone, Debug)]
pub(crate) struct Scheduler {
    decay: Ticker,
    frame: Ticker,
}

impl Scheduler {
    pub(crate) fn new(decay_every_ms: Millis, frame_every_ms: Millis) -> Self {
        Self {
            decay: Ticker::new(decay_every_ms),
            frame: Ticker::new(frame_every_ms),
        }
    }

    pub(crate) fn start(&mut self, now: Millis) {
        self.decay.start(now);
        self.frame.start(now);
    }

    pub(crate) fn cancel(&mut self) {
        self.decay.cancel();
        self.frame.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.decay.is_running() || self.frame.is_running()
    }

    pub(crate) fn poll(&mut self, now: Millis) -> Due {
        Due {
            decay: self.decay.poll(now),
            frame: self.frame.poll(now),
        }
    }
}
