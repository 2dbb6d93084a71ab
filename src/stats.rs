use serde::{Deserialize, Serialize};

pub(crate) const STAT_MIN: f32 = 0.0;
pub(crate) const STAT_MAX: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatKind {
    Happiness,
    Energy,
    Boredom,
}

/// The three needs of the pet. Also the persisted record and the `stats`
/// object sent to the chat service, so field names are part of the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Stats {
    pub(crate) happiness: f32,
    pub(crate) energy: f32,
    pub(crate) boredom: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            happiness: 98.0,
            energy: 50.0,
            boredom: 10.0,
        }
    }
}

impl Stats {
    pub(crate) fn get(&self, kind: StatKind) -> f32 {
        match kind {
            StatKind::Happiness => self.happiness,
            StatKind::Energy => self.energy,
            StatKind::Boredom => self.boredom,
        }
    }

    fn slot(&mut self, kind: StatKind) -> &mut f32 {
        match kind {
            StatKind::Happiness => &mut self.happiness,
            StatKind::Energy => &mut self.energy,
            StatKind::Boredom => &mut self.boredom,
        }
    }

    /// Add `delta` and clamp into [0,100]. Out-of-range results are never an error.
    pub(crate) fn apply_delta(&mut self, kind: StatKind, delta: f32) {
        let v = self.slot(kind);
        let next = *v + delta;
        // NaN deltas leave the stat untouched rather than poisoning it.
        if next.is_nan() {
            return;
        }
        *v = next.clamp(STAT_MIN, STAT_MAX);
    }

    /// Re-establish the range invariant on a record that came from outside
    /// (a hand-edited save file, for instance).
    pub(crate) fn sanitized(self) -> Self {
        let fix = |v: f32| {
            if v.is_nan() {
                STAT_MIN
            } else {
                v.clamp(STAT_MIN, STAT_MAX)
            }
        };
        Self {
            happiness: fix(self.happiness),
            energy: fix(self.energy),
            boredom: fix(self.boredom),
        }
    }

    pub(crate) fn percent(&self, kind: StatKind) -> u32 {
        self.get(kind).round() as u32
    }
}
