use crate::stats::Stats;
use crate::Millis;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mood {
    Normal,
    Tired,
    Sad,
    Bored,
    Happy,
    Sleeping,
}

impl Mood {
    /// Sprite asset prefix. Sleeping reuses the tired art.
    pub(crate) fn sprite_key(self) -> &'static str {
        match self {
            Mood::Normal => "normal",
            Mood::Tired | Mood::Sleeping => "tired",
            Mood::Sad => "sad",
            Mood::Bored => "bored",
            Mood::Happy => "happy",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Mood::Normal => "NORMAL",
            Mood::Tired => "CANSADO",
            Mood::Sad => "TRISTE",
            Mood::Bored => "ABURRIDO",
            Mood::Happy => "FELIZ",
            Mood::Sleeping => "DURMIENDO",
        }
    }
}

pub(crate) const TIRED_AT_OR_BELOW: f32 = 30.0;
pub(crate) const SAD_AT_OR_BELOW: f32 = 30.0;
pub(crate) const BORED_AT_OR_ABOVE: f32 = 70.0;

/// First match wins: tiredness, then sadness, then boredom.
pub(crate) fn derive_mood(s: &Stats) -> Mood {
    if s.energy <= TIRED_AT_OR_BELOW {
        Mood::Tired
    } else if s.happiness <= SAD_AT_OR_BELOW {
        Mood::Sad
    } else if s.boredom >= BORED_AT_OR_ABOVE {
        Mood::Bored
    } else {
        Mood::Normal
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ForcedState {
    pub(crate) mood: Mood,
    pub(crate) expires_at: Millis,
}

/// Single timed override. A later `force` always replaces the current one.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct OverrideSlot {
    forced: Option<ForcedState>,
}

impl OverrideSlot {
    pub(crate) fn force(&mut self, mood: Mood, duration_ms: Millis, now: Millis) {
        self.forced = Some(ForcedState {
            mood,
            expires_at: now.saturating_add(duration_ms),
        });
    }

    /// The forced mood while `now < expires_at`.
    pub(crate) fn active(&self, now: Millis) -> Option<Mood> {
        self.forced
            .filter(|f| now < f.expires_at)
            .map(|f| f.mood)
    }

    /// Strictly past the deadline. An empty slot counts as expired.
    pub(crate) fn is_expired(&self, now: Millis) -> bool {
        self.forced.map_or(true, |f| now > f.expires_at)
    }
}

pub(crate) fn current_mood(stats: &Stats, slot: &OverrideSlot, now: Millis) -> Mood {
    slot.active(now).unwrap_or_else(|| derive_mood(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(energy: f32, happiness: f32, boredom: f32) -> Stats {
        Stats {
            happiness,
            energy,
            boredom,
        }
    }

    #[test]
    fn priority_order_is_tired_sad_bored() {
        assert_eq!(derive_mood(&stats(20.0, 10.0, 80.0)), Mood::Tired);
        assert_eq!(derive_mood(&stats(50.0, 20.0, 80.0)), Mood::Sad);
        assert_eq!(derive_mood(&stats(50.0, 50.0, 80.0)), Mood::Bored);
        assert_eq!(derive_mood(&stats(50.0, 50.0, 50.0)), Mood::Normal);
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(derive_mood(&stats(30.0, 90.0, 0.0)), Mood::Tired);
        assert_eq!(derive_mood(&stats(30.5, 30.0, 0.0)), Mood::Sad);
        assert_eq!(derive_mood(&stats(31.0, 31.0, 70.0)), Mood::Bored);
        assert_eq!(derive_mood(&stats(31.0, 31.0, 69.5)), Mood::Normal);
    }

    #[test]
    fn forced_mood_holds_until_deadline() {
        let s = stats(50.0, 50.0, 50.0);
        let mut slot = OverrideSlot::default();
        let t0 = 10_000;
        slot.force(Mood::Happy, 2000, t0);
        assert_eq!(current_mood(&s, &slot, t0 + 1999), Mood::Happy);
        assert_eq!(current_mood(&s, &slot, t0 + 2000), derive_mood(&s));
        assert_eq!(current_mood(&s, &slot, t0 + 2001), derive_mood(&s));
    }

    #[test]
    fn later_force_replaces_longer_one() {
        let s = stats(20.0, 50.0, 50.0);
        let mut slot = OverrideSlot::default();
        let t0 = 0;
        slot.force(Mood::Happy, 5000, t0);
        slot.force(Mood::Sleeping, 100, t0 + 10);
        assert_eq!(current_mood(&s, &slot, t0 + 50), Mood::Sleeping);
        assert_eq!(current_mood(&s, &slot, t0 + 200), Mood::Tired);
    }

    #[test]
    fn expiry_check_is_strict() {
        let mut slot = OverrideSlot::default();
        assert!(slot.is_expired(0));
        slot.force(Mood::Happy, 3000, 1000);
        assert!(!slot.is_expired(4000));
        assert!(slot.is_expired(4001));
    }

    #[test]
    fn sleeping_uses_tired_sprite() {
        assert_eq!(Mood::Sleeping.sprite_key(), "tired");
        assert_eq!(Mood::Sleeping.label(), "DURMIENDO");
    }
}
