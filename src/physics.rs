use crate::Millis;
use rand::Rng;

/// Each velocity component is drawn from [-MAX_SPEED/2, MAX_SPEED/2].
pub(crate) const MAX_SPEED: f32 = 12.0;
pub(crate) const DEFAULT_BALL_SIZE: f32 = 32.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Bounds {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) ball_w: f32,
    pub(crate) ball_h: f32,
}

impl Bounds {
    pub(crate) fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ball_w: DEFAULT_BALL_SIZE,
            ball_h: DEFAULT_BALL_SIZE,
        }
    }

    pub(crate) fn with_ball(mut self, ball_w: f32, ball_h: f32) -> Self {
        self.ball_w = ball_w;
        self.ball_h = ball_h;
        self
    }

    // Never negative: a ball larger than the box is pinned at the origin.
    pub(crate) fn max_x(&self) -> f32 {
        (self.width - self.ball_w).max(0.0)
    }

    pub(crate) fn max_y(&self) -> f32 {
        (self.height - self.ball_h).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Ball {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) vx: f32,
    pub(crate) vy: f32,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct PhysicsEngine {
    ball: Ball,
    bounds: Option<Bounds>,
    ends_at: Millis,
    active: bool,
}

impl PhysicsEngine {
    /// Begin a session. Returns false (and changes nothing) if one is running.
    pub(crate) fn start<R: Rng + ?Sized>(
        &mut self,
        duration_ms: Millis,
        bounds: Bounds,
        now: Millis,
        rng: &mut R,
    ) -> bool {
        if self.active {
            return false;
        }
        let half = MAX_SPEED / 2.0;
        let ball = Ball {
            x: (bounds.width / 2.0).clamp(0.0, bounds.max_x()),
            y: (bounds.height / 2.0).clamp(0.0, bounds.max_y()),
            vx: rng.gen_range(-half..=half),
            vy: rng.gen_range(-half..=half),
        };
        self.start_with(ball, bounds, duration_ms, now);
        true
    }

    /// Begin with an explicit ball. Used by `start` and by deterministic tests.
    pub(crate) fn start_with(&mut self, ball: Ball, bounds: Bounds, duration_ms: Millis, now: Millis) {
        self.ball = ball;
        self.bounds = Some(bounds);
        self.ends_at = now.saturating_add(duration_ms);
        self.active = true;
    }

    /// One integration step. No-op when inactive.
    pub(crate) fn step(&mut self) {
        if !self.active {
            return;
        }
        let Some(b) = self.bounds else {
            return;
        };
        let ball = &mut self.ball;
        ball.x += ball.vx;
        ball.y += ball.vy;
        reflect(&mut ball.x, &mut ball.vx, b.max_x());
        reflect(&mut ball.y, &mut ball.vy, b.max_y());
    }

    pub(crate) fn stop(&mut self) {
        self.active = false;
    }

    /// Stop once the session deadline has passed, wherever the ball is.
    pub(crate) fn expire(&mut self, now: Millis) -> bool {
        if self.active && now >= self.ends_at {
            self.stop();
            return true;
        }
        false
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn ball(&self) -> Ball {
        self.ball
    }

    #[cfg(test)]
    pub(crate) fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }
}

fn reflect(pos: &mut f32, vel: &mut f32, max: f32) {
    if *pos <= 0.0 {
        *pos = 0.0;
        *vel = -*vel;
    } else if *pos >= max {
        *pos = max;
        *vel = -*vel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn arena() -> Bounds {
        Bounds::new(320.0, 200.0).with_ball(16.0, 16.0)
    }

    #[test]
    fn start_centers_ball_with_bounded_speed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut p = PhysicsEngine::default();
            assert!(p.start(4000, arena(), 0, &mut rng));
            let b = p.ball();
            assert_eq!((b.x, b.y), (160.0, 100.0));
            assert!(b.vx.abs() <= 6.0 && b.vy.abs() <= 6.0);
        }
    }

    #[test]
    fn second_start_is_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut p = PhysicsEngine::default();
        p.start_with(Ball { x: 5.0, y: 5.0, vx: 1.0, vy: 1.0 }, arena(), 4000, 0);
        assert!(!p.start(9000, Bounds::new(10.0, 10.0), 100, &mut rng));
        assert_eq!(p.ball().x, 5.0);
        assert_eq!(p.bounds(), Some(arena()));
    }

    #[test]
    fn wall_hit_clamps_and_flips_one_axis() {
        let mut p = PhysicsEngine::default();
        p.start_with(Ball { x: 2.0, y: 50.0, vx: -5.0, vy: 3.0 }, arena(), 4000, 0);
        p.step();
        let b = p.ball();
        assert_eq!(b.x, 0.0);
        assert_eq!(b.vx, 5.0);
        assert_eq!(b.y, 53.0);
        assert_eq!(b.vy, 3.0);
    }

    #[test]
    fn corner_hit_flips_both_axes() {
        let mut p = PhysicsEngine::default();
        p.start_with(Ball { x: 302.0, y: 182.0, vx: 4.0, vy: 4.0 }, arena(), 4000, 0);
        p.step();
        let b = p.ball();
        assert_eq!((b.x, b.y), (304.0, 184.0));
        assert_eq!((b.vx, b.vy), (-4.0, -4.0));
    }

    #[test]
    fn deadline_stops_and_late_steps_do_nothing() {
        let mut p = PhysicsEngine::default();
        p.start_with(Ball { x: 10.0, y: 10.0, vx: 1.0, vy: 1.0 }, arena(), 4000, 1000);
        assert!(!p.expire(4999));
        assert!(p.expire(5000));
        assert!(!p.is_active());
        let before = p.ball();
        p.step();
        assert_eq!(p.ball(), before);
    }

    #[test]
    fn tiny_arena_keeps_ball_at_origin() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut p = PhysicsEngine::default();
        p.start(4000, Bounds::new(10.0, 10.0), 0, &mut rng);
        assert_eq!((p.ball().x, p.ball().y), (0.0, 0.0));
        for _ in 0..20 {
            p.step();
            assert_eq!((p.ball().x, p.ball().y), (0.0, 0.0));
        }
    }

    proptest! {
        #[test]
        fn ball_never_leaves_arena(
            vx in -6.0..=6.0f32,
            vy in -6.0..=6.0f32,
            steps in 1usize..2000,
        ) {
            let bounds = arena();
            let mut p = PhysicsEngine::default();
            p.start_with(Ball { x: 160.0, y: 100.0, vx, vy }, bounds, 4000, 0);
            for _ in 0..steps {
                p.step();
                let b = p.ball();
                prop_assert!(b.x >= 0.0 && b.x <= bounds.max_x());
                prop_assert!(b.y >= 0.0 && b.y <= bounds.max_y());
            }
        }

        #[test]
        fn speed_survives_reflection(
            vx in -6.0..=6.0f32,
            vy in -6.0..=6.0f32,
            steps in 1usize..500,
        ) {
            let mut p = PhysicsEngine::default();
            p.start_with(Ball { x: 160.0, y: 100.0, vx, vy }, arena(), 4000, 0);
            for _ in 0..steps {
                let before = p.ball();
                p.step();
                let after = p.ball();
                prop_assert_eq!(after.vx.abs(), before.vx.abs());
                prop_assert_eq!(after.vy.abs(), before.vy.abs());
                let hit_x = after.x == 0.0 || after.x == arena().max_x();
                let hit_y = after.y == 0.0 || after.y == arena().max_y();
                if hit_x {
                    prop_assert_eq!(after.vx, -before.vx);
                } else {
                    prop_assert_eq!(after.vx, before.vx);
                }
                if hit_y {
                    prop_assert_eq!(after.vy, -before.vy);
                } else {
                    prop_assert_eq!(after.vy, before.vy);
                }
            }
        }
    }
}
