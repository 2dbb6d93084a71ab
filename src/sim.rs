use crate::chat::{
    BubbleBoard, ChatError, ChatHistory, ChatRequest, ChatRole, Speaker, FALLBACK_REPLY,
};
use crate::mood::{current_mood, derive_mood, Mood, OverrideSlot};
use crate::physics::{Bounds, PhysicsEngine};
use crate::stats::{StatKind, Stats};
use crate::Millis;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

pub(crate) const PET_FORCE_MS: Millis = 2000;
pub(crate) const PLAY_FORCE_MS: Millis = 4000;
pub(crate) const PLAY_PHYSICS_MS: Millis = 4000;
pub(crate) const SLEEP_FORCE_MS: Millis = 3000;
pub(crate) const CHAT_FORCE_MS: Millis = 3000;

pub(crate) const PLAY_MIN_ENERGY: f32 = 20.0;
pub(crate) const DECAY_BOREDOM: f32 = 0.5;

pub(crate) const PLAY_PROMPT: &str = "[ACCION_PLAY: Cuenta un dato curioso corto]";
pub(crate) const TOO_TIRED_TO_PLAY: &str = "Estoy muy cansado...";
pub(crate) const SLEEP_MESSAGE: &str = "Zzz...";

pub(crate) const HINT_PETTED: &str = "FELIZ";
pub(crate) const HINT_TOO_TIRED: &str = "CANSADO";
pub(crate) const HINT_PLAYING: &str = "JUGANDO";
pub(crate) const HINT_SLEEPING: &str = "DURMIENDO";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PlayerAction {
    Pet,
    Play,
    Sleep,
    ChatOpen,
    ChatChar(char),
    ChatBackspace,
    ChatSubmit,
    LogToggle,
    HelpToggle,
    Back,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChatOrigin {
    User,
    Action,
}

/// Alternating animation frame, 1 or 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SpriteFrame(u8);

impl Default for SpriteFrame {
    fn default() -> Self {
        Self(1)
    }
}

impl SpriteFrame {
    pub(crate) fn advance(&mut self) {
        self.0 = if self.0 == 1 { 2 } else { 1 };
    }

    pub(crate) fn index(self) -> u8 {
        self.0
    }
}

/// All client-local pet state. Ticks and actions are the only writers.
#[derive(Clone, Debug)]
pub(crate) struct Pet {
    stats: Stats,
    forced: OverrideSlot,
    // Last label written for display. Re-derived when an override lapses.
    mood_text: &'static str,
    relabel_on_expiry: bool,
    physics: PhysicsEngine,
    arena: Bounds,
    history: ChatHistory,
    bubbles: BubbleBoard,
    frame: SpriteFrame,
    outbox: Vec<ChatRequest>,
    rng: StdRng,
}

impl Pet {
    pub(crate) fn new(stats: Stats, arena: Bounds, seed: u64) -> Self {
        let stats = stats.sanitized();
        Self {
            mood_text: derive_mood(&stats).label(),
            stats,
            forced: OverrideSlot::default(),
            relabel_on_expiry: false,
            physics: PhysicsEngine::default(),
            arena,
            history: ChatHistory::default(),
            bubbles: BubbleBoard::default(),
            frame: SpriteFrame::default(),
            outbox: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /* -----------------------------
       Actions
    ------------------------------ */

    pub(crate) fn pet(&mut self, now: Millis) {
        self.nudge(StatKind::Happiness, 10.0, now);
        self.force(Mood::Happy, PET_FORCE_MS, now);
        self.mood_text = HINT_PETTED;
        info!(happiness = self.stats.happiness, "pet");
    }

    /// Returns false when the pet is too tired; nothing changes in that case
    /// besides the message on screen.
    pub(crate) fn play(&mut self, now: Millis) -> bool {
        if self.stats.energy < PLAY_MIN_ENERGY {
            self.bubbles.say(Speaker::Pet, TOO_TIRED_TO_PLAY, now);
            self.mood_text = HINT_TOO_TIRED;
            info!(energy = self.stats.energy, "play refused");
            return false;
        }

        self.nudge(StatKind::Boredom, -20.0, now);
        self.nudge(StatKind::Energy, -10.0, now);
        self.nudge(StatKind::Happiness, 5.0, now);

        self.force(Mood::Happy, PLAY_FORCE_MS, now);
        self.mood_text = HINT_PLAYING;

        if self
            .physics
            .start(PLAY_PHYSICS_MS, self.arena, now, &mut self.rng)
        {
            debug!(ball = ?self.physics.ball(), "ball launched");
        }

        self.send_chat(PLAY_PROMPT, ChatOrigin::Action, now);
        info!(stats = ?self.stats, "play");
        true
    }

    pub(crate) fn sleep(&mut self, now: Millis) {
        self.nudge(StatKind::Energy, 30.0, now);
        self.nudge(StatKind::Boredom, -5.0, now);
        self.force(Mood::Sleeping, SLEEP_FORCE_MS, now);
        self.bubbles.say(Speaker::Pet, SLEEP_MESSAGE, now);
        self.mood_text = HINT_SLEEPING;
        info!(energy = self.stats.energy, "sleep");
    }

    /* -----------------------------
       Chat bridge
    ------------------------------ */

    /// Queue a message for the chat service. The stat nudge is applied now,
    /// before the outcome is known, and is kept even if the call fails.
    pub(crate) fn send_chat(&mut self, text: &str, origin: ChatOrigin, now: Millis) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if origin == ChatOrigin::User {
            self.bubbles.say(Speaker::User, text, now);
            self.history.push(ChatRole::User, text);
        }

        self.nudge(StatKind::Happiness, 5.0, now);
        self.nudge(StatKind::Boredom, -5.0, now);

        self.outbox.push(ChatRequest {
            message: text.to_string(),
            history: self.history.snapshot(),
            stats: self.stats,
        });
        true
    }

    pub(crate) fn take_chat_requests(&mut self) -> Vec<ChatRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Apply a finished chat call, whenever it arrives.
    pub(crate) fn complete_chat(&mut self, result: Result<String, ChatError>, now: Millis) {
        match result {
            Ok(reply) => {
                self.bubbles.say(Speaker::Pet, reply.as_str(), now);
                self.history.push(ChatRole::Model, reply);
                // A running reaction (play, pet, sleep) keeps the screen.
                if self.forced.is_expired(now) {
                    self.force(Mood::Happy, CHAT_FORCE_MS, now);
                }
            }
            Err(e) => {
                warn!("chat failed: {e}");
                self.bubbles.say(Speaker::Pet, FALLBACK_REPLY, now);
            }
        }
    }

    /* -----------------------------
       Ticks
    ------------------------------ */

    /// Slow needs tick. The caller persists `stats()` afterwards.
    pub(crate) fn decay_tick(&mut self, now: Millis) {
        self.nudge(StatKind::Boredom, DECAY_BOREDOM, now);
        debug!(boredom = self.stats.boredom, "decay");
    }

    /// Fast animation tick.
    pub(crate) fn frame_tick(&mut self, now: Millis) {
        self.frame.advance();
        if self.relabel_on_expiry && self.forced.active(now).is_none() {
            self.relabel_on_expiry = false;
            self.relabel(now);
        }
        self.bubbles.prune(now);
    }

    /// Per-rendered-frame physics. Also enforces the session deadline.
    pub(crate) fn advance_physics(&mut self, now: Millis) {
        if self.physics.expire(now) {
            debug!("ball session over");
        }
        self.physics.step();
    }

    pub(crate) fn set_arena(&mut self, arena: Bounds) {
        self.arena = arena;
    }

    /* -----------------------------
       Reads
    ------------------------------ */

    pub(crate) fn stats(&self) -> Stats {
        self.stats
    }

    pub(crate) fn mood(&self, now: Millis) -> Mood {
        current_mood(&self.stats, &self.forced, now)
    }

    pub(crate) fn mood_text(&self) -> &'static str {
        self.mood_text
    }

    #[cfg(test)]
    pub(crate) fn frame(&self) -> SpriteFrame {
        self.frame
    }

    /// Asset name, `<mood-key>_<frame>`.
    pub(crate) fn sprite_name(&self, now: Millis) -> String {
        format!("{}_{}", self.mood(now).sprite_key(), self.frame.index())
    }

    pub(crate) fn physics(&self) -> &PhysicsEngine {
        &self.physics
    }

    #[cfg(test)]
    pub(crate) fn physics_mut(&mut self) -> &mut PhysicsEngine {
        &mut self.physics
    }

    pub(crate) fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub(crate) fn bubbles(&self) -> &BubbleBoard {
        &self.bubbles
    }

    /* -----------------------------
       Internals
    ------------------------------ */

    fn nudge(&mut self, kind: StatKind, delta: f32, now: Millis) {
        self.stats.apply_delta(kind, delta);
        self.relabel(now);
    }

    fn force(&mut self, mood: Mood, duration_ms: Millis, now: Millis) {
        self.forced.force(mood, duration_ms, now);
        self.relabel_on_expiry = true;
    }

    fn relabel(&mut self, now: Millis) {
        if self.forced.active(now).is_none() {
            self.mood_text = derive_mood(&self.stats).label();
        }
    }
}
