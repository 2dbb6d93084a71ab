use crate::chat::{ChatClient, ChatError, ChatRequest, ServiceStatus};
use crate::config::{load_settings, store_settings, Cli, Paths, Settings};
use crate::input::{collect_input_nonblocking, map_event_to_action};
use crate::model::{Composer, Scene};
use crate::render::{arena_for, draw_view, play_area, Terminal, View};
use crate::scheduler::Scheduler;
use crate::sim::{ChatOrigin, Pet, PlayerAction};
use crate::stats::Stats;
use crate::storage::{load_stats, save_stats};
use crate::Millis;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Completions coming back from spawned network tasks.
#[derive(Debug)]
pub(crate) enum Inbound {
    ChatDone(Result<String, ChatError>),
    Status(Result<ServiceStatus, ChatError>),
}

/// Everything the main loop mutates, minus the terminal and the network.
pub(crate) struct Session {
    pub(crate) pet: Pet,
    pub(crate) scene: Scene,
    pub(crate) composer: Composer,
    scheduler: Scheduler,
    pub(crate) should_quit: bool,
}

impl Session {
    pub(crate) fn new(pet: Pet, settings: &Settings) -> Self {
        Self {
            pet,
            scene: Scene::Main,
            composer: Composer::default(),
            scheduler: Scheduler::new(settings.decay_interval_ms, settings.frame_interval_ms),
            should_quit: false,
        }
    }

    pub(crate) fn start(&mut self, now: Millis) {
        self.scheduler.start(now);
    }

    pub(crate) fn stop(&mut self) {
        self.scheduler.cancel();
    }

    /// Stop ticking and write the final stats. Returns whether the save landed.
    pub(crate) fn finish(&mut self, save_path: &Path) -> bool {
        self.stop();
        match save_stats(save_path, &self.pet.stats()) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not save stats on exit: {e:#}");
                false
            }
        }
    }

    pub(crate) fn dispatch(&mut self, action: PlayerAction, now: Millis) {
        match action {
            PlayerAction::Pet => self.pet.pet(now),
            PlayerAction::Play => {
                self.pet.play(now);
            }
            PlayerAction::Sleep => self.pet.sleep(now),
            PlayerAction::ChatOpen => self.scene = Scene::Chat,
            PlayerAction::ChatChar(ch) => self.composer.push(ch),
            PlayerAction::ChatBackspace => self.composer.backspace(),
            PlayerAction::ChatSubmit => {
                let text = self.composer.take();
                self.pet.send_chat(&text, ChatOrigin::User, now);
                self.scene = Scene::Main;
            }
            PlayerAction::LogToggle => {
                self.scene = match self.scene {
                    Scene::Log => Scene::Main,
                    _ => Scene::Log,
                };
            }
            PlayerAction::HelpToggle => {
                self.scene = match self.scene {
                    Scene::Help => Scene::Main,
                    _ => Scene::Help,
                };
            }
            PlayerAction::Back => {
                self.composer.clear();
                self.scene = Scene::Main;
            }
            PlayerAction::Quit => self.should_quit = true,
        }
    }

    /// Run due ticks and one physics step. Returns how many decay ticks fired;
    /// the caller persists after each.
    pub(crate) fn advance(&mut self, now: Millis, mut on_decay: impl FnMut(&Stats)) -> u32 {
        let due = self.scheduler.poll(now);
        for _ in 0..due.decay {
            self.pet.decay_tick(now);
            on_decay(&self.pet.stats());
        }
        for _ in 0..due.frame {
            self.pet.frame_tick(now);
        }
        self.pet.advance_physics(now);
        due.decay
    }

    pub(crate) fn outgoing(&mut self) -> Vec<ChatRequest> {
        self.pet.take_chat_requests()
    }
}

pub(crate) struct App {
    settings: Settings,
    file_settings: Settings,
    paths: Paths,
    session: Session,
    client: ChatClient,
    tx: mpsc::Sender<Inbound>,
    rx: mpsc::Receiver<Inbound>,
    term: Terminal,
    clock: Instant,
    service: String,
    last_saved: Option<String>,
}

impl App {
    fn init(cli: Cli, paths: Paths) -> anyhow::Result<Self> {
        let file_settings = load_settings(&paths.settings_path);
        let mut settings = file_settings.clone();
        settings.merge_cli(&cli);

        let stats = if cli.reset {
            None
        } else {
            load_stats(&paths.save_path)
        };
        let restored = stats.is_some();
        let stats = stats.unwrap_or_default();
        info!(?stats, restored, "starting");

        let term = Terminal::begin()?;
        let arena = arena_for(play_area(term.cols, term.rows));
        let pet = Pet::new(stats, arena, settings.effective_seed());

        let client = if cli.offline {
            ChatClient::offline()
        } else {
            ChatClient::new(
                settings.chat_endpoint.clone(),
                Duration::from_secs(settings.chat_timeout_secs),
            )
        };
        let (tx, rx) = mpsc::channel::<Inbound>(16);

        Ok(Self {
            session: Session::new(pet, &settings),
            settings,
            file_settings,
            paths,
            client,
            tx,
            rx,
            term,
            clock: Instant::now(),
            service: if cli.offline { "desactivado" } else { "…" }.to_string(),
            last_saved: None,
        })
    }

    fn now(&self) -> Millis {
        self.clock.elapsed().as_millis() as Millis
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        self.spawn_status_probe();
        let now = self.now();
        self.session.start(now);

        while !self.session.should_quit {
            let frame_start = Instant::now();

            if self.term.resize_if_needed()? {
                let arena = arena_for(play_area(self.term.cols, self.term.rows));
                self.session.pet.set_arena(arena);
            }

            // input
            for ev in collect_input_nonblocking()? {
                if let Some(action) = map_event_to_action(self.session.scene, &ev) {
                    let now = self.now();
                    self.session.dispatch(action, now);
                }
            }
            self.spawn_chat_requests();

            // completions
            while let Ok(msg) = self.rx.try_recv() {
                self.handle_inbound(msg);
            }

            // ticks + physics
            let now = self.now();
            let path = self.paths.save_path.clone();
            let mut saved = false;
            self.session.advance(now, |stats| {
                if let Err(e) = save_stats(&path, stats) {
                    warn!("could not save stats: {e:#}");
                } else {
                    saved = true;
                }
            });
            if saved {
                self.last_saved = Some(chrono::Local::now().format("%H:%M:%S").to_string());
            }

            self.render_frame()?;

            // yield so chat tasks progress between frames
            let rest = frame_dt.saturating_sub(frame_start.elapsed());
            tokio::time::sleep(rest.max(Duration::from_millis(1))).await;
        }
        Ok(())
    }

    fn spawn_chat_requests(&mut self) {
        for req in self.session.outgoing() {
            let client = self.client.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let result = client.send(&req).await;
                tx.send(Inbound::ChatDone(result)).await.ok();
            });
        }
    }

    fn spawn_status_probe(&self) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.status().await;
            tx.send(Inbound::Status(result)).await.ok();
        });
    }

    fn handle_inbound(&mut self, msg: Inbound) {
        match msg {
            Inbound::ChatDone(result) => {
                let now = self.now();
                self.session.pet.complete_chat(result, now);
            }
            Inbound::Status(Ok(st)) => {
                info!(status = %st.status, model = ?st.model, api_configured = st.api_configured, "chat service");
                self.service = match (&st.model, st.api_configured) {
                    (Some(model), true) => format!("{} ({model})", st.status),
                    (_, false) => format!("{} (sin clave)", st.status),
                    (None, true) => st.status,
                };
            }
            Inbound::Status(Err(ChatError::Offline)) => {}
            Inbound::Status(Err(e)) => {
                warn!("chat service unreachable: {e}");
                self.service = "sin conexión".to_string();
            }
        }
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let view = View {
            pet: &self.session.pet,
            now: self.now(),
            scene: self.session.scene,
            composer: self.session.composer.text(),
            color: self.settings.enable_color,
            service: &self.service,
            last_saved: self.last_saved.as_deref(),
        };
        draw_view(&mut self.term.cur, &view);
        self.term.present()
    }

    /// Runs after the loop whether it quit or failed.
    fn shutdown(&mut self) -> anyhow::Result<()> {
        let restored = self.term.end();
        self.session.finish(&self.paths.save_path);
        store_settings(&self.paths.settings_path, &self.file_settings);
        restored
    }
}

pub(crate) async fn run(cli: Cli, paths: Paths) -> anyhow::Result<()> {
    let mut app = App::init(cli, paths)?;
    let result = app.run().await;
    let closed = app.shutdown();
    result.and(closed)
}
