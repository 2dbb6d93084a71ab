use crate::chat::{ChatRole, Speaker};
use crate::model::Scene;
use crate::mood::Mood;
use crate::physics::Bounds;
use crate::sim::Pet;
use crate::stats::StatKind;
use crate::Millis;
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::cmp::{max, min};
use std::io::{self, Write};

/// Physics runs in virtual pixels; one terminal cell is 8×16 of them.
pub(crate) const PX_PER_COL: f32 = 8.0;
pub(crate) const PX_PER_ROW: f32 = 16.0;
const BALL_COLS: u16 = 2;
const BALL_ROWS: u16 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }
}

pub(crate) struct Terminal {
    out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    prev: CellBuffer,
    pub(crate) cur: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    /// Flush only the cells that changed since the last frame.
    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Layout
------------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PlayArea {
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) w: u16,
    pub(crate) h: u16,
}

/// Left panel for text, pet screen on the right, one footer row.
pub(crate) fn play_area(cols: u16, rows: u16) -> PlayArea {
    let panel_w = min(max(28, cols / 3), cols.saturating_sub(10));
    PlayArea {
        x: panel_w,
        y: 0,
        w: cols.saturating_sub(panel_w),
        h: rows.saturating_sub(2),
    }
}

/// Cells inside the screen border: top and bottom rows plus the left column.
pub(crate) fn court(area: PlayArea) -> PlayArea {
    PlayArea {
        x: area.x + 1,
        y: area.y + 1,
        w: area.w.saturating_sub(1),
        h: area.h.saturating_sub(2),
    }
}

pub(crate) fn arena_for(area: PlayArea) -> Bounds {
    let court = court(area);
    Bounds::new(court.w as f32 * PX_PER_COL, court.h as f32 * PX_PER_ROW).with_ball(
        BALL_COLS as f32 * PX_PER_COL,
        BALL_ROWS as f32 * PX_PER_ROW,
    )
}

/* -----------------------------
   Sprites: <mood-key>_<frame>
------------------------------ */

fn sprite(name: &str) -> &'static [&'static str] {
    match name {
        "happy_1" => &[
            r"  /\_/\  ",
            r" ( ^.^ ) ",
            r"  > ^ <  ",
            r" /|   |\ ",
            r"  d   b  ",
        ],
        "happy_2" => &[
            r" \/\_/\/ ",
            r" ( ^o^ ) ",
            r"  > ^ <  ",
            r"  |   |  ",
            r" d     b ",
        ],
        "tired_1" => &[
            r"  /\_/\  ",
            r" ( -.- ) ",
            r"  > ~ <  z",
            r"  |   |  ",
            r"  d   b  ",
        ],
        "tired_2" => &[
            r"  /\_/\ Z",
            r" ( -_- ) ",
            r"  > ~ <  ",
            r"  |   |  ",
            r"  d   b  ",
        ],
        "sad_1" => &[
            r"  /\_/\  ",
            r" ( ;.; ) ",
            r"  > n <  ",
            r"  |   |  ",
            r"  d   b  ",
        ],
        "sad_2" => &[
            r"  /\_/\  ",
            r" ( T.T ) ",
            r"  > n <  ",
            r"  |   |  ",
            r"  d   b  ",
        ],
        "bored_1" => &[
            r"  /\_/\  ",
            r" ( -.- ) ",
            r"  > _ < .",
            r"  |   |  ",
            r"  d   b  ",
        ],
        "bored_2" => &[
            r"  /\_/\  ",
            r" ( o.- ) ",
            r"  > _ <..",
            r"  |   |  ",
            r"  d   b  ",
        ],
        "normal_2" => &[
            r"  /\_/\  ",
            r" ( o.o ) ",
            r"  > - <  ",
            r"  |   |  ",
            r"  d   b  ",
        ],
        _ => &[
            r"  /\_/\  ",
            r" ( o.o ) ",
            r"  > ^ <  ",
            r"  |   |  ",
            r"  d   b  ",
        ],
    }
}

fn mood_color(mood: Mood, color: bool) -> Color {
    if !color {
        return Color::White;
    }
    match mood {
        Mood::Happy => Color::Yellow,
        Mood::Normal => Color::White,
        Mood::Tired | Mood::Sleeping => Color::DarkBlue,
        Mood::Sad => Color::Blue,
        Mood::Bored => Color::DarkGrey,
    }
}

/* -----------------------------
   Drawing
------------------------------ */

pub(crate) struct View<'a> {
    pub(crate) pet: &'a Pet,
    pub(crate) now: Millis,
    pub(crate) scene: Scene,
    pub(crate) composer: &'a str,
    pub(crate) color: bool,
    pub(crate) service: &'a str,
    pub(crate) last_saved: Option<&'a str>,
}

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(
            xx,
            y,
            Cell {
                ch,
                fg,
                bg: Color::Black,
            },
        );
    }
}

fn bar(value01: f32, width: usize) -> String {
    let v = value01.clamp(0.0, 1.0);
    let fill = (v * width as f32 + 0.5) as usize;
    let mut s = String::new();
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

/// Greedy word wrap; words longer than `width` are split.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        let need = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
        if need > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

pub(crate) fn draw_view(buf: &mut CellBuffer, v: &View) {
    buf.clear();
    let area = play_area(buf.w, buf.h);
    draw_panel(buf, v, area);
    draw_screen(buf, v, area);
    draw_footer(buf, v);

    match v.scene {
        Scene::Log => draw_log(buf, v),
        Scene::Help => draw_center_box(
            buf,
            "Cómo jugar",
            &[
                "Mantén a tu mascota feliz, descansada y entretenida.",
                "",
                "A  acariciar: +felicidad",
                "J  jugar: pelota y un dato curioso (gasta energía)",
                "D  dormir: +energía",
                "T  hablar con la mascota",
                "L  historial de la conversación",
                "",
                "El aburrimiento sube solo con el tiempo.",
                "Esc o H para cerrar.",
            ],
        ),
        Scene::Main | Scene::Chat => {}
    }
}

fn draw_panel(buf: &mut CellBuffer, v: &View, area: PlayArea) {
    let fg = Color::White;
    let mood = v.pet.mood(v.now);
    draw_text(buf, 1, 0, "TamagotchIA", fg);
    let label = format!("Ánimo: {}", v.pet.mood_text());
    draw_text(buf, 1, 2, &label, mood_color(mood, v.color));

    let stats = v.pet.stats();
    let lines = [
        ("Felicidad ", StatKind::Happiness),
        ("Energía   ", StatKind::Energy),
        ("Aburrim.  ", StatKind::Boredom),
    ];
    let bar_w = (area.x as usize).saturating_sub(18).clamp(4, 14);
    for (i, (name, kind)) in lines.iter().enumerate() {
        let s = format!(
            "{name}{} {:>3}%",
            bar(stats.get(*kind) / 100.0, bar_w),
            stats.percent(*kind)
        );
        draw_text(buf, 1, 4 + i as u16, &s, fg);
    }

    draw_text(buf, 1, 8, &format!("Sprite: {}", v.pet.sprite_name(v.now)), Color::DarkGrey);
}

fn draw_screen(buf: &mut CellBuffer, v: &View, area: PlayArea) {
    if area.w < 12 || area.h < 8 {
        return;
    }
    let border = if v.color { Color::DarkGrey } else { Color::White };
    for x in area.x..area.x + area.w {
        buf.set(x, area.y, Cell { ch: '─', fg: border, bg: Color::Black });
        buf.set(x, area.y + area.h - 1, Cell { ch: '─', fg: border, bg: Color::Black });
    }
    for y in area.y..area.y + area.h {
        buf.set(area.x, y, Cell { ch: '│', fg: border, bg: Color::Black });
    }

    let mood = v.pet.mood(v.now);
    let art = sprite(&v.pet.sprite_name(v.now));
    let art_w = art.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u16;
    let sx = area.x + area.w.saturating_sub(art_w) / 2;
    let sy = area.y + area.h.saturating_sub(art.len() as u16) / 2 + 2;
    for (i, line) in art.iter().enumerate() {
        draw_text(buf, sx, sy + i as u16, line, mood_color(mood, v.color));
    }

    draw_bubbles(buf, v, area, sy);

    let physics = v.pet.physics();
    if physics.is_active() {
        let ball = physics.ball();
        let court = court(area);
        let bx = court.x + (ball.x / PX_PER_COL).round() as u16;
        let by = court.y + (ball.y / PX_PER_ROW).round() as u16;
        let fg = if v.color { Color::Red } else { Color::White };
        draw_text(buf, bx, by, "()", fg);
    }
}

fn draw_bubbles(buf: &mut CellBuffer, v: &View, area: PlayArea, sprite_top: u16) {
    let width = (area.w as usize).saturating_sub(6).min(40);
    if width < 8 {
        return;
    }
    let mut y = area.y + 1;
    for b in v.pet.bubbles().iter() {
        let fg = match (b.speaker, b.is_fading(v.now), v.color) {
            (_, true, _) => Color::DarkGrey,
            (Speaker::Pet, false, true) => Color::Cyan,
            (Speaker::User, false, true) => Color::Green,
            _ => Color::White,
        };
        let x = match b.speaker {
            Speaker::Pet => area.x + 2,
            Speaker::User => area.x + area.w.saturating_sub(width as u16 + 2),
        };
        for line in wrap(&b.text, width) {
            if y + 1 >= sprite_top {
                return;
            }
            draw_text(buf, x, y, &line, fg);
            y += 1;
        }
    }
}

fn draw_footer(buf: &mut CellBuffer, v: &View) {
    let fg = Color::White;
    let y = buf.h.saturating_sub(1);
    match v.scene {
        Scene::Chat => {
            let line = format!("> {}_", v.composer);
            draw_text(buf, 1, y, &line, Color::Green);
            draw_text(buf, 1, y.saturating_sub(1), "Enter enviar | Esc cancelar", Color::DarkGrey);
        }
        _ => {
            let keys = "a acariciar | j jugar | d dormir | t hablar | l historial | h ayuda | q salir";
            draw_text(buf, 1, y, keys, fg);
            let status = match v.last_saved {
                Some(at) => format!("chat: {}  |  guardado {at}", v.service),
                None => format!("chat: {}", v.service),
            };
            draw_text(buf, 1, y.saturating_sub(1), &status, Color::DarkGrey);
        }
    }
}

fn draw_log(buf: &mut CellBuffer, v: &View) {
    let mut lines = Vec::new();
    let width = min(56, buf.w.saturating_sub(8)) as usize;
    for e in v.pet.history().iter() {
        let who = match e.role {
            ChatRole::User => "tú",
            ChatRole::Model => "mascota",
        };
        for (i, l) in wrap(&e.text, width.saturating_sub(10)).into_iter().enumerate() {
            if i == 0 {
                lines.push(format!("{who:>8}: {l}"));
            } else {
                lines.push(format!("{:>8}  {l}", ""));
            }
        }
    }
    if lines.is_empty() {
        lines.push("(sin mensajes)".to_string());
    }
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    draw_center_box(buf, "Historial", &refs);
}

fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &[&str]) {
    let w = buf.w;
    let h = buf.h;
    let bw = min(64, w.saturating_sub(4));
    let bh = min(body.len() as u16 + 4, h.saturating_sub(2));
    if bw < 4 || bh < 4 {
        return;
    }
    let x0 = (w - bw) / 2;
    let y0 = (h - bh) / 2;
    let fg = Color::White;

    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            let ch = match (x == x0, x == x0 + bw - 1, y == y0, y == y0 + bh - 1) {
                (true, _, true, _) => '┌',
                (_, true, true, _) => '┐',
                (true, _, _, true) => '└',
                (_, true, _, true) => '┘',
                (_, _, true, _) | (_, _, _, true) => '─',
                (true, _, _, _) | (_, true, _, _) => '│',
                _ => ' ',
            };
            buf.set(x, y, Cell { ch, fg, bg: Color::Black });
        }
    }
    draw_text(buf, x0 + 2, y0 + 1, title, fg);

    // keep the newest lines when the body does not fit
    let room = (bh - 3) as usize;
    let skip = body.len().saturating_sub(room);
    for (i, line) in body.iter().skip(skip).enumerate() {
        let clipped: String = line.chars().take((bw - 4) as usize).collect();
        draw_text(buf, x0 + 2, y0 + 2 + i as u16, &clipped, fg);
    }
}
