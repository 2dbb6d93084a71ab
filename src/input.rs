use crate::model::Scene;
use crate::sim::PlayerAction;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Debug)]
pub(crate) struct InputEvent {
    pub(crate) key: KeyCode,
    pub(crate) mods: KeyModifiers,
}

pub(crate) fn collect_input_nonblocking() -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();
    while event::poll(Duration::ZERO)? {
        if let Event::Key(k) = event::read()? {
            if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                out.push(InputEvent {
                    key: k.code,
                    mods: k.modifiers,
                });
                if out.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(out)
}

pub(crate) fn map_event_to_action(scene: Scene, ev: &InputEvent) -> Option<PlayerAction> {
    if ev.mods.contains(KeyModifiers::CONTROL) && ev.key == KeyCode::Char('c') {
        return Some(PlayerAction::Quit);
    }

    // While typing every printable key belongs to the message.
    if scene == Scene::Chat {
        return match ev.key {
            KeyCode::Enter => Some(PlayerAction::ChatSubmit),
            KeyCode::Esc => Some(PlayerAction::Back),
            KeyCode::Backspace => Some(PlayerAction::ChatBackspace),
            KeyCode::Char(ch) => Some(PlayerAction::ChatChar(ch)),
            _ => None,
        };
    }

    match ev.key {
        KeyCode::Char('h') | KeyCode::Char('H') => return Some(PlayerAction::HelpToggle),
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(PlayerAction::Quit),
        KeyCode::Esc => return Some(PlayerAction::Back),
        _ => {}
    }

    match scene {
        Scene::Main => match ev.key {
            KeyCode::Char('a') | KeyCode::Char('A') => Some(PlayerAction::Pet),
            KeyCode::Char('j') | KeyCode::Char('J') => Some(PlayerAction::Play),
            KeyCode::Char('d') | KeyCode::Char('D') => Some(PlayerAction::Sleep),
            KeyCode::Char('t') | KeyCode::Char('T') | KeyCode::Enter => {
                Some(PlayerAction::ChatOpen)
            }
            KeyCode::Char('l') | KeyCode::Char('L') => Some(PlayerAction::LogToggle),
            _ => None,
        },
        Scene::Log => match ev.key {
            KeyCode::Char('l') | KeyCode::Char('L') => Some(PlayerAction::LogToggle),
            _ => None,
        },
        Scene::Help | Scene::Chat => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> InputEvent {
        InputEvent {
            key: code,
            mods: KeyModifiers::NONE,
        }
    }

    #[test]
    fn main_scene_keys_trigger_actions() {
        let m = |c| map_event_to_action(Scene::Main, &key(KeyCode::Char(c)));
        assert_eq!(m('a'), Some(PlayerAction::Pet));
        assert_eq!(m('J'), Some(PlayerAction::Play));
        assert_eq!(m('d'), Some(PlayerAction::Sleep));
        assert_eq!(m('t'), Some(PlayerAction::ChatOpen));
        assert_eq!(m('z'), None);
    }

    #[test]
    fn chat_scene_captures_letters() {
        let a = map_event_to_action(Scene::Chat, &key(KeyCode::Char('q')));
        assert_eq!(a, Some(PlayerAction::ChatChar('q')));
        let a = map_event_to_action(Scene::Chat, &key(KeyCode::Enter));
        assert_eq!(a, Some(PlayerAction::ChatSubmit));
    }

    #[test]
    fn ctrl_c_quits_everywhere() {
        let ev = InputEvent {
            key: KeyCode::Char('c'),
            mods: KeyModifiers::CONTROL,
        };
        assert_eq!(map_event_to_action(Scene::Chat, &ev), Some(PlayerAction::Quit));
        assert_eq!(map_event_to_action(Scene::Help, &ev), Some(PlayerAction::Quit));
    }
}
