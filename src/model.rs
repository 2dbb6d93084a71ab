pub(crate) const MESSAGE_MAX: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scene {
    Main,
    Chat,
    Log,
    Help,
}

/// Line editor for the chat prompt.
#[derive(Clone, Debug, Default)]
pub(crate) struct Composer {
    buf: String,
}

impl Composer {
    pub(crate) fn push(&mut self, ch: char) {
        if self.buf.chars().count() < MESSAGE_MAX && !ch.is_control() {
            self.buf.push(ch);
        }
    }

    pub(crate) fn backspace(&mut self) {
        self.buf.pop();
    }

    pub(crate) fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn text(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composer_edits_and_drains() {
        let mut c = Composer::default();
        for ch in "hola\u{7}ñ".chars() {
            c.push(ch);
        }
        assert_eq!(c.text(), "holañ");
        c.backspace();
        assert_eq!(c.take(), "hola");
        assert_eq!(c.text(), "");
    }

    #[test]
    fn composer_stops_at_limit() {
        let mut c = Composer::default();
        for _ in 0..MESSAGE_MAX + 10 {
            c.push('a');
        }
        assert_eq!(c.text().len(), MESSAGE_MAX);
    }
}
