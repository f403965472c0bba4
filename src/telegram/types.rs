/// Telegram rejects longer messages; leave room for a trailing marker.
pub const MAX_MESSAGE_LEN: usize = 3900;

/// Telegram limits callback data to 64 bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

/// Inline keyboard, one `Vec` per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// A message the bot sends or an edit it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// text is Telegram HTML and must be sent with that parse mode
    pub html: bool,
}

impl Outgoing {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: truncate(text.into()),
            keyboard: None,
            html: false,
        }
    }

    /// Caller is responsible for escaping interpolated values.
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: truncate(text.into()),
            keyboard: None,
            html: true,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = (!keyboard.is_empty()).then_some(keyboard);
        self
    }
}

fn truncate(text: String) -> String {
    if text.len() <= MAX_MESSAGE_LEN {
        return text;
    }
    let mut cut = MAX_MESSAGE_LEN;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n…", &text[..cut])
}
