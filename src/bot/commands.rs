/// An inbound slash command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Latest,
    MySources,
    Autopost(Vec<String>),
    Cancel,
    AddSource(Option<String>),
    RemoveSource(Option<String>),
    ListSources,
    Broadcast(Option<String>),
    Unknown(String),
}

impl Command {
    /// `None` for text that is not a command. Names are case-sensitive and
    /// may carry the `@botname` suffix Telegram adds in groups.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        let (head, rest) = match text.find(char::is_whitespace) {
            Some(idx) => (&text[..idx], text[idx..].trim()),
            None => (text, ""),
        };
        let name = head.split('@').next().unwrap_or(head);
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        let command = match name {
            "/start" => Command::Start,
            "/help" => Command::Help,
            "/latest" => Command::Latest,
            "/mysources" => Command::MySources,
            "/autopost" => Command::Autopost(
                rest.split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "/cancel" => Command::Cancel,
            "/addsource" => Command::AddSource(arg),
            "/removesource" => Command::RemoveSource(arg),
            "/listsources" => Command::ListSources,
            "/broadcast" => Command::Broadcast(arg),
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Command::AddSource(_) | Command::RemoveSource(_) | Command::ListSources | Command::Broadcast(_)
        )
    }
}

pub const PUBLIC_COMMANDS: &str = "/start - show your profile\n\
/latest - latest news from your sources\n\
/mysources - choose your sources\n\
/autopost - schedule news digests\n\
/cancel - cancel the current operation\n\
/help - list commands";

pub const ADMIN_COMMANDS: &str = "/addsource - add a source\n\
/removesource - remove a source\n\
/listsources - list all sources\n\
/broadcast - message every user";

pub fn help_text(is_admin: bool) -> String {
    if is_admin {
        format!("{PUBLIC_COMMANDS}\n\nAdmin commands:\n{ADMIN_COMMANDS}")
    } else {
        PUBLIC_COMMANDS.to_string()
    }
}
