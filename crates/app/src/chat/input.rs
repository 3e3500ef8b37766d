/// One line read from the terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Plain text to submit. May still be blank; the controller decides.
    Send(String),
    ToggleTheme,
    Quit,
}

impl InputCommand {
    /// Parses a raw line. Enter submits, so only the trailing line ending is stripped.
    pub fn parse(line: &str) -> Self {
        let content = line
            .strip_suffix('\n')
            .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
            .unwrap_or(line);

        match content.trim() {
            "/theme" => Self::ToggleTheme,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Send(content.to_string()),
        }
    }
}
