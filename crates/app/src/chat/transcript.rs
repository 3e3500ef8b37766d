use popchat_conversation::{MessageRecord, Origin};

use crate::settings::ThemeMode;

const RESET: &str = "\x1b[0m";
const MS_PER_MINUTE: u64 = 60_000;
const MINUTES_PER_DAY: u64 = 24 * 60;

/// ANSI styling for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub user: &'static str,
    pub peer: &'static str,
    pub meta: &'static str,
}

impl Palette {
    pub const LIGHT: Self = Self {
        user: "\x1b[1;34m",
        peer: "\x1b[30;47m",
        meta: "\x1b[2m",
    };

    pub const DARK: Self = Self {
        user: "\x1b[1;94m",
        peer: "\x1b[97;100m",
        meta: "\x1b[2;37m",
    };

    pub const fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::Light => Self::LIGHT,
            ThemeMode::Dark => Self::DARK,
        }
    }
}

/// Renders one record as a single terminal line.
///
/// User records are indented to read as right-aligned bubbles. Times are `HH:MM` in UTC,
/// not the viewer's local zone.
pub fn render_record(record: &MessageRecord, theme: ThemeMode) -> String {
    let palette = Palette::for_theme(theme);
    let time = clock_time(record.created_at_unix_ms);
    match record.origin {
        Origin::User => format!(
            "{:>8}{}{}{RESET} {}{time}{RESET}",
            "",
            palette.user,
            record.text,
            palette.meta
        ),
        Origin::Peer => format!(
            "{} {} {RESET} {}{time}{RESET}",
            palette.peer, record.text, palette.meta
        ),
        _ => format!("{}{} {time}{RESET}", palette.meta, record.text),
    }
}

pub fn render_transcript(records: &[MessageRecord], theme: ThemeMode) -> String {
    records
        .iter()
        .map(|record| render_record(record, theme))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `HH:MM` in UTC.
fn clock_time(unix_ms: u64) -> String {
    let minute_of_day = (unix_ms / MS_PER_MINUTE) % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minute_of_day / 60, minute_of_day % 60)
}
