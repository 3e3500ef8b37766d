use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use popchat::build_session;
use popchat::chat::{
    ExchangeState, InputCommand, Palette, SessionController, SessionEvent, render_record,
    render_transcript,
};
use popchat::settings::{SettingsStore, ThemeMode};

const RESET: &str = "\x1b[0m";

/// Terminal front end: Enter sends, `/theme` toggles dark mode, `/quit` exits.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr so they never interleave with the transcript on stdout.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    let settings = store.settings();
    let mut session = build_session(&settings)?;
    let mut events = session.subscribe();

    print_header(session.theme());
    println!("{}", render_transcript(&session.snapshot(), session.theme()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interactive = true;

    while interactive {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // Piped input: let outstanding replies land before exiting.
                    settle_remaining(&mut session, &mut events).await;
                    break;
                };
                interactive = handle_line(&line, &mut session, &store);
            }
            Some(_) = session.settle_next(), if session.is_busy() => {}
            Some(event) = events.recv() => render_event(&event, &session),
        }
    }

    // Deliver whatever was queued before the loop ended.
    while let Ok(event) = events.try_recv() {
        render_event(&event, &session);
    }

    let records = session.shutdown();
    tracing::info!(records = records.len(), "popchat exiting");
    Ok(())
}

/// Returns false when the user asked to quit.
fn handle_line(line: &str, session: &mut SessionController, store: &SettingsStore) -> bool {
    match InputCommand::parse(line) {
        InputCommand::Quit => return false,
        InputCommand::ToggleTheme => {
            let theme = session.toggle_theme();
            if let Err(error) = store.update_theme(theme) {
                tracing::warn!(error = %error, "failed to persist theme");
            }
        }
        InputCommand::Send(text) => match session.submit(&text) {
            Ok(_) => {}
            Err(error) if error.is_validation() => {}
            Err(error) => {
                let palette = Palette::for_theme(session.theme());
                println!("{}{error}{RESET}", palette.meta);
            }
        },
    }
    true
}

async fn settle_remaining(
    session: &mut SessionController,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) {
    while session.settle_next().await.is_some() {
        while let Ok(event) = events.try_recv() {
            render_event(&event, session);
        }
    }
}

fn render_event(event: &SessionEvent, session: &SessionController) {
    let theme = session.theme();
    let palette = Palette::for_theme(theme);
    match event {
        SessionEvent::MessageAppended(record) => println!("{}", render_record(record, theme)),
        SessionEvent::ThemeChanged(_) => {
            print_header(theme);
            println!("{}", render_transcript(&session.snapshot(), theme));
        }
        SessionEvent::StateChanged(ExchangeState::Awaiting(_)) => {
            println!("{}typing...{RESET}", palette.meta);
        }
        SessionEvent::MessageReceived(_)
        | SessionEvent::ReplyFailed(_)
        | SessionEvent::StateChanged(_) => {}
    }

    if let Some(toast) = event.toast() {
        println!("{}[{toast}]{RESET}", palette.meta);
    }
}

fn print_header(theme: ThemeMode) {
    let palette = Palette::for_theme(theme);
    let mode = theme.name();
    println!(
        "{}Snapchat Chat ({mode} mode){RESET}  {}/theme toggles, /quit exits{RESET}",
        palette.user, palette.meta
    );
}
