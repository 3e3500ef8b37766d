pub mod state;

pub use state::{
    ChatSettings, ResponderKind, ResponderSettings, SettingsError, SettingsStore, ThemeMode,
};
