pub mod api;
pub mod realtime;
pub mod settings;
pub mod tui;
