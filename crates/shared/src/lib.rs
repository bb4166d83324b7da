pub mod chat;
pub mod prefs;
