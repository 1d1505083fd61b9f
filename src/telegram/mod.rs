// Declare submodules
pub mod bot;
pub mod client;

// Re-export public items
pub use bot::CommandBot;
pub use client::{TelegramClient, TelegramError};
