// Declare submodules
pub mod settings_dto;
pub mod settings_handlers;
pub mod settings_models;
pub mod settings_repository;

// Re-export public items
pub use settings_dto::{SettingsResponse, UpdateSettingsRequest};
pub use settings_handlers::{get_settings, put_settings};
pub use settings_models::UserSettings;
pub use settings_repository::SettingsRepository;
