// Declare submodules
pub mod notification_service;
pub mod notifier;

// Re-export public items
pub use notification_service::ReminderService;
pub use notifier::Notifier;
