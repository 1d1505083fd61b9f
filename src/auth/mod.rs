// Declare submodules
pub mod auth_dto;
pub mod auth_handlers;
pub mod auth_middleware;
pub mod init_data;

// Re-export public items
pub use auth_middleware::{auth_middleware, CurrentUser, INIT_DATA_HEADER};
pub use init_data::{verify_init_data, InitData, InitDataError, TelegramUser};
