use crate::auth::init_data::TelegramUser;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub ok: bool,
    pub user: TelegramUser,
}
