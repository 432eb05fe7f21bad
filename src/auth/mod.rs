use crate::state::AppState;
use axum::Router;

mod code;
mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod tokens;
mod password;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::user_routes())
}
