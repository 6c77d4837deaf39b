use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod model;
pub mod services;

pub use model::{Landing, Role, UserProfile};

pub fn router() -> Router<AppState> {
    handlers::profile_routes()
}
