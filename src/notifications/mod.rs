use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod model;
pub mod push;
pub mod services;

pub use push::PushNotifier;

pub fn router() -> Router<AppState> {
    handlers::notification_routes()
}
