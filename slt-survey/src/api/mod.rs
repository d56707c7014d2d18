//! HTTP API handlers for slt-survey

pub mod health;
pub mod media;
pub mod sessions;
pub mod ui;

pub use health::health_routes;
pub use media::media_routes;
pub use sessions::session_routes;
pub use ui::ui_routes;
