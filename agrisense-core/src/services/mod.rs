pub mod auth_service;
pub mod booking_service;
pub mod chat_history_service;
pub mod diagnosis_service;
pub mod item_service;
pub mod price_service;
pub mod profile_service;
pub mod recommendation_service;
pub mod weather_alert_service;

pub use auth_service::*;
pub use booking_service::*;
pub use chat_history_service::*;
pub use diagnosis_service::*;
pub use item_service::*;
pub use price_service::*;
pub use profile_service::*;
pub use recommendation_service::*;
pub use weather_alert_service::*;
