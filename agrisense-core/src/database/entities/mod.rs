pub mod auth_tokens;
pub mod bookings;
pub mod chat_messages;
pub mod chat_sessions;
pub mod crop_recommendations;
pub mod items;
pub mod model_performance;
pub mod user_profiles;
pub mod users;
pub mod weather_alerts;
pub mod weather_data;
