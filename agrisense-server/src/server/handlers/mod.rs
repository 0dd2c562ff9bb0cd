pub mod accounts;
pub mod bookings;
pub mod chat_sessions;
pub mod crop_prices;
pub mod crop_recommendation;
pub mod disease;
pub mod health;
pub mod items;
pub mod weather_alerts;
