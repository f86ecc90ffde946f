pub mod api;
pub mod auction;
pub mod bidding;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod notification;
pub mod preferences;
pub mod sync;
pub mod views;
