pub mod api;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod detection;
pub mod error;
pub mod estimation;
pub mod pricing;
pub mod recommend;
pub mod state;
pub mod store;
