pub mod config;
pub mod constants;
pub mod conversion;
pub mod events;
pub mod probe;
pub mod services;
pub mod state;
