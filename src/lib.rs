pub mod collar;
pub mod config;
pub mod coordinator;
pub mod gps;
pub mod map;
pub mod service;
pub mod signal;
pub mod state_machine;
pub mod timer;
