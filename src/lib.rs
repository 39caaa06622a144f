pub mod clients;
pub mod configuration;
pub mod detection;
pub mod error_handling;
pub mod monitor;
pub mod network;
pub mod session_tracking;
pub mod storage;
