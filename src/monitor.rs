pub mod scheduler;

pub use scheduler::{Monitor, MonitorState};
