pub mod detector;
pub mod enforcement;

pub use detector::{Anomaly, AnomalyDetector};
pub use enforcement::EnforcementController;
