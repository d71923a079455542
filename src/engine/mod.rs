pub mod analytics;
pub mod observers;
pub mod path;
pub mod persistence;
pub mod simulator;
pub mod timer;
