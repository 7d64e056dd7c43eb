pub mod alert;
pub mod bar;
pub mod signal;
pub mod snapshot;
pub mod tick;
