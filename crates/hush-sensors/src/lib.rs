//! Evidence collectors for one observation window.
//!
//! Each sensor captures a snapshot before the action, optionally listens on
//! the page event stream while the action runs, captures again after, and
//! reduces the pair to a typed summary. `SensorBank` owns one of each and
//! turns any sensor failure into that sensor's empty summary plus a silence
//! entry, so a broken sensor never aborts an interaction.

pub mod aria;
pub mod bank;
pub mod console;
pub mod dom;
pub mod focus;
pub mod loading;
pub mod navigation;
pub mod network;
pub mod sensor;
pub mod state;
pub mod timing;
pub mod ui_signal;

pub use bank::SensorBank;
pub use dom::content_hash;
pub use sensor::{Sensor, SensorError};
