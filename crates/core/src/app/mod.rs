//! Application state and the controller that drives it. The desktop surface
//! and the worker CLI both go through [`Controller`]; nothing here renders.

pub mod controller;
pub mod slot;

pub use controller::{AppState, Controller, MarketScan, Notice, NoticeLevel, Outcome, View};
pub use slot::{RequestSlot, SlotState};
