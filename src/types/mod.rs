//! Core value types used during evaluation
mod interval;

pub use interval::{Interval, Interval4};
