//! Output renderers for check reports.

mod human;
mod json;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
