//! Core domain types

pub mod activity;
pub mod authorization;
pub mod event;
pub mod participant;
pub mod primitives;

pub use activity::*;
pub use authorization::*;
pub use event::*;
pub use participant::*;
pub use primitives::*;
