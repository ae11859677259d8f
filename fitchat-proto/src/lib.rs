//! Shared protocol definitions for the FitChat messaging wire format.

pub mod codec;
pub mod event;
pub mod message;
pub mod room;
