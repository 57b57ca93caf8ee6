//! The individual build steps.
//!
//! Each step exposes a plain function doing the work and a `task` function
//! with the signature expected by [`TaskDef::run`](crate::TaskDef::run).

pub mod fonts;
pub mod hugo;
pub mod scripts;
pub mod styles;
