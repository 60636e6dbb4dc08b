pub mod pipeline;
pub mod recognition;
pub mod shared;
pub mod translation;
