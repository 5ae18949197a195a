#![forbid(unsafe_code)]

pub mod adapter;
pub mod addr;
pub mod buffer;
pub mod codec;
pub mod metadata;
pub mod mime;
pub mod route;
pub mod strategies;

pub use mime::MimeType;
pub use strategies::{Strategies, StrategiesBuilder};
