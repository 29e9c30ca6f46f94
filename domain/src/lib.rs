pub mod entity;
pub mod error;
pub mod event;
pub mod port;
pub mod service;

pub use entity::*;
pub use error::DomainError;
pub use event::*;
pub use port::*;
pub use service::*;
