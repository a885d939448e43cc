pub mod composition;
pub mod config;
pub mod error;
pub mod events;
pub mod gesture;
pub mod qr;
pub mod render;
pub mod session;
pub mod sink;
pub mod transform;
pub mod processing {
    pub mod color;
    pub mod layout;
}
pub mod tasks {
    pub mod capture;
    pub mod loader;
}

pub use error::{Error, Result};
