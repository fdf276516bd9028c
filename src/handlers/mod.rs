pub mod config;
pub mod message;
pub mod messages;
pub mod recognize;
pub mod synthesize;

pub use config::*;
pub use message::*;
pub use messages::*;
pub use recognize::*;
pub use synthesize::*;
