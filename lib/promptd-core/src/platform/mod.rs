pub use common::*;
pub use event_bridge::*;
pub use headless::HeadlessSurfaceFactory;
pub use traits::*;

mod common;
mod event_bridge;
mod headless;
pub mod mock;
mod traits;
