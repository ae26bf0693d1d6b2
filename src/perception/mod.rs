pub mod resolver;
pub mod screenshot;
pub mod types;

pub use resolver::selector_candidates;
pub use screenshot::ScreenshotStore;
pub use types::{ElementType, Selector};
