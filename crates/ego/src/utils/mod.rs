mod cancellation;
mod misc;

pub use cancellation::*;
pub use misc::*;
