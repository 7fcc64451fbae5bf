mod next_points_config;
mod selector;

pub use next_points_config::*;
pub use selector::*;
