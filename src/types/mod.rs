//! Value types for light control parameters.

mod brightness;
mod power;

pub use brightness::Brightness;
pub use power::PowerState;
