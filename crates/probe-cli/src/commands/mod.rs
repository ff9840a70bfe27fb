//! Command implementations for the CLI.

mod decode;
mod series;
mod simulate;

pub use decode::cmd_decode;
pub use series::cmd_series;
pub use simulate::cmd_simulate;
