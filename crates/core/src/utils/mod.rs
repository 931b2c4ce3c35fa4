pub mod clock;
pub mod text;

pub use clock::{to_chrono_seconds, Clock, ManualClock, SystemClock};
