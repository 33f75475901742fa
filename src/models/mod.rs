// Domain models

mod traffic;

pub use traffic::{TrafficSnapshot, TrafficTotals};
