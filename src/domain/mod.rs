mod bucket;
mod calendar;
mod event;
mod graph;
mod metrics;
mod money;

pub use bucket::*;
pub use calendar::*;
pub use event::*;
pub use graph::*;
pub use metrics::*;
pub use money::*;
