// src/pipeline/mod.rs

pub mod clock;
pub mod event_bus;
pub mod frame_context;
pub mod metrics;
pub mod session;

pub use clock::{Clock, ReplayClock, SystemClock};
pub use event_bus::AlertEvent;
pub use frame_context::FrameContext;
pub use metrics::MetricsSummary;
pub use session::{Session, SessionEnd};
