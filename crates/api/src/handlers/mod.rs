pub mod assessment;
pub mod fluency_gate;
pub mod queue;
pub mod review_events;
pub mod session;
pub mod stats;
