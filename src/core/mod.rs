pub mod clock;
pub mod drainer;
pub mod error;
pub mod message;
pub mod queue;
pub mod sink;
pub mod subscriber;
pub mod tempo;
