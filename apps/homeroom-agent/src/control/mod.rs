pub mod ack;
pub mod executor;
mod handlers;
pub mod lock;
pub mod notify;
pub mod status;
