pub mod driver;
pub mod observer;
pub mod state;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use driver::TaskPoller;
pub use observer::TaskObserver;
pub use state::{FetchTicket, PollEvent, PollerCore, PollerState};
pub use tracker::track_job;
