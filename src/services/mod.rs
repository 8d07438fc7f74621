pub mod poll_service;

pub use poll_service::{
    wait_for_shutdown, PollLoop, PollState, PollStats, RunSummary, TickReport, Termination,
};
