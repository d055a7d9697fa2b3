pub mod clock;
pub mod config;
pub mod observer;
pub mod runner;
pub mod scheduler;
pub mod timers;
