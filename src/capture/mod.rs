pub mod autopilot;
pub mod motion;
pub mod pointer_lock;
pub mod state;
