//! Adaptive practice engine: answer history, weighted remediation pools and
//! practice sessions.

pub mod config;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{Config, PracticeSettings};
pub use services::session_service::{
    PracticeSession, PracticeSessionController, PracticeStart, SessionStep,
};
pub use services::{AppState, Collaborators};
