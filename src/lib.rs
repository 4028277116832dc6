//! Goal Compass — onboarding wizard engine.
//!
//! A fifteen-step guided flow that turns a new user's answers into goals,
//! values, projects, habits and settings. Start with
//! [`onboarding::Navigator`].

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
pub mod telemetry;
