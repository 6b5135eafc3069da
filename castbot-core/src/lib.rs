// src/lib.rs

pub mod alerts;
pub mod auth;
pub mod eventbus;
pub mod platforms;
pub mod repositories;
pub mod services;
pub mod session;
pub mod tasks;
pub mod utils;

pub use castbot_common::error::Error;
pub use castbot_common::models;
pub use session::{ChannelSession, SessionServices};
