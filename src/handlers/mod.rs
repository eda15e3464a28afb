//! HTTP 处理器模块

pub mod auth;
pub mod browser;
pub mod extract;
pub mod goals;
pub mod health;
pub mod metrics;
pub mod oauth;
pub mod users;
pub mod workouts;
