pub mod auth;
pub mod color;
pub mod config;
pub mod db;
pub mod demo;
pub mod domain;
pub mod error;
pub mod escalation;
pub mod export;
pub mod lifecycle;
pub mod normalize;
pub mod repo;
pub mod report;
pub mod session;
pub mod store;
pub mod theme;
pub mod validate;
