//! CourseHub - A course community backend
//!
//! Course forums, direct messaging and a notification feed behind a JSON
//! HTTP API, plus a typed client for that API.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
