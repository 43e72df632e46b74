//! Robots.txt handling module
//!
//! This module provides fetching, parsing and per-host caching of
//! robots.txt files. It is consulted before every target fetch when
//! `respect-robots` is enabled.

mod cache;
mod parser;

pub use cache::{robots_url, RobotsCache};
pub use parser::ParsedRobots;
