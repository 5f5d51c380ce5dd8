//! HTTP server and CLI for the Webfootprint analyzer.

pub mod cli;
pub mod rest;
