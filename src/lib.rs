#![forbid(unsafe_code)]

pub mod app;
pub mod badges;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod roster;
