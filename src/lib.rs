//! A personal finance backend. Users keep monthly budgets made of categories, transactions and
//! plans, and reach them through a GraphQL API served over HTTP or run from the command line.

pub mod args;
mod auth;
mod backup;
pub mod commands;
mod config;
mod db;
mod error;
pub mod graphql;
pub mod model;
pub mod server;
mod utils;

pub use auth::{SessionPolicy, Viewer};
pub use config::Config;
pub use error::{Error, ErrorType, IntoResult, Result};
