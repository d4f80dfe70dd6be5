//! Client core for the academic-records admin: a typed gateway client, the
//! per-student score grid, debounced list search, dashboard helpers and
//! create/edit sessions.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod scores;
pub mod search;

pub use config::Config;
pub use error::GatewayError;
pub use gateway::HttpGateway;
pub use scores::{ScoreMatrix, ScoreStore};
pub use search::{ListQuery, PagedList, SearchController, SearchState};
