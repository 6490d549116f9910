pub mod audit;
pub mod collector;
pub mod collector_command;
pub mod collector_http;
pub mod dedup;
pub mod discovery;
pub mod health;
pub mod item;
pub mod lock;
pub mod maintenance;
pub mod metrics;
pub mod migrate;
pub mod paths;
pub mod patrol;
pub mod rotation;
pub mod sink;
pub mod state;
pub mod util;
pub mod warn;
pub mod watchlist;
