pub mod batch;
pub mod cli;
pub mod field;
pub mod input;
pub mod models;
pub mod output;
pub mod scrape;
pub mod session;
pub mod signals;
pub mod sites;
pub mod util;
pub mod wait;
