#![forbid(unsafe_code)]

pub mod address;
pub mod candidates;
pub mod canonical;
pub mod captions;
pub mod cli;
pub mod compile;
pub mod config;
pub mod episode;
pub mod formats;
pub mod logging;
pub mod openai;
pub mod overlay;
pub mod provider;
pub mod review;
pub mod scaffold;
pub mod schema;
pub mod selection;
pub mod transcode;
