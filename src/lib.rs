pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod proxy;
pub mod ratelimit;
pub mod storage;
pub mod tools;
