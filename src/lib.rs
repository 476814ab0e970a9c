pub mod app;
pub mod builder;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod expression;
pub mod graph;
pub mod identity;
pub mod metadata;
pub mod output;
pub mod report;
pub mod store;
pub mod turtle;
pub mod vocab;
