//! Yatube: posts, groups, comments and author follows served as
//! server-rendered pages.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
