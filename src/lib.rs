//! Yatube: a small social blogging service with posts, groups, comments,
//! follows and private messages.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
