//! Result management core for a university: grading, course/semester rules,
//! the result approval lifecycle and academic aggregates, with a Postgres
//! store and an in-process store behind the same traits.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod grade;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod period;
pub mod privilege;
pub mod report;
pub mod semester;
pub mod service;
pub mod store;
