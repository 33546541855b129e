//! Cluster-level scenario tests. They need every crate at once, so they
//! live here instead of inside any single one.

pub mod mocker;

mod cluster;
mod safety;
mod utils;
