//! The collaborators around the training core: configuration, dataset preparation, group
//! bootstrap and result reporting.

pub mod config;
pub mod data;
pub mod group;
pub mod report;
