pub mod app;
pub mod catalog;
pub mod checksum;
pub mod domain;
pub mod ena;
pub mod error;
pub mod eutils;
pub mod output;
pub mod retry;
