// src/lib.rs
pub mod auth;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod cpf;
pub mod error;
pub mod file_store;
pub mod form;
pub mod letterhead;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod report_csv;
pub mod server;
pub mod session;
pub mod status;
pub mod store;

mod report_tests;
