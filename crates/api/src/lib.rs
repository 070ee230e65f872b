//! HTTP API of the user service: login, token checks, admin user routes.

pub mod app;
pub mod context;
pub mod middleware;
pub mod usecases;
