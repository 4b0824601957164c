//! Cloudrift API
//!
//! HTTP front for the Cloudrift drift scanner: scan passthrough, config and
//! plan file management, and asynchronous Terraform plan generation with
//! single-flight execution and pollable job records.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
