//! Registration Service - festival event registration with tiered
//! eligibility and push topic subscription.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
