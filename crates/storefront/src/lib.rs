//! Ticket Booth Storefront library.
//!
//! Public ticketing and merchandise API plus the admin back-office API,
//! exposed as a library so the router can be built and tested without
//! binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
