//! Pipeworks Core
//!
//! Core types and abstractions for managing pipelines hosted on several
//! backend connections.
//!
//! This crate contains:
//! - Domain types: backend connections, pipeline records, model entries and valves
//! - DTOs: wire shapes exchanged with backend pipeline services
//! - Error details: backend rejection payloads carried verbatim

pub mod domain;
pub mod dto;
pub mod error;
