//! Concrete registry provider implementations.

pub mod acr;
pub mod custom;
pub mod ecr;
pub mod gcr;
pub mod ghcr;
pub mod gitea;
pub mod gitlab;
pub mod hub;
pub mod lscr;
pub mod quay;
