//! Deckhand: deployment compilation and capability resolution.
//!
//! Turns an abstract service template, per-instance overrides and the
//! operator's capability choices into backend-specific deployment artifacts,
//! then drives each instance through its deployment lifecycle on a local or
//! remote container runtime or a cluster orchestrator.
//!
//! # Architecture
//!
//! Each bounded context follows hexagonal architecture:
//!
//! - **Domain**: Pure types and rules with no infrastructure dependencies
//! - **Ports**: Trait interfaces for templates, persistence and backends
//! - **Adapters**: In-memory and backend-specific implementations of ports
//! - **Services**: Orchestration over the ports
//!
//! # Modules
//!
//! - [`template`]: Template registry and variable syntax
//! - [`configuration`]: Service configurations, layered settings and guards
//! - [`capability`]: Capability resolution against selected providers
//! - [`allocation`]: Port preflight and conflict remediation
//! - [`compiler`]: Pure compilation into backend artifacts
//! - [`deployment`]: Deployment manager, backends and backend registry
//! - [`settings`]: Engine timeouts, retry policy and defaults

pub mod allocation;
pub mod capability;
pub mod compiler;
pub mod configuration;
pub mod deployment;
pub mod settings;
pub mod template;
