// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Layer for Fleet Operations
//!
//! Orchestrates the pure command builder and the concurrent dispatcher.
//!
//! ```text
//! Mode
//!   ↓
//! FleetService::plan  (CommandBuilder, no I/O)
//!   ↓
//! Plan ── dry run stops here
//!   ↓
//! FleetDispatcher::dispatch  (one session per job)
//!   ↓
//! Summary → FleetError::RemoteFailures
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_fleet::{FleetConfig, FleetService, Mode, OpenSshTransport};
//! use std::sync::Arc;
//!
//! let config = Arc::new(FleetConfig::load("fleet.toml")?);
//! let transport = Arc::new(OpenSshTransport::new(config.ssh.clone()));
//! let service = FleetService::new(config, transport);
//! service.run(Mode::Server).await?;
//! ```

pub mod fleet;
pub mod mode;

pub use fleet::{Dispatched, FleetService, Plan, PlannedCommand, SyncScope};
pub use mode::Mode;
