// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! This module contains property-based tests using proptest to verify
//! rendering and evaluation properties of fleet commands.

mod command_round_trip;
