// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Task parameter schema and resource definition reconstruction.

pub mod manifest;
pub mod params;

pub use params::{ResourceDefinition, TaskParams, WaitConditionParams};
