// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client construction and resource kind resolution.

pub mod client;
pub mod resolver;

pub use client::{client_from_kubeconfig, default_client};
pub use resolver::KindResolver;
