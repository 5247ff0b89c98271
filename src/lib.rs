// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod apply;
pub mod config;
pub mod constants;
pub mod definition;
pub mod error;
pub mod kubernetes;
pub mod merge;

#[cfg(test)]
pub mod test_utils;
