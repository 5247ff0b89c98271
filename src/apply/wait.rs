// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Post-mutation wait-for-condition polling

use crate::apply::State;
use crate::constants::wait::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::definition::WaitConditionParams;
use crate::error::{DockhandError, Result};
use kube::api::{Api, DynamicObject};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// The convergence condition polled for after a mutation
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// The object exists
    Exists,
    /// The object with the recorded uid is gone. A delete-then-recreate under
    /// the same name still counts as deleted.
    Deleted { uid: Option<String> },
    /// `.status.conditions[]` carries an entry of this type with this status
    StatusCondition { type_: String, status: String },
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Exists => f.write_str("existence"),
            WaitCondition::Deleted { .. } => f.write_str("deletion"),
            WaitCondition::StatusCondition { type_, status } => {
                write!(f, "condition {}={}", type_, status)
            }
        }
    }
}

impl WaitCondition {
    pub fn matches(&self, obj: Option<&DynamicObject>) -> bool {
        match self {
            WaitCondition::Exists => obj.is_some(),
            WaitCondition::Deleted { uid } => match obj {
                None => true,
                // A different uid means the object was deleted and recreated
                Some(observed) => uid.is_some() && observed.metadata.uid != *uid,
            },
            WaitCondition::StatusCondition { type_, status } => obj
                .map(|observed| has_status_condition(&observed.data, type_, status))
                .unwrap_or(false),
        }
    }
}

fn has_status_condition(data: &Value, type_: &str, status: &str) -> bool {
    data.get("status")
        .and_then(|s| s.get("conditions"))
        .and_then(Value::as_array)
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(type_)
                    && c.get("status").and_then(Value::as_str) == Some(status)
            })
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub condition: WaitCondition,
}

impl WaitConfig {
    /// Derive the condition to wait for from the task state: deletions wait
    /// for the recorded object to be gone, everything else waits for the
    /// requested status condition, or mere existence.
    pub fn for_state(
        state: State,
        condition: Option<&WaitConditionParams>,
        timeout: Duration,
        existing_uid: Option<String>,
    ) -> Self {
        let condition = match state {
            State::Absent => WaitCondition::Deleted { uid: existing_uid },
            State::Present | State::Replaced => match condition {
                Some(c) => WaitCondition::StatusCondition {
                    type_: c.type_.clone(),
                    status: c.status.clone(),
                },
                None => WaitCondition::Exists,
            },
        };
        WaitConfig { timeout, condition }
    }
}

/// Poll the object until the condition holds or the timeout passes.
/// Returns the last observed object (if any) on success.
pub async fn await_condition(
    api: &Api<DynamicObject>,
    name: &str,
    config: &WaitConfig,
) -> Result<Option<DynamicObject>> {
    let deadline = Instant::now() + config.timeout;
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        let observed = api.get_opt(name).await?;
        if config.condition.matches(observed.as_ref()) {
            return Ok(observed);
        }
        if Instant::now() + Duration::from_secs(interval) > deadline {
            return Err(DockhandError::WaitTimeout {
                what: format!("'{}' to satisfy {}", name, config.condition),
                timeout_secs: config.timeout.as_secs(),
            });
        }

        debug!(
            "'{}' does not yet satisfy {}, polling again in {} seconds...",
            name, config.condition, interval
        );
        sleep(Duration::from_secs(interval)).await;
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}
