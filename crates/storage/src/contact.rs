// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The contact file: `KEY=VALUE` lines advertising the live scheduler.
//!
//! Written at startup, removed on clean shutdown. Absence means the
//! scheduler is not running; corrupt contents are a typed read error for
//! clients. A stale file (left by SIGKILL) is detected by the daemon's
//! health check against the recorded pid/uuid before a new start.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Keys written to the contact file, in order.
pub const CONTACT_KEYS: [&str; 6] = [
    "CYLC_SUITE_HOST",
    "CYLC_SUITE_PORT",
    "CYLC_WORKFLOW_PID",
    "CYLC_SUITE_UUID",
    "CYLC_CYLC_VERSION",
    "CYLC_SUITE_SOCKET",
];

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("contact file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("scheduler is not running (no contact file)")]
    NotRunning,
    #[error("corrupt contact file: {0}")]
    Corrupt(String),
}

/// Parsed contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub host: String,
    /// 0 when the scheduler listens on a unix socket only.
    pub port: u16,
    pub pid: u32,
    pub uuid: String,
    pub version: String,
    pub socket: String,
}

impl ContactInfo {
    /// Serialize to `KEY=VALUE` lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let values = [
            self.host.clone(),
            self.port.to_string(),
            self.pid.to_string(),
            self.uuid.clone(),
            self.version.clone(),
            self.socket.clone(),
        ];
        for (key, value) in CONTACT_KEYS.iter().zip(values) {
            let _ = writeln!(out, "{key}={value}");
        }
        out
    }

    /// Write the contact file, creating `.service/` as needed.
    pub fn write(&self, path: &Path) -> Result<(), ContactError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())?;
        Ok(())
    }

    /// Read and parse the contact file.
    pub fn read(path: &Path) -> Result<Self, ContactError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContactError::NotRunning)
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ContactError> {
        let mut host = None;
        let mut port = None;
        let mut pid = None;
        let mut uuid = None;
        let mut version = None;
        let mut socket = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ContactError::Corrupt(format!("bad line: {line:?}")))?;
            match key {
                "CYLC_SUITE_HOST" => host = Some(value.to_string()),
                "CYLC_SUITE_PORT" => {
                    port = Some(value.parse().map_err(|_| {
                        ContactError::Corrupt(format!("bad port: {value:?}"))
                    })?)
                }
                "CYLC_WORKFLOW_PID" => {
                    pid = Some(value.parse().map_err(|_| {
                        ContactError::Corrupt(format!("bad pid: {value:?}"))
                    })?)
                }
                "CYLC_SUITE_UUID" => uuid = Some(value.to_string()),
                "CYLC_CYLC_VERSION" => version = Some(value.to_string()),
                "CYLC_SUITE_SOCKET" => socket = Some(value.to_string()),
                // Unknown keys are tolerated for forward compatibility.
                _ => {}
            }
        }
        let missing = |key: &str| ContactError::Corrupt(format!("missing {key}"));
        Ok(Self {
            host: host.ok_or_else(|| missing("CYLC_SUITE_HOST"))?,
            port: port.ok_or_else(|| missing("CYLC_SUITE_PORT"))?,
            pid: pid.ok_or_else(|| missing("CYLC_WORKFLOW_PID"))?,
            uuid: uuid.ok_or_else(|| missing("CYLC_SUITE_UUID"))?,
            version: version.ok_or_else(|| missing("CYLC_CYLC_VERSION"))?,
            socket: socket.unwrap_or_default(),
        })
    }

    /// Remove the contact file; missing is fine (already clean).
    pub fn remove(path: &Path) -> Result<(), ContactError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
