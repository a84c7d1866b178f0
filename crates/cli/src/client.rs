// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client connection to a live scheduler via its contact file.

use anyhow::{bail, Context};
use gyre_daemon::protocol::{read_message, write_message, Request, Response};
use gyre_storage::{ContactError, ContactInfo};
use std::path::Path;
use tokio::net::UnixStream;

/// One round trip to the scheduler for a run directory.
pub fn request(run_dir: &Path, request: Request) -> anyhow::Result<Response> {
    let contact_path = run_dir.join(".service").join("contact");
    let contact = match ContactInfo::read(&contact_path) {
        Ok(contact) => contact,
        Err(ContactError::NotRunning) => {
            bail!("no scheduler is running in {}", run_dir.display())
        }
        Err(e) => return Err(e).context("reading contact file"),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting client runtime")?;
    runtime.block_on(async move {
        let mut stream = UnixStream::connect(&contact.socket)
            .await
            .with_context(|| format!("connecting to {}", contact.socket))?;
        write_message(&mut stream, &request).await.context("sending request")?;
        let response: Response =
            read_message(&mut stream).await.context("reading response")?;
        Ok(response)
    })
}

/// Expect a plain Ok; surface scheduler-side errors.
pub fn expect_ok(response: Response) -> anyhow::Result<()> {
    match response {
        Response::Ok => Ok(()),
        Response::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}
