// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job script generation.
//!
//! The script embeds the effective runtime at submit time: environment,
//! user script body, and the trap discipline that keeps the status file
//! authoritative. Pipefail is on so a pipeline's first nonzero status is
//! what gets reported.

use std::fmt::Write as _;

/// Everything needed to render one job script.
#[derive(Debug, Clone)]
pub struct JobScriptParams {
    /// `<point>/<name>/NN` identity baked into the job environment.
    pub job_id: String,
    pub task_name: String,
    pub cycle_point: String,
    pub submit_num: u32,
    pub platform: String,
    /// Environment in declaration order.
    pub environment: Vec<(String, String)>,
    /// User script body.
    pub script: String,
    /// Absolute status-file path.
    pub status_file: String,
    /// Signals that mean vacation rather than failure.
    pub vacation_signals: Vec<String>,
}

/// Render the job script.
pub fn job_script(params: &JobScriptParams) -> String {
    let mut out = String::new();
    let status = &params.status_file;

    let _ = writeln!(out, "#!/bin/bash");
    let _ = writeln!(out, "set -o pipefail");
    let _ = writeln!(out);
    let _ = writeln!(out, "CYLC_STATUS_FILE={status:?}");
    let _ = writeln!(out, "gyre__now() {{ date -u +%Y-%m-%dT%H:%M:%SZ; }}");
    let _ = writeln!(out);
    // Any nonzero exit lands in the status file before the job dies.
    // Statuses above 128 mean death by signal and classify as TERM.
    let _ = writeln!(out, "gyre__err() {{");
    let _ = writeln!(out, "    local code=$?");
    let _ = writeln!(out, "    trap - ERR TERM");
    let _ = writeln!(out, "    local class=ERR");
    let _ = writeln!(out, "    (( code > 128 )) && class=TERM");
    let _ = writeln!(out, "    echo \"CYLC_JOB_EXIT=$class\" >>\"$CYLC_STATUS_FILE\"");
    let _ = writeln!(
        out,
        "    echo \"CYLC_JOB_EXIT_TIME=$(gyre__now)\" >>\"$CYLC_STATUS_FILE\""
    );
    let _ = writeln!(out, "    exit \"$code\"");
    let _ = writeln!(out, "}}");
    // SIGTERM: record, then forward to the rest of the process group so a
    // user script trap still fires in its own children.
    let _ = writeln!(out, "gyre__term() {{");
    let _ = writeln!(out, "    trap - ERR TERM");
    let _ = writeln!(out, "    echo \"CYLC_JOB_EXIT=TERM\" >>\"$CYLC_STATUS_FILE\"");
    let _ = writeln!(
        out,
        "    echo \"CYLC_JOB_EXIT_TIME=$(gyre__now)\" >>\"$CYLC_STATUS_FILE\""
    );
    let _ = writeln!(out, "    kill -s TERM 0 2>/dev/null");
    let _ = writeln!(out, "    exit 143");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "gyre__vacate() {{");
    let _ = writeln!(
        out,
        "    echo \"CYLC_JOB_EXIT=vacated/USR1\" >>\"$CYLC_STATUS_FILE\""
    );
    let _ = writeln!(
        out,
        "    echo \"CYLC_JOB_EXIT_TIME=$(gyre__now)\" >>\"$CYLC_STATUS_FILE\""
    );
    let _ = writeln!(out, "    exit 0");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "trap gyre__err ERR");
    let _ = writeln!(out, "trap gyre__term TERM");
    for signal in &params.vacation_signals {
        let _ = writeln!(out, "trap gyre__vacate {signal}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "echo \"CYLC_JOB_PID=$$\" >\"$CYLC_STATUS_FILE\"");
    let _ = writeln!(
        out,
        "echo \"CYLC_BATCH_SYS_NAME={}\" >>\"$CYLC_STATUS_FILE\"",
        params.platform
    );
    let _ = writeln!(
        out,
        "echo \"CYLC_BATCH_SYS_JOB_ID=$$\" >>\"$CYLC_STATUS_FILE\""
    );
    let _ = writeln!(
        out,
        "echo \"CYLC_JOB_INIT_TIME=$(gyre__now)\" >>\"$CYLC_STATUS_FILE\""
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "export CYLC_TASK_JOB={:?}", params.job_id);
    let _ = writeln!(out, "export CYLC_TASK_NAME={:?}", params.task_name);
    let _ = writeln!(out, "export CYLC_TASK_CYCLE_POINT={:?}", params.cycle_point);
    let _ = writeln!(out, "export CYLC_TASK_SUBMIT_NUMBER={}", params.submit_num);
    for (key, value) in &params.environment {
        let _ = writeln!(out, "export {key}={value:?}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "# user script");
    let _ = writeln!(out, "{}", params.script);
    let _ = writeln!(out);
    let _ = writeln!(out, "echo \"CYLC_JOB_EXIT=SUCCEEDED\" >>\"$CYLC_STATUS_FILE\"");
    let _ = writeln!(
        out,
        "echo \"CYLC_JOB_EXIT_TIME=$(gyre__now)\" >>\"$CYLC_STATUS_FILE\""
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> JobScriptParams {
        JobScriptParams {
            job_id: "1/foo/01".to_string(),
            task_name: "foo".to_string(),
            cycle_point: "1".to_string(),
            submit_num: 1,
            platform: "background".to_string(),
            environment: vec![("NAME".to_string(), "bob".to_string())],
            script: "echo hello".to_string(),
            status_file: "/tmp/job.status".to_string(),
            vacation_signals: vec!["USR1".to_string()],
        }
    }

    #[test]
    fn script_has_pipefail_and_traps() {
        let script = job_script(&params());
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("set -o pipefail"));
        assert!(script.contains("trap gyre__err ERR"));
        assert!(script.contains("trap gyre__term TERM"));
        assert!(script.contains("trap gyre__vacate USR1"));
    }

    #[test]
    fn script_writes_status_keys_in_order() {
        let script = job_script(&params());
        let pid = script.find("CYLC_JOB_PID").unwrap();
        let sys = script.find("CYLC_BATCH_SYS_NAME").unwrap();
        let job_id = script.find("CYLC_BATCH_SYS_JOB_ID").unwrap();
        let init = script.find("CYLC_JOB_INIT_TIME").unwrap();
        let exit = script.find("CYLC_JOB_EXIT=SUCCEEDED").unwrap();
        assert!(pid < sys && sys < job_id && job_id < init && init < exit);
    }

    #[test]
    fn script_exports_task_identity_and_environment() {
        let script = job_script(&params());
        assert!(script.contains("export CYLC_TASK_JOB=\"1/foo/01\""));
        assert!(script.contains("export CYLC_TASK_CYCLE_POINT=\"1\""));
        assert!(script.contains("export NAME=\"bob\""));
        assert!(script.contains("echo hello"));
    }

    #[test]
    fn err_path_classifies_signal_deaths_as_term() {
        let script = job_script(&params());
        assert!(script.contains("local class=ERR"));
        assert!(script.contains("(( code > 128 )) && class=TERM"));
        assert!(script.contains("CYLC_JOB_EXIT=$class"));
        assert!(script.contains("CYLC_JOB_EXIT=vacated/USR1"));
    }
}
