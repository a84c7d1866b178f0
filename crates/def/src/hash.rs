// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Definition content hashing, for reload detection and job-script
//! snapshot identity.

use crate::types::WorkflowDef;
use sha2::{Digest, Sha256};

/// Content hash of the canonical-JSON form of the definition.
pub fn definition_hash(def: &WorkflowDef) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(def)?;
    Ok(format!("{:x}", Sha256::digest(canonical.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_str;

    const MINIMAL: &str = r#"
        [workflow]
        name = "demo"
        cycling = "integer"
        initial_cycle_point = "1"

        [runtime.foo]
        script = "true"

        [tasks.foo]
    "#;

    #[test]
    fn hash_is_stable_for_equal_definitions() {
        let a = parse_str(MINIMAL).unwrap();
        let b = parse_str(MINIMAL).unwrap();
        assert_eq!(definition_hash(&a).unwrap(), definition_hash(&b).unwrap());
    }

    #[test]
    fn hash_changes_with_content() {
        let a = parse_str(MINIMAL).unwrap();
        let b = parse_str(&MINIMAL.replace("true", "false")).unwrap();
        assert_ne!(definition_hash(&a).unwrap(), definition_hash(&b).unwrap());
    }
}
