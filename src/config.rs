//! Runtime settings read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `RISKSCOPE_MODEL_PATH` | `models/decision_tree.json` |
//! | `RISKSCOPE_REQUIRE_SIGNED_MODEL` | `false` |
//! | `RISKSCOPE_MODEL_PUBKEY_B64` / `RISKSCOPE_MODEL_PUBKEY_B64_FILE` | unset |
//! | `RISKSCOPE_SWEEP_POLICY` | `narrow` |
//! | `RISKSCOPE_LOG_MODE` | `stderr` |
//! | `RISKSCOPE_LOG_FILE` | `riskscope.log` |

use std::path::PathBuf;

use crate::adapters::VerificationPolicy;
use crate::domain::SweepPolicy;
use crate::RiskscopeError;

pub const MODEL_PATH_ENV: &str = "RISKSCOPE_MODEL_PATH";
pub const REQUIRE_SIGNED_ENV: &str = "RISKSCOPE_REQUIRE_SIGNED_MODEL";
pub const PUBKEY_ENV: &str = "RISKSCOPE_MODEL_PUBKEY_B64";
pub const PUBKEY_FILE_ENV: &str = "RISKSCOPE_MODEL_PUBKEY_B64_FILE";
pub const SWEEP_POLICY_ENV: &str = "RISKSCOPE_SWEEP_POLICY";
pub const LOG_MODE_ENV: &str = "RISKSCOPE_LOG_MODE";
pub const LOG_FILE_ENV: &str = "RISKSCOPE_LOG_FILE";

pub const DEFAULT_MODEL_PATH: &str = "models/decision_tree.json";
pub const DEFAULT_LOG_FILE: &str = "riskscope.log";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub model_path: PathBuf,
    pub verification: VerificationPolicy,
    pub sweep_policy: SweepPolicy,
    pub log_target: LogTarget,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    /// Returns `InvalidInput` for an unknown sweep policy or log mode, and
    /// `Io` if the public key file cannot be read.
    pub fn from_env() -> Result<Self, RiskscopeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    ///
    /// # Errors
    /// See `from_env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RiskscopeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path = lookup(MODEL_PATH_ENV)
            .map(|p| PathBuf::from(p.trim()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        let public_key_b64 = match lookup(PUBKEY_FILE_ENV) {
            Some(path) => Some(std::fs::read_to_string(path.trim())?.trim().to_string()),
            None => lookup(PUBKEY_ENV).map(|v| v.trim().to_string()),
        }
        .filter(|k| !k.is_empty());

        let verification = VerificationPolicy {
            require_signature: lookup(REQUIRE_SIGNED_ENV)
                .as_deref()
                .is_some_and(parse_bool),
            public_key_b64,
        };

        let sweep_policy = match lookup(SWEEP_POLICY_ENV) {
            Some(name) => SweepPolicy::from_name(&name).ok_or_else(|| {
                RiskscopeError::InvalidInput(format!(
                    "{SWEEP_POLICY_ENV} must be `narrow` or `wide`, got `{name}`"
                ))
            })?,
            None => SweepPolicy::default(),
        };

        let log_target = match lookup(LOG_MODE_ENV).as_deref().map(str::trim) {
            None | Some("stderr") => LogTarget::Stderr,
            Some("file") => LogTarget::File(
                lookup(LOG_FILE_ENV)
                    .map(|p| PathBuf::from(p.trim()))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            ),
            Some(other) => {
                return Err(RiskscopeError::InvalidInput(format!(
                    "{LOG_MODE_ENV} must be `stderr` or `file`, got `{other}`"
                )))
            }
        };

        Ok(Self {
            model_path,
            verification,
            sweep_policy,
            log_target,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            verification: VerificationPolicy::default(),
            sweep_policy: SweepPolicy::default(),
            log_target: LogTarget::Stderr,
        }
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, RiskscopeError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).expect("defaults");
        assert_eq!(s.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert!(!s.verification.require_signature);
        assert!(s.verification.public_key_b64.is_none());
        assert_eq!(s.sweep_policy, SweepPolicy::NARROW);
        assert_eq!(s.log_target, LogTarget::Stderr);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            (MODEL_PATH_ENV, "/srv/models/tree.json"),
            (REQUIRE_SIGNED_ENV, "yes"),
            (PUBKEY_ENV, " AAAA \n"),
            (SWEEP_POLICY_ENV, "Wide"),
            (LOG_MODE_ENV, "file"),
            (LOG_FILE_ENV, "/tmp/riskscope.log"),
        ])
        .expect("settings");

        assert_eq!(s.model_path, PathBuf::from("/srv/models/tree.json"));
        assert!(s.verification.require_signature);
        assert_eq!(s.verification.public_key_b64.as_deref(), Some("AAAA"));
        assert_eq!(s.sweep_policy, SweepPolicy::WIDE);
        assert_eq!(s.log_target, LogTarget::File(PathBuf::from("/tmp/riskscope.log")));
    }

    #[test]
    fn test_pubkey_file_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pub.b64");
        std::fs::write(&path, "FILEKEY\n").expect("write key");

        let s = settings(&[
            (PUBKEY_ENV, "ENVKEY"),
            (PUBKEY_FILE_ENV, path.to_str().expect("utf8 path")),
        ])
        .expect("settings");
        assert_eq!(s.verification.public_key_b64.as_deref(), Some("FILEKEY"));

        let err = settings(&[(PUBKEY_FILE_ENV, "/nonexistent/riskscope/pub.b64")]).unwrap_err();
        assert!(matches!(err, RiskscopeError::Io(_)));
    }

    #[test]
    fn test_rejects_unknown_values() {
        let err = settings(&[(SWEEP_POLICY_ENV, "medium")]).unwrap_err();
        assert!(matches!(err, RiskscopeError::InvalidInput(_)));

        let err = settings(&[(LOG_MODE_ENV, "syslog")]).unwrap_err();
        assert!(matches!(err, RiskscopeError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_bool() {
        for v in ["1", "true", "TRUE", "yes", "YES"] {
            assert!(parse_bool(v));
        }
        for v in ["0", "false", "no", ""] {
            assert!(!parse_bool(v));
        }
    }
}
