//! Caller identity resolution for CLI commands.
//!
//! The resolution chain: `--user` flag > `TACK_USER` env > `user` in the
//! user config > `USER` env (TTY only). Mutating commands require an
//! identity; read-only commands work without one.

use std::env;

use tack_core::model::UserId;

/// No identity could be resolved for a command that needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserResolutionError {
    pub message: String,
    /// Machine error code.
    pub code: &'static str,
}

impl std::fmt::Display for UserResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UserResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_user_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(user) = cli_flag.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    if let Some(val) = env.get("TACK_USER") {
        return Some(val);
    }

    if let Some(user) = configured.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the caller identity, or `None` if nothing is configured.
pub fn resolve_user(cli_flag: Option<&str>, configured: Option<&str>) -> Option<UserId> {
    resolve_user_with(cli_flag, configured, &RealEnv).map(UserId::new)
}

/// Resolve the caller identity for a mutating command.
///
/// # Errors
///
/// Returns [`UserResolutionError`] when no identity is available.
pub fn require_user(
    cli_flag: Option<&str>,
    configured: Option<&str>,
) -> Result<UserId, UserResolutionError> {
    resolve_user(cli_flag, configured).ok_or_else(|| UserResolutionError {
        message: "A user identity is required for this command.".to_string(),
        code: "missing_user",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("TACK_USER", "env-user");
        let result = resolve_user_with(Some("flag-user"), Some("config-user"), &env);
        assert_eq!(result.as_deref(), Some("flag-user"));
    }

    #[test]
    fn env_beats_config() {
        let env = MockEnv::new().var("TACK_USER", "env-user");
        let result = resolve_user_with(None, Some("config-user"), &env);
        assert_eq!(result.as_deref(), Some("env-user"));
    }

    #[test]
    fn config_used_when_env_missing() {
        let env = MockEnv::new().var("USER", "login").tty();
        let result = resolve_user_with(None, Some("config-user"), &env);
        assert_eq!(result.as_deref(), Some("config-user"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let env = MockEnv::new().var("TACK_USER", "");
        let result = resolve_user_with(Some(""), Some(""), &env);
        assert_eq!(result, None);
    }

    #[test]
    fn login_user_only_in_tty() {
        let env = MockEnv::new().var("USER", "bob");
        assert_eq!(resolve_user_with(None, None, &env), None);

        let env = MockEnv::new().var("USER", "bob").tty();
        assert_eq!(resolve_user_with(None, None, &env).as_deref(), Some("bob"));
    }

    #[test]
    fn require_user_accepts_flag() {
        let user = require_user(Some("alice"), None).expect("resolved");
        assert_eq!(user, UserId::new("alice"));
    }
}
