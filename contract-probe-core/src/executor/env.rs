//! Worker environment allow-list

/// Copied from the host only when present there
pub const PASSTHROUGH_VARS: [&str; 3] = ["PATH", "PYTHONPATH", "VIRTUAL_ENV"];

/// Always set: unbuffered output, no bytecode cache files
pub const FIXED_VARS: [(&str, &str); 2] = [("PYTHONUNBUFFERED", "1"), ("PYTHONDONTWRITEBYTECODE", "1")];

/// Build the worker environment from a host lookup. Nothing else is passed.
pub fn worker_env<F>(lookup: F) -> Vec<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env: Vec<(String, String)> = PASSTHROUGH_VARS
        .iter()
        .filter_map(|name| lookup(name).map(|value| (name.to_string(), value)))
        .collect();
    env.extend(FIXED_VARS.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    env
}

/// Worker environment derived from this process
pub fn host_worker_env() -> Vec<(String, String)> {
    worker_env(|name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_only_present_vars_copied() {
        let host: HashMap<&str, &str> =
            HashMap::from([("PATH", "/usr/bin"), ("HOME", "/root"), ("AWS_SECRET_ACCESS_KEY", "x")]);
        let env = worker_env(|k| host.get(k).map(|v| v.to_string()));

        assert_eq!(
            env,
            vec![
                ("PATH".to_string(), "/usr/bin".to_string()),
                ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
                ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_optional_overrides_passed_through() {
        let env = worker_env(|k| match k {
            "PYTHONPATH" => Some("/opt/lib".to_string()),
            "VIRTUAL_ENV" => Some("/venv".to_string()),
            _ => None,
        });
        let names: Vec<_> = env.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["PYTHONPATH", "VIRTUAL_ENV", "PYTHONUNBUFFERED", "PYTHONDONTWRITEBYTECODE"]);
    }
}
