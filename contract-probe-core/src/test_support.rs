//! Helpers shared by tests that need a real interpreter

use std::sync::OnceLock;

/// True when `python3` can be started on this machine
pub fn python_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    })
}

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("contract_probe_core=debug")
        .with_test_writer()
        .try_init();
}

/// Skip the calling test when no interpreter is installed
macro_rules! require_python {
    () => {
        $crate::test_support::init_tracing();
        if !$crate::test_support::python_available() {
            eprintln!("python3 not available; skipping");
            return;
        }
    };
}

pub(crate) use require_python;
