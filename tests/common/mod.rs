//! Shared utilities for integration tests.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Write `content` to `dir/name`, returning the full path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Poll `condition` until it holds or `timeout` passes.
#[allow(dead_code)]
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
