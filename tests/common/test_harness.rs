//! # Image Dispatch Test Harness
//!
//! Spawns the compiled binary as a real OS process for the one property that
//! in-process `tower::oneshot` testing can't exercise: durability across an
//! actual restart. Simplified from the teacher's harness — no config-file
//! plumbing, no PID-file juggling, since this service takes its settings
//! from environment variables and CLI flags, not a YAML file on disk.

use std::env;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

#[path = "../../src/logging.rs"]
mod logging;

use self::logging::{create_base_env_filter, create_subscriber_builder};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);
static INIT: Once = Once::new();

fn init_test_tracing() {
    INIT.call_once(|| {
        let env_filter = create_base_env_filter("warn");
        create_subscriber_builder(env_filter).init();
    });
}

/// Isolated `DB_PATH`/`IMAGES_DIR`/port for one test, so parallel tests never
/// collide on shared files or a shared listening socket.
pub struct TestEnv {
    pub db_path: PathBuf,
    pub images_dir: PathBuf,
    pub port: u16,
}

pub fn setup_test_env() -> TestEnv {
    init_test_tracing();

    let test_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let root = PathBuf::from(format!("target/tmp/harness_{test_id}"));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(&root).expect("failed to create test root");

    TestEnv {
        db_path: root.join("tasks.db"),
        images_dir: root.join("images"),
        port: 18000 + test_id as u16,
    }
}

pub fn cleanup_test_env(env: TestEnv) {
    if let Some(root) = env.db_path.parent().and_then(|p| p.parent()) {
        let _ = std::fs::remove_dir_all(root);
    }
}

fn get_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_image-dispatch"))
}

/// A running `image-dispatch` server process.
pub struct TestServer {
    process: Child,
    env: TestEnv,
}

impl TestServer {
    pub fn start(env: TestEnv) -> Self {
        let mut cmd = Command::new(get_binary());
        cmd.args([
            "--host",
            "127.0.0.1",
            "--port",
            &env.port.to_string(),
            "--db-path",
            env.db_path.to_str().unwrap(),
            "--images-dir",
            env.images_dir.to_str().unwrap(),
        ]);

        if !is_nocapture() {
            cmd.stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null());
        }

        let mut process = cmd.spawn().expect("failed to start image-dispatch process");

        let client = reqwest::blocking::Client::new();
        let url = format!("http://127.0.0.1:{}/", env.port);
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Ok(resp) = client.get(&url).timeout(Duration::from_millis(500)).send() {
                if resp.status().is_success() {
                    break;
                }
            }
            if Instant::now() > deadline {
                let _ = process.kill();
                panic!("server did not become ready in time");
            }
            if let Ok(Some(status)) = process.try_wait() {
                panic!("process exited early with status {status:?}");
            }
            thread::sleep(Duration::from_millis(100));
        }

        TestServer { process, env }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.env.port)
    }

    /// Send SIGINT (so the process's own `ctrl_c()` handler runs and flushes
    /// the store) and wait for a clean exit.
    pub fn shutdown(mut self) -> TestEnv {
        let pid = self.process.id();

        #[cfg(target_family = "unix")]
        {
            let _ = Command::new("kill").args(["-2", &pid.to_string()]).output();
        }
        #[cfg(not(target_family = "unix"))]
        {
            let _ = self.process.kill();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match self.process.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() > deadline => {
                    let _ = self.process.kill();
                    let _ = self.process.wait();
                    break;
                }
                _ => thread::sleep(Duration::from_millis(50)),
            }
        }

        TestEnv {
            db_path: self.env.db_path.clone(),
            images_dir: self.env.images_dir.clone(),
            port: self.env.port,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}

fn is_nocapture() -> bool {
    std::env::args().any(|arg| arg == "--nocapture")
}
