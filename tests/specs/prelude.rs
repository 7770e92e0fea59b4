//! In-process cluster harness: a real master, real slave executors, and a
//! transport that glues them together without HTTP.

use async_trait::async_trait;
use clusterrunner_adapters::{
    GitConfig, SlaveTransport, SlaveTransportFactory, StandardProjectFactory, TransportError,
};
use clusterrunner_core::{
    BuildRequest, BuildSetup, BuildState, JobConfig, SlaveId, Subjob, SystemClock,
};
use clusterrunner_master::{Build, ClusterMaster, MasterConfig, MasterDeps};
use clusterrunner_slave::{ExecutorConfig, SlaveExecutor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// Transport that drives a local [`SlaveExecutor`] and reports back into
/// the master, mirroring the fire-and-forget HTTP contract: every call
/// acknowledges immediately and the real work happens in a spawned task.
struct LocalSlaveTransport {
    url: String,
    executor: Arc<SlaveExecutor>,
    master: Arc<OnceLock<Arc<ClusterMaster>>>,
}

impl LocalSlaveTransport {
    fn master(&self) -> Arc<ClusterMaster> {
        Arc::clone(self.master.get().expect("master not attached"))
    }

    fn own_id(master: &ClusterMaster, url: &str) -> Option<SlaveId> {
        master.get_slave(None, Some(url)).ok().map(|s| s.id())
    }
}

#[async_trait]
impl SlaveTransport for LocalSlaveTransport {
    async fn start_setup(&self, setup: &BuildSetup) -> Result<(), TransportError> {
        let executor = Arc::clone(&self.executor);
        let master = self.master();
        let url = self.url.clone();
        let setup = setup.clone();
        tokio::spawn(async move {
            let report = match executor.run_setup(setup).await {
                Ok(()) => "SETUP_COMPLETED",
                Err(_) => "DISCONNECTED",
            };
            if let Some(id) = Self::own_id(&master, &url) {
                let _ = master.handle_slave_state_update(id, report).await;
            }
        });
        Ok(())
    }

    async fn start_subjob_execution(&self, subjob: &Subjob) -> Result<(), TransportError> {
        let executor = Arc::clone(&self.executor);
        let master = self.master();
        let url = self.url.clone();
        let subjob = subjob.clone();
        tokio::spawn(async move {
            let build_id = subjob.build_id;
            match executor.run_subjob(subjob).await {
                Ok(payload) => {
                    let _ = master
                        .handle_result_reported_from_slave(&url, build_id, payload)
                        .await;
                }
                Err(_) => {
                    if let Some(id) = Self::own_id(&master, &url) {
                        let _ = master.handle_slave_state_update(id, "DISCONNECTED").await;
                    }
                }
            }
        });
        Ok(())
    }

    async fn teardown_build(
        &self,
        _build_id: clusterrunner_core::BuildId,
    ) -> Result<(), TransportError> {
        let executor = Arc::clone(&self.executor);
        let master = self.master();
        let url = self.url.clone();
        tokio::spawn(async move {
            let _ = executor.run_teardown().await;
            if let Some(id) = Self::own_id(&master, &url) {
                let _ = master.handle_slave_state_update(id, "IDLE").await;
            }
        });
        Ok(())
    }

    async fn kill_running_job(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct LocalTransportFactory {
    master: Arc<OnceLock<Arc<ClusterMaster>>>,
    executors: Arc<Mutex<HashMap<String, Arc<SlaveExecutor>>>>,
}

impl LocalTransportFactory {
    fn new() -> Self {
        Self {
            master: Arc::new(OnceLock::new()),
            executors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn attach_master(&self, master: &Arc<ClusterMaster>) {
        let _ = self.master.set(Arc::clone(master));
    }

    fn register_executor(&self, url: &str, executor: Arc<SlaveExecutor>) {
        self.executors
            .lock()
            .unwrap()
            .insert(url.to_string(), executor);
    }
}

impl SlaveTransportFactory for LocalTransportFactory {
    fn create(&self, slave_url: &str) -> Result<Arc<dyn SlaveTransport>, TransportError> {
        let executor = self
            .executors
            .lock()
            .unwrap()
            .get(slave_url)
            .cloned()
            .ok_or_else(|| {
                TransportError::Rejected(format!("no local executor for {}", slave_url))
            })?;
        Ok(Arc::new(LocalSlaveTransport {
            url: slave_url.to_string(),
            executor,
            master: Arc::clone(&self.master),
        }))
    }
}

/// One whole cluster in a test: master with its dispatch loop running,
/// plus any number of in-process slaves.
pub struct ClusterHarness {
    pub master: Arc<ClusterMaster>,
    pub project_dir: TempDir,
    transports: LocalTransportFactory,
    _artifacts_root: TempDir,
    results_root: TempDir,
}

impl ClusterHarness {
    /// Start a cluster knowing the given jobs.
    pub fn start(jobs: Vec<JobConfig>) -> Self {
        let project_dir = tempfile::tempdir().unwrap();
        let artifacts_root = tempfile::tempdir().unwrap();
        let results_root = tempfile::tempdir().unwrap();

        let catalog: HashMap<String, JobConfig> =
            jobs.into_iter().map(|j| (j.name.clone(), j)).collect();
        let transports = LocalTransportFactory::new();
        let master = ClusterMaster::new(
            MasterConfig {
                artifacts_root: artifacts_root.path().to_path_buf(),
                ..MasterConfig::default()
            },
            MasterDeps {
                project_factory: Arc::new(StandardProjectFactory::new(
                    GitConfig::default(),
                    catalog,
                )),
                transport_factory: Arc::new(transports.clone()),
                clock: Arc::new(SystemClock),
            },
        );
        transports.attach_master(&master);
        master.start();

        Self {
            master,
            project_dir,
            transports,
            _artifacts_root: artifacts_root,
            results_root,
        }
    }

    /// Bring up an in-process slave and connect it to the master.
    pub fn add_slave(&self, url: &str, num_executors: u32) -> SlaveId {
        let executor = Arc::new(SlaveExecutor::new(
            ExecutorConfig {
                command_timeout: Duration::from_secs(60),
                results_root: self.results_root.path().join(url),
            },
            num_executors,
            Arc::new(StandardProjectFactory::new(
                GitConfig::default(),
                HashMap::new(),
            )),
        ));
        self.transports.register_executor(url, executor);
        self.master.connect_new_slave(url, num_executors).unwrap()
    }

    /// A directory-type build request against the harness project dir.
    pub fn request(&self, job_name: &str) -> BuildRequest {
        let mut params = HashMap::new();
        params.insert("type".to_string(), "directory".to_string());
        params.insert(
            "project_directory".to_string(),
            self.project_dir.path().display().to_string(),
        );
        params.insert("job_name".to_string(), job_name.to_string());
        BuildRequest::new(params)
    }
}

/// Poll until the build reaches `expected` or the deadline passes.
pub async fn wait_for_state(build: &Arc<Build>, expected: BuildState, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        let state = build.state();
        if state == expected {
            return;
        }
        if state.is_terminal() {
            panic!(
                "build {} reached terminal state {} while waiting for {} (error: {:?})",
                build.build_id(),
                state,
                expected,
                build.error_message()
            );
        }
        if Instant::now() > deadline {
            panic!(
                "timed out waiting for build {} to reach {} (currently {})",
                build.build_id(),
                expected,
                state
            );
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// The four files present in every atom artifact directory.
pub const DEFAULT_ATOM_FILES: [&str; 4] = [
    "clusterrunner_command",
    "clusterrunner_console_output",
    "clusterrunner_exit_code",
    "clusterrunner_time",
];

pub fn assert_atom_dir_has_default_files(dir: &Path) {
    for name in DEFAULT_ATOM_FILES {
        assert!(
            dir.join(name).is_file(),
            "{} missing from {}",
            name,
            dir.display()
        );
    }
}
