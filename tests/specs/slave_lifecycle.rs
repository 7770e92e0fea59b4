//! Slave state transitions as seen by the master: idle-driven completion,
//! permanent death on disconnect, and rejection of unknown states.

use clusterrunner_adapters::{
    FakeTransportFactory, GitConfig, StandardProjectFactory,
};
use clusterrunner_core::{BuildId, BuildRequest, BuildState, JobConfig, SystemClock};
use clusterrunner_master::{ClusterMaster, MasterConfig, MasterDeps, MasterError};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Master wired to fake transports, with the dispatch loop NOT running so
/// tests control every step.
fn master_with_empty_job() -> (Arc<ClusterMaster>, TempDir, TempDir) {
    let project_dir = tempfile::tempdir().unwrap();
    let artifacts_root = tempfile::tempdir().unwrap();
    let mut catalog = HashMap::new();
    // A job with no atomizers produces no work; the build goes straight to
    // awaiting completion, which is exactly what these scenarios need.
    catalog.insert("Empty".to_string(), JobConfig::new("Empty"));
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
            transport_factory: Arc::new(FakeTransportFactory::new()),
            clock: Arc::new(SystemClock),
        },
    );
    (master, project_dir, artifacts_root)
}

fn request_for(project_dir: &TempDir) -> BuildRequest {
    let mut params = HashMap::new();
    params.insert("type".to_string(), "directory".to_string());
    params.insert(
        "project_directory".to_string(),
        project_dir.path().display().to_string(),
    );
    params.insert("job_name".to_string(), "Empty".to_string());
    BuildRequest::new(params)
}

#[tokio::test]
async fn build_finishes_only_when_its_last_busy_slave_goes_idle() {
    let (master, project_dir, _artifacts) = master_with_empty_job();
    let build_id = master.queue_build(request_for(&project_dir)).unwrap();
    master.prepare_next_build().await;
    let build = master.get_build(build_id).unwrap();
    assert_eq!(build.state(), BuildState::MarkedForCompletion);

    let slave_a = master.connect_new_slave("slave-a", 1).unwrap();
    let slave_b = master.connect_new_slave("slave-b", 1).unwrap();
    let slave_c = master.connect_new_slave("slave-c", 1).unwrap();
    master
        .get_slave(Some(slave_a), None)
        .unwrap()
        .set_current_build(Some(build_id));
    master
        .get_slave(Some(slave_c), None)
        .unwrap()
        .set_current_build(Some(build_id));
    // Slave B is idle and unrelated throughout.
    assert_eq!(
        master.get_slave(Some(slave_b), None).unwrap().current_build_id(),
        None
    );

    master.handle_slave_state_update(slave_a, "IDLE").await.unwrap();
    assert_eq!(
        build.state(),
        BuildState::MarkedForCompletion,
        "slave C is still busy with this build"
    );

    master.handle_slave_state_update(slave_c, "IDLE").await.unwrap();
    assert_eq!(build.state(), BuildState::Finished);
}

#[tokio::test]
async fn disconnection_marks_the_slave_dead_for_good() {
    let (master, _project_dir, _artifacts) = master_with_empty_job();
    let slave_id = master.connect_new_slave("raphael.turtles.gov", 10).unwrap();
    let slave = master.get_slave(Some(slave_id), None).unwrap();
    assert!(slave.is_alive());

    master
        .handle_slave_state_update(slave_id, "DISCONNECTED")
        .await
        .unwrap();
    assert!(!slave.is_alive());

    // Subsequent idle reports cannot resurrect the handle.
    master.handle_slave_state_update(slave_id, "IDLE").await.unwrap();
    assert!(!slave.is_alive());

    // A reconnect is a brand-new slave; the dead handle stays dead.
    let new_id = master.connect_new_slave("raphael.turtles.gov", 10).unwrap();
    assert_ne!(new_id, slave_id);
    assert!(!slave.is_alive());
}

#[tokio::test]
async fn unknown_slave_state_is_a_bad_request() {
    let (master, _project_dir, _artifacts) = master_with_empty_job();
    let slave_id = master.connect_new_slave("raphael.turtles.gov", 10).unwrap();

    let err = master
        .handle_slave_state_update(slave_id, "NONEXISTENT_STATE")
        .await;

    assert!(matches!(err, Err(MasterError::BadRequest(_))));
}

#[tokio::test]
async fn slave_lookup_key_contract() {
    let (master, _project_dir, _artifacts) = master_with_empty_job();
    master.connect_new_slave("raphael.turtles.gov", 10).unwrap();

    // Exactly one key: neither or both is a caller bug.
    assert!(matches!(
        master.get_slave(None, None),
        Err(MasterError::BadRequest(_))
    ));
    assert!(matches!(
        master.get_slave(
            Some(clusterrunner_core::SlaveId::new(1)),
            Some("raphael.turtles.gov")
        ),
        Err(MasterError::BadRequest(_))
    ));
    // Unknown identifiers are a different failure.
    assert!(matches!(
        master.get_slave(Some(clusterrunner_core::SlaveId::new(400)), None),
        Err(MasterError::ItemNotFound(_))
    ));
    assert!(matches!(
        master.get_slave(None, Some("michelangelo.turtles.gov")),
        Err(MasterError::ItemNotFound(_))
    ));
}

#[tokio::test]
async fn canceling_an_unallocated_build_completes_it() {
    let (master, project_dir, _artifacts) = master_with_empty_job();
    let build_id = master.queue_build(request_for(&project_dir)).unwrap();
    master.prepare_next_build().await;

    let mut params = HashMap::new();
    params.insert("status".to_string(), "canceled".to_string());
    master
        .handle_request_to_update_build(build_id, &params)
        .await
        .unwrap();

    let build = master.get_build(build_id).unwrap();
    assert_eq!(build.state(), BuildState::Canceled);

    // Unknown builds stay unknown.
    let err = master
        .handle_request_to_update_build(BuildId::new(99), &params)
        .await;
    assert!(matches!(err, Err(MasterError::ItemNotFound(_))));
}
