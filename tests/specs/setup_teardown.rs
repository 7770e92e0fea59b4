//! Setup and teardown ordering: setup runs before any subjob on the slave,
//! teardown runs exactly once after the last one.

use crate::prelude::*;
use clusterrunner_core::{AtomizerSpec, BuildState, JobConfig};
use std::time::Duration;

fn job_with_setup_and_teardown() -> JobConfig {
    JobConfig {
        setup_commands: vec![
            "echo \"Doing build setup.\"".to_string(),
            "echo \"setup.\" > $PROJECT_DIR/build_setup.txt".to_string(),
        ],
        commands: vec![
            "echo \"Doing subjob $SUBJOB_NUMBER.\"".to_string(),
            "MY_SUBJOB_FILE=$PROJECT_DIR/subjob_file_${SUBJOB_NUMBER}.txt".to_string(),
            "cp build_setup.txt $MY_SUBJOB_FILE".to_string(),
            "echo \"subjob $SUBJOB_NUMBER.\" >> $MY_SUBJOB_FILE".to_string(),
        ],
        atomizers: vec![AtomizerSpec::new("SUBJOB_NUMBER", "seq 1 3")],
        teardown_commands: vec![
            "echo \"Doing build teardown.\"".to_string(),
            "ALL_SUBJOB_FILES=$(ls $PROJECT_DIR/subjob_file_*.txt)".to_string(),
            "echo \"teardown.\" | tee -a $ALL_SUBJOB_FILES".to_string(),
        ],
        ..JobConfig::new("JobWithSetupAndTeardown")
    }
}

#[tokio::test]
async fn every_subjob_file_sees_setup_before_and_teardown_after() {
    let cluster = ClusterHarness::start(vec![job_with_setup_and_teardown()]);
    cluster.add_slave("worker1", 1);

    let build_id = cluster
        .master
        .queue_build(cluster.request("JobWithSetupAndTeardown"))
        .unwrap();
    let build = cluster.master.get_build(build_id).unwrap();
    wait_for_state(&build, BuildState::Finished, Duration::from_secs(30)).await;

    assert_eq!(build.num_subjobs(), 3);
    assert_eq!(build.num_atoms(), 3);

    let project = cluster.project_dir.path();
    assert_eq!(
        std::fs::read_to_string(project.join("build_setup.txt")).unwrap(),
        "setup.\n"
    );
    for n in 1..=3 {
        assert_eq!(
            std::fs::read_to_string(project.join(format!("subjob_file_{}.txt", n))).unwrap(),
            format!("setup.\nsubjob {}.\nteardown.\n", n),
            "subjob {} file must be bracketed by setup and teardown",
            n
        );
    }
}
