//! A job where one atom exits non-zero: the build still finishes and the
//! failure is surfaced through failures.txt.

use crate::prelude::*;
use clusterrunner_core::{AtomId, AtomizerSpec, BuildState, JobConfig};
use std::time::Duration;

fn basic_failing_job() -> JobConfig {
    JobConfig {
        commands: vec![
            "if [ \"$TOKEN\" = \"This is atom 3\" ]; then exit 1; fi".to_string(),
            "echo $TOKEN > $ARTIFACT_DIR/result.txt".to_string(),
        ],
        atomizers: vec![AtomizerSpec::new(
            "TOKEN",
            "seq 0 4 | xargs -I {} echo \"This is atom {}\"",
        )],
        ..JobConfig::new("BasicFailingJob")
    }
}

#[tokio::test]
async fn failing_atom_is_recorded_without_failing_the_build() {
    let cluster = ClusterHarness::start(vec![basic_failing_job()]);
    cluster.add_slave("worker1", 5);

    let build_id = cluster
        .master
        .queue_build(cluster.request("BasicFailingJob"))
        .unwrap();
    let build = cluster.master.get_build(build_id).unwrap();
    wait_for_state(&build, BuildState::Finished, Duration::from_secs(30)).await;

    assert_eq!(build.num_subjobs(), 5);
    assert_eq!(build.num_atoms(), 5);
    assert!(build.expected_to_fail());
    assert_eq!(
        build.failed_atom_ids(),
        [AtomId::new(3)].into_iter().collect()
    );

    let artifact_dir = build.artifact_directory().unwrap();
    for i in 0..5 {
        let atom_dir = artifact_dir.join(format!("artifact_{}_0", i));
        assert_atom_dir_has_default_files(&atom_dir);
        if i == 3 {
            assert!(
                !atom_dir.join("result.txt").exists(),
                "the failing atom stops before writing its result"
            );
        } else {
            assert_eq!(
                std::fs::read_to_string(atom_dir.join("result.txt")).unwrap(),
                format!("This is atom {}\n", i)
            );
        }
    }

    assert!(artifact_dir.join("results.tar.gz").is_file());
    assert_eq!(
        std::fs::read_to_string(artifact_dir.join("failures.txt")).unwrap(),
        "artifact_3_0"
    );
}
