//! A basic job: each atom writes one text file into its artifact dir.

use crate::prelude::*;
use clusterrunner_core::{AtomizerSpec, BuildState, JobConfig};
use std::time::Duration;

fn basic_job() -> JobConfig {
    JobConfig {
        commands: vec!["echo $TOKEN > $ARTIFACT_DIR/result.txt".to_string()],
        atomizers: vec![AtomizerSpec::new(
            "TOKEN",
            "seq 0 4 | xargs -I {} echo \"This is atom {}\"",
        )],
        ..JobConfig::new("BasicJob")
    }
}

#[tokio::test]
async fn basic_job_produces_five_atom_artifacts_and_an_archive() {
    let cluster = ClusterHarness::start(vec![basic_job()]);
    cluster.add_slave("worker1", 5);

    let build_id = cluster.master.queue_build(cluster.request("BasicJob")).unwrap();
    let build = cluster.master.get_build(build_id).unwrap();
    wait_for_state(&build, BuildState::Finished, Duration::from_secs(30)).await;

    assert_eq!(build.num_subjobs(), 5);
    assert_eq!(build.num_atoms(), 5);
    assert!(!build.expected_to_fail());

    let artifact_dir = build.artifact_directory().unwrap();
    for i in 0..5 {
        let atom_dir = artifact_dir.join(format!("artifact_{}_0", i));
        assert_atom_dir_has_default_files(&atom_dir);
        assert_eq!(
            std::fs::read_to_string(atom_dir.join("result.txt")).unwrap(),
            format!("This is atom {}\n", i)
        );
    }
    assert!(!artifact_dir.join("failures.txt").exists());

    // The archive holds exactly the atom artifact directories.
    let archive_file = std::fs::File::open(artifact_dir.join("results.tar.gz")).unwrap();
    let unpacked = tempfile::tempdir().unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(archive_file));
    archive.unpack(unpacked.path()).unwrap();
    let mut top_level: Vec<String> = std::fs::read_dir(unpacked.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    top_level.sort();
    assert_eq!(
        top_level,
        (0..5).map(|i| format!("artifact_{}_0", i)).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn basic_job_completes_across_multiple_slaves() {
    let cluster = ClusterHarness::start(vec![basic_job()]);
    cluster.add_slave("worker1", 1);
    cluster.add_slave("worker2", 1);
    cluster.add_slave("worker3", 1);

    let build_id = cluster.master.queue_build(cluster.request("BasicJob")).unwrap();
    let build = cluster.master.get_build(build_id).unwrap();
    wait_for_state(&build, BuildState::Finished, Duration::from_secs(30)).await;

    // The set of dispatched subjobs equals the set produced, each exactly
    // once, no matter how the slaves raced.
    let artifact_dir = build.artifact_directory().unwrap();
    for i in 0..5 {
        assert_atom_dir_has_default_files(&artifact_dir.join(format!("artifact_{}_0", i)));
    }
    assert_eq!(build.subjobs_remaining(), 0);
}
