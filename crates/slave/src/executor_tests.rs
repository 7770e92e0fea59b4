// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clusterrunner_adapters::{GitConfig, StandardProjectFactory};
use clusterrunner_core::subjob::{
    COMMAND_FILENAME, CONSOLE_OUTPUT_FILENAME, EXIT_CODE_FILENAME, TIME_FILENAME,
};
use clusterrunner_core::test_support::{atom, one_atom_subjob};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

fn factory() -> Arc<dyn ProjectTypeFactory> {
    Arc::new(StandardProjectFactory::new(
        GitConfig::default(),
        HashMap::new(),
    ))
}

fn executor(results_root: &Path, num_executors: u32) -> SlaveExecutor {
    SlaveExecutor::new(
        ExecutorConfig {
            command_timeout: Duration::from_secs(30),
            results_root: results_root.to_path_buf(),
        },
        num_executors,
        factory(),
    )
}

fn setup_for(project_dir: &Path, job_config: JobConfig) -> BuildSetup {
    let mut params = HashMap::new();
    params.insert("type".to_string(), "directory".to_string());
    params.insert(
        "project_directory".to_string(),
        project_dir.display().to_string(),
    );
    BuildSetup::new(BuildId::new(1), job_config, params)
}

#[tokio::test]
async fn setup_runs_commands_and_completes() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    let job = JobConfig {
        setup_commands: vec!["echo \"setup.\" > $PROJECT_DIR/build_setup.txt".to_string()],
        ..JobConfig::new("Build")
    };

    exec.run_setup(setup_for(project.path(), job)).await.unwrap();

    assert_eq!(exec.state(), SlaveState::SetupCompleted);
    assert_eq!(exec.current_build_id(), Some(BuildId::new(1)));
    assert_eq!(
        std::fs::read_to_string(project.path().join("build_setup.txt")).unwrap(),
        "setup.\n"
    );
}

#[tokio::test]
async fn failed_setup_returns_the_executor_to_idle() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    let job = JobConfig {
        setup_commands: vec!["exit 7".to_string()],
        ..JobConfig::new("Build")
    };

    let err = exec.run_setup(setup_for(project.path(), job)).await;

    assert!(matches!(err, Err(ExecutorError::SetupFailed(_))));
    assert_eq!(exec.state(), SlaveState::Idle);
    assert_eq!(exec.current_build_id(), None);
}

#[tokio::test]
async fn subjob_before_setup_is_a_bad_request() {
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    let subjob = one_atom_subjob(1, 0, atom(0, "TOKEN", "v"), &["true"]);

    let err = exec.run_subjob(subjob).await;

    assert!(matches!(err, Err(ExecutorError::BadRequest(_))));
    assert_eq!(exec.state(), SlaveState::Idle, "state is untouched");
}

#[tokio::test]
async fn teardown_before_setup_is_a_bad_request() {
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);

    let err = exec.run_teardown().await;

    assert!(matches!(err, Err(ExecutorError::BadRequest(_))));
    assert_eq!(exec.state(), SlaveState::Idle);
}

#[tokio::test]
async fn second_setup_without_teardown_is_a_bad_request() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    exec.run_setup(setup_for(project.path(), JobConfig::new("Build")))
        .await
        .unwrap();

    let err = exec
        .run_setup(setup_for(project.path(), JobConfig::new("Build")))
        .await;

    assert!(matches!(err, Err(ExecutorError::BadRequest(_))));
    assert_eq!(exec.state(), SlaveState::SetupCompleted);
}

#[tokio::test]
async fn subjob_for_a_different_build_is_a_bad_request() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    exec.run_setup(setup_for(project.path(), JobConfig::new("Build")))
        .await
        .unwrap();

    let foreign = one_atom_subjob(9, 0, atom(0, "TOKEN", "v"), &["true"]);
    let err = exec.run_subjob(foreign).await;

    assert!(matches!(err, Err(ExecutorError::BadRequest(_))));
}

#[tokio::test]
async fn subjob_produces_a_payload_with_the_artifact_contract() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    exec.run_setup(setup_for(project.path(), JobConfig::new("Build")))
        .await
        .unwrap();

    let subjob = one_atom_subjob(
        1,
        0,
        atom(0, "TOKEN", "This is atom 0"),
        &["echo $TOKEN > $ARTIFACT_DIR/result.txt"],
    );
    let payload = exec.run_subjob(subjob).await.unwrap();

    assert_eq!(exec.state(), SlaveState::SetupCompleted, "slot released");

    let out = tempfile::tempdir().unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(&payload.tarball[..]));
    archive.unpack(out.path()).unwrap();
    let dir = out.path().join("artifact_0_0");
    for meta in [
        COMMAND_FILENAME,
        CONSOLE_OUTPUT_FILENAME,
        EXIT_CODE_FILENAME,
        TIME_FILENAME,
    ] {
        assert!(dir.join(meta).is_file(), "{} must be present", meta);
    }
    assert_eq!(
        std::fs::read_to_string(dir.join("result.txt")).unwrap(),
        "This is atom 0\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join(EXIT_CODE_FILENAME)).unwrap(),
        "0\n"
    );
}

#[tokio::test]
async fn failing_atom_is_recorded_not_raised() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    exec.run_setup(setup_for(project.path(), JobConfig::new("Build")))
        .await
        .unwrap();

    let subjob = one_atom_subjob(
        1,
        0,
        atom(0, "TOKEN", "This is atom 3"),
        &[
            "if [ \"$TOKEN\" = \"This is atom 3\" ]; then exit 1; fi",
            "echo $TOKEN > $ARTIFACT_DIR/result.txt",
        ],
    );
    let payload = exec.run_subjob(subjob).await.unwrap();

    let out = tempfile::tempdir().unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(&payload.tarball[..]));
    archive.unpack(out.path()).unwrap();
    let dir = out.path().join("artifact_0_0");
    assert_eq!(
        std::fs::read_to_string(dir.join(EXIT_CODE_FILENAME)).unwrap(),
        "1\n"
    );
    assert!(
        !dir.join("result.txt").exists(),
        "the failing entry stops the command chain"
    );
}

#[tokio::test]
async fn teardown_runs_commands_and_returns_to_idle() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    let job = JobConfig {
        setup_commands: vec!["echo \"setup.\" > $PROJECT_DIR/log.txt".to_string()],
        teardown_commands: vec!["echo \"teardown.\" >> $PROJECT_DIR/log.txt".to_string()],
        ..JobConfig::new("Build")
    };
    exec.run_setup(setup_for(project.path(), job)).await.unwrap();

    exec.run_teardown().await.unwrap();

    assert_eq!(exec.state(), SlaveState::Idle);
    assert_eq!(exec.current_build_id(), None);
    assert_eq!(
        std::fs::read_to_string(project.path().join("log.txt")).unwrap(),
        "setup.\nteardown.\n"
    );

    // Exactly one teardown per build.
    let err = exec.run_teardown().await;
    assert!(matches!(err, Err(ExecutorError::BadRequest(_))));
}

#[tokio::test]
async fn setup_subjobs_teardown_sequence_composes() {
    let project = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let exec = executor(results.path(), 1);
    let job = JobConfig {
        setup_commands: vec!["echo \"setup.\" > $PROJECT_DIR/build_setup.txt".to_string()],
        teardown_commands: vec![
            "ALL_SUBJOB_FILES=$(ls $PROJECT_DIR/subjob_file_*.txt)".to_string(),
            "echo \"teardown.\" | tee -a $ALL_SUBJOB_FILES".to_string(),
        ],
        ..JobConfig::new("JobWithSetupAndTeardown")
    };
    exec.run_setup(setup_for(project.path(), job)).await.unwrap();

    let commands = [
        "MY_SUBJOB_FILE=$PROJECT_DIR/subjob_file_${SUBJOB_NUMBER}.txt",
        "cp build_setup.txt $MY_SUBJOB_FILE",
        "echo \"subjob ${SUBJOB_NUMBER}.\" >> $MY_SUBJOB_FILE",
    ];
    for n in 1..=3u64 {
        let subjob = one_atom_subjob(
            1,
            n - 1,
            atom(n - 1, "SUBJOB_NUMBER", &n.to_string()),
            &commands,
        );
        exec.run_subjob(subjob).await.unwrap();
    }
    exec.run_teardown().await.unwrap();

    for n in 1..=3 {
        let body =
            std::fs::read_to_string(project.path().join(format!("subjob_file_{}.txt", n)))
                .unwrap();
        assert_eq!(body, format!("setup.\nsubjob {}.\nteardown.\n", n));
    }
}
