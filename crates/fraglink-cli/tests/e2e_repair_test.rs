use std::{fs, path::Path};

use git2::{Repository, Signature};
use tempfile::{TempDir, tempdir};

use fraglink::FraglinkError;
use fraglink_cli::{Args, RunOutcome, run};

const UUID: &str = "550e8400-e29b-41d4-a716-446655440000";
const COMMIT_MESSAGE: &str = "fix: relink fragments";

const OTHER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<org.polarsys.capella.core.data.capellamodeller:Library xmlns:xmi=\"http://www.omg.org/XMI\" id=\"550e8400-e29b-41d4-a716-446655440000\" name=\"Other\"/>\n";

fn aird() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
     <viewpoint:DAnalysis xmlns:xmi=\"http://www.omg.org/XMI\" xmlns:viewpoint=\"http://www.eclipse.org/sirius/1.1.0\" uid=\"_analysisAAAAAAAAAAAAAA\">\n  \
     <semanticResources>main.capella</semanticResources>\n  \
     <semanticResources>other.capella</semanticResources>\n\
     </viewpoint:DAnalysis>\n"
        .to_string()
}

fn main_capella(link: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <org.polarsys.capella.core.data.capellamodeller:Project xmlns:xmi=\"http://www.omg.org/XMI\" id=\"3b1f0d1e-0c1a-4f6e-9a57-2a0d6c1b9e11\" name=\"Main\">\n  \
         <ownedTraces id=\"7d2e9c44-6b8a-4a3f-8f0e-5c9b1d2a3e40\" href=\"{link}\"/>\n\
         </org.polarsys.capella.core.data.capellamodeller:Project>\n"
    )
}

/// A committed repository with one model under `model/`, plus a config
/// file kept outside of it.
struct Fixture {
    repo_dir: TempDir,
    config_dir: TempDir,
}

impl Fixture {
    fn new(main_link: &str) -> Self {
        let repo_dir = tempdir().expect("Failed to create temp directory");
        let config_dir = tempdir().expect("Failed to create temp directory");

        fs::write(
            config_dir.path().join("config.toml"),
            format!("[git]\ncommit_message = \"{COMMIT_MESSAGE}\"\n"),
        )
        .expect("Failed to write config");

        let model_dir = repo_dir.path().join("model");
        fs::create_dir_all(&model_dir).expect("Failed to create model directory");
        fs::write(model_dir.join("main.aird"), aird()).expect("Failed to write fixture");
        fs::write(model_dir.join("main.capella"), main_capella(main_link))
            .expect("Failed to write fixture");
        fs::write(model_dir.join("other.capella"), OTHER).expect("Failed to write fixture");

        let repo = Repository::init(repo_dir.path()).expect("Failed to init repository");
        let mut config = repo.config().expect("Failed to open git config");
        config.set_str("user.name", "Test").expect("Failed to set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("Failed to set user.email");

        let mut index = repo.index().expect("Failed to open index");
        for file in ["model/main.aird", "model/main.capella", "model/other.capella"] {
            index.add_path(Path::new(file)).expect("Failed to stage fixture");
        }
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = repo.find_tree(tree_id).expect("Failed to find tree");
        let signature = Signature::now("Test", "test@example.com").expect("Failed to sign");
        repo.commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[])
            .expect("Failed to commit fixture");

        Self {
            repo_dir,
            config_dir,
        }
    }

    fn args(&self, fix: bool) -> Args {
        Args {
            models: Vec::new(),
            fix,
            no_commit: false,
            commit_message: None,
            repo: Some(self.repo_dir.path().to_path_buf()),
            config: Some(
                self.config_dir
                    .path()
                    .join("config.toml")
                    .to_string_lossy()
                    .to_string(),
            ),
            log_level: "off".to_string(),
        }
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.repo_dir.path().join(relative)).expect("Failed to read file")
    }

    fn head_message(&self) -> String {
        let repo = Repository::open(self.repo_dir.path()).expect("Failed to open repository");
        let head = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .expect("Failed to resolve HEAD");
        head.message().unwrap_or_default().to_string()
    }

    fn is_clean(&self) -> bool {
        let repo = Repository::open(self.repo_dir.path()).expect("Failed to open repository");
        let statuses = repo.statuses(None).expect("Failed to read status");
        statuses
            .iter()
            .all(|entry| entry.status().is_empty() || entry.status().is_wt_new())
    }
}

#[test]
fn e2e_fix_commits_repaired_fragment() {
    let fixture = Fixture::new(&format!("index:/other.capella#{UUID}"));

    let outcome = run(&fixture.args(true)).expect("Run failed");
    assert_eq!(outcome, RunOutcome::FixedNeedsReview);
    assert_eq!(outcome.exit_code(), 1);

    assert_eq!(
        fixture.read("model/main.capella"),
        main_capella(&format!("other.capella#{UUID}"))
    );
    assert_eq!(fixture.head_message(), COMMIT_MESSAGE);
    assert!(fixture.is_clean());

    let again = run(&fixture.args(true)).expect("Second run failed");
    assert_eq!(again, RunOutcome::Clean);
    assert_eq!(fixture.head_message(), COMMIT_MESSAGE);
}

#[test]
fn e2e_check_only_leaves_files_alone() {
    let link = format!("commit:/other.capella#{UUID}");
    let fixture = Fixture::new(&link);

    let outcome = run(&fixture.args(false)).expect("Run failed");
    assert_eq!(outcome, RunOutcome::FixedNeedsReview);
    assert_eq!(fixture.read("model/main.capella"), main_capella(&link));
    assert_eq!(fixture.head_message(), "initial");
}

#[test]
fn e2e_no_commit_writes_worktree_only() {
    let fixture = Fixture::new(&format!("index:/other.capella#{UUID}"));
    let mut args = fixture.args(true);
    args.no_commit = true;

    let outcome = run(&args).expect("Run failed");
    assert_eq!(outcome, RunOutcome::FixedNeedsReview);
    assert_eq!(
        fixture.read("model/main.capella"),
        main_capella(&format!("other.capella#{UUID}"))
    );
    assert_eq!(fixture.head_message(), "initial");
    assert!(!fixture.is_clean());
}

#[test]
fn e2e_commit_message_flag_overrides_config() {
    let fixture = Fixture::new(&format!("index:/other.capella#{UUID}"));
    let mut args = fixture.args(true);
    args.commit_message = Some("chore: merge cleanup".to_string());

    run(&args).expect("Run failed");
    assert_eq!(fixture.head_message(), "chore: merge cleanup");
}

#[test]
fn e2e_dangling_link_is_broken() {
    let fixture = Fixture::new("other.capella#00000000-0000-0000-0000-000000000000");

    let outcome = run(&fixture.args(true)).expect("Run failed");
    assert_eq!(outcome, RunOutcome::Broken);
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(fixture.head_message(), "initial");
}

#[test]
fn e2e_dirty_worktree_is_refused() {
    let fixture = Fixture::new(&format!("index:/other.capella#{UUID}"));
    fs::write(fixture.repo_dir.path().join("model/other.capella"), OTHER.replace("Other", "Edited"))
        .expect("Failed to edit fixture");

    let err = run(&fixture.args(true)).expect_err("Dirty worktree should be refused");
    assert!(
        matches!(err, FraglinkError::DirtyWorktree(ref files) if files == &["model/other.capella"]),
        "{err}"
    );
    assert_eq!(
        fixture.read("model/main.capella"),
        main_capella(&format!("index:/other.capella#{UUID}"))
    );
}
