//! Git operations for the repair workflow.
//!
//! Finding tracked models, refusing to run on a dirty worktree, staging
//! repaired fragments and committing them.

use std::{
    fs,
    path::{Path, PathBuf},
};

use git2::{ErrorCode, Repository, Signature, Status, StatusOptions};
use log::{debug, info, warn};

use fraglink::{FileSink, FraglinkError};
use fraglink_xml::SaveError;

const FALLBACK_NAME: &str = "fraglink";
const FALLBACK_EMAIL: &str = "fraglink@localhost";

fn git_error(err: git2::Error) -> FraglinkError {
    FraglinkError::Git(err.message().to_string())
}

/// The git repository containing the models.
pub struct ModelRepository {
    repo: Repository,
    workdir: PathBuf,
}

impl ModelRepository {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns `FraglinkError::Git` if `path` is not inside a non-bare
    /// repository.
    pub fn discover(path: &Path) -> Result<Self, FraglinkError> {
        let repo = Repository::discover(path).map_err(git_error)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| FraglinkError::Git("repository has no working tree".to_string()))?;
        let workdir = fs::canonicalize(workdir)?;

        debug!(workdir = workdir.display().to_string(); "Opened repository");
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Tracked files whose working tree state differs from the index.
    ///
    /// Staged changes and untracked files do not count.
    pub fn unstaged_changes(&self) -> Result<Vec<String>, FraglinkError> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);

        let unstaged =
            Status::WT_MODIFIED | Status::WT_DELETED | Status::WT_TYPECHANGE | Status::WT_RENAMED;
        let statuses = self.repo.statuses(Some(&mut options)).map_err(git_error)?;

        Ok(statuses
            .iter()
            .filter(|entry| entry.status().intersects(unstaged))
            .filter_map(|entry| entry.path().map(ToString::to_string))
            .collect())
    }

    /// Tracked model root files below `base`, in index order.
    ///
    /// With a non-empty `selected`, only those models (relative to `base`)
    /// are returned; selected files that are not tracked are skipped with a
    /// warning.
    pub fn tracked_models(
        &self,
        base: &Path,
        suffix: &str,
        selected: &[PathBuf],
    ) -> Result<Vec<PathBuf>, FraglinkError> {
        let base = fs::canonicalize(base)?;
        let index = self.repo.index().map_err(git_error)?;

        let tracked: Vec<PathBuf> = index
            .iter()
            .filter_map(|entry| String::from_utf8(entry.path).ok())
            .filter(|path| path.ends_with(suffix))
            .map(|path| self.workdir.join(path))
            .filter(|path| path.starts_with(&base))
            .collect();

        if selected.is_empty() {
            info!(count = tracked.len(); "Found tracked models");
            return Ok(tracked);
        }

        let mut models = Vec::with_capacity(selected.len());
        for model in selected {
            let wanted = fs::canonicalize(base.join(model)).unwrap_or_else(|_| base.join(model));
            if tracked.contains(&wanted) {
                models.push(wanted);
            } else {
                warn!(model = model.display().to_string(); "Model is not tracked, skipping");
            }
        }
        Ok(models)
    }

    /// Add the current content of `path` to the index.
    pub fn stage(&self, path: &Path) -> Result<(), FraglinkError> {
        let relative = path.strip_prefix(&self.workdir).map_err(|_| {
            FraglinkError::Git(format!("{} is outside the repository", path.display()))
        })?;

        let mut index = self.repo.index().map_err(git_error)?;
        index.add_path(relative).map_err(git_error)?;
        index.write().map_err(git_error)?;

        debug!(path = relative.display().to_string(); "Staged file");
        Ok(())
    }

    /// Commit the index on top of `HEAD` and return the new commit id.
    pub fn commit(&self, message: &str) -> Result<String, FraglinkError> {
        let mut index = self.repo.index().map_err(git_error)?;
        let tree_id = index.write_tree().map_err(git_error)?;
        let tree = self.repo.find_tree(tree_id).map_err(git_error)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(git_error)?),
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(err) => return Err(git_error(err)),
        };
        let parents: Vec<_> = parent.iter().collect();

        let config = self.repo.config().map_err(git_error)?;
        let name = config
            .get_string("user.name")
            .unwrap_or_else(|_| FALLBACK_NAME.to_string());
        let email = config
            .get_string("user.email")
            .unwrap_or_else(|_| FALLBACK_EMAIL.to_string());
        let signature = Signature::now(&name, &email).map_err(git_error)?;

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(git_error)?;

        info!(commit = oid.to_string(); "Committed repaired models");
        Ok(oid.to_string())
    }
}

/// Writes files to the working tree and stages them.
pub struct IndexSink<'r> {
    repo: &'r ModelRepository,
}

impl<'r> IndexSink<'r> {
    pub fn new(repo: &'r ModelRepository) -> Self {
        Self { repo }
    }
}

impl FileSink for IndexSink<'_> {
    fn write_file(&mut self, path: &Path, contents: &[u8]) -> Result<(), SaveError> {
        fs::write(path, contents).map_err(|source| SaveError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        self.repo
            .stage(path)
            .map_err(|err| SaveError::Stage {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        repo
    }

    #[test]
    fn test_commit_on_unborn_branch() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("a.aird"), "<a/>").unwrap();

        let repo = ModelRepository::discover(dir.path()).unwrap();
        repo.stage(&repo.workdir().join("a.aird")).unwrap();
        let first = repo.commit("first").unwrap();

        fs::write(dir.path().join("a.aird"), "<b/>").unwrap();
        repo.stage(&repo.workdir().join("a.aird")).unwrap();
        let second = repo.commit("second").unwrap();

        let commit = repo
            .repo
            .find_commit(git2::Oid::from_str(&second).unwrap())
            .unwrap();
        assert_eq!(commit.parent_id(0).unwrap().to_string(), first);
        assert_eq!(commit.author().name(), Some("Test"));
    }

    #[test]
    fn test_tracked_models_and_dirty_files() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        fs::create_dir_all(dir.path().join("m/sub")).unwrap();
        fs::write(dir.path().join("m/one.aird"), "<a/>").unwrap();
        fs::write(dir.path().join("m/sub/two.aird"), "<a/>").unwrap();
        fs::write(dir.path().join("m/untracked.aird"), "<a/>").unwrap();
        fs::write(dir.path().join("m/one.capella"), "<a/>").unwrap();

        let repo = ModelRepository::discover(dir.path()).unwrap();
        for file in ["m/one.aird", "m/sub/two.aird", "m/one.capella"] {
            repo.stage(&repo.workdir().join(file)).unwrap();
        }

        let all = repo.tracked_models(dir.path(), ".aird", &[]).unwrap();
        assert_eq!(
            all,
            vec![repo.workdir().join("m/one.aird"), repo.workdir().join("m/sub/two.aird")]
        );

        let below = repo.tracked_models(&dir.path().join("m/sub"), ".aird", &[]).unwrap();
        assert_eq!(below, vec![repo.workdir().join("m/sub/two.aird")]);

        let selected = repo
            .tracked_models(
                &dir.path().join("m"),
                ".aird",
                &[PathBuf::from("sub/two.aird"), PathBuf::from("untracked.aird")],
            )
            .unwrap();
        assert_eq!(selected, vec![repo.workdir().join("m/sub/two.aird")]);

        assert!(repo.unstaged_changes().unwrap().is_empty());
        fs::write(dir.path().join("m/one.capella"), "<changed/>").unwrap();
        assert_eq!(repo.unstaged_changes().unwrap(), vec!["m/one.capella"]);
    }
}
