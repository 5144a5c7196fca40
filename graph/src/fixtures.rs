//! Throwaway repositories for tests.

use std::cell::Cell;
use std::collections::BTreeMap;

use anyhow::Result;
use git2::{ObjectType, Oid, Signature, Time};
use tempfile::TempDir;

use crate::git_backend::Repository;

const EPOCH: i64 = 1_700_000_000;

pub struct TestRepo {
    dir: TempDir,
    repo: git2::Repository,
    clock: Cell<i64>,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let repo = git2::Repository::init(dir.path())?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok(Self {
            dir,
            repo,
            clock: Cell::new(0),
        })
    }

    pub fn open(&self) -> Result<Repository> {
        Ok(Repository::open(self.dir.path())?)
    }

    /// Every commit is one minute younger than the previous one
    fn signature(&self, name: &str) -> Result<Signature<'static>> {
        let tick = self.clock.get() + 1;
        self.clock.set(tick);
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        Ok(Signature::new(name, &email, &Time::new(EPOCH + tick * 60, 0))?)
    }

    pub fn commit(&self, message: &str, parents: &[Oid]) -> Result<Oid> {
        self.commit_as("Test User", message, parents)
    }

    pub fn commit_as(&self, author: &str, message: &str, parents: &[Oid]) -> Result<Oid> {
        let tree_id = self.repo.treebuilder(None)?.write()?;
        self.commit_tree(author, message, parents, tree_id)
    }

    pub fn commit_files(
        &self,
        message: &str,
        parents: &[Oid],
        files: &[(&str, &str)],
    ) -> Result<Oid> {
        let files: Vec<(String, String)> = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        let tree_id = self.write_tree(&files)?;
        self.commit_tree("Test User", message, parents, tree_id)
    }

    fn commit_tree(
        &self,
        author: &str,
        message: &str,
        parents: &[Oid],
        tree_id: Oid,
    ) -> Result<Oid> {
        let sig = self.signature(author)?;
        let tree = self.repo.find_tree(tree_id)?;
        let parents = parents
            .iter()
            .map(|id| self.repo.find_commit(*id))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        Ok(self.repo.commit(None, &sig, &sig, message, &tree, &parent_refs)?)
    }

    fn write_tree(&self, files: &[(String, String)]) -> Result<Oid> {
        let mut builder = self.repo.treebuilder(None)?;
        let mut dirs: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();

        for (path, content) in files {
            match path.split_once('/') {
                Some((dir, rest)) => dirs
                    .entry(dir.to_string())
                    .or_default()
                    .push((rest.to_string(), content.clone())),
                None => {
                    let blob = self.repo.blob(content.as_bytes())?;
                    builder.insert(path, blob, 0o100644)?;
                }
            }
        }
        for (dir, entries) in dirs {
            let subtree = self.write_tree(&entries)?;
            builder.insert(&dir, subtree, 0o040000)?;
        }

        Ok(builder.write()?)
    }

    /// A commit whose parent object is absent, as at the edge of a shallow clone
    pub fn boundary_commit(&self, message: &str) -> Result<Oid> {
        let tree_id = self.repo.treebuilder(None)?.write()?;
        let missing_parent = Oid::from_bytes(&[0x42; 20])?;
        let data = format!(
            concat!(
                "tree {}\nparent {}\n",
                "author Test User <test@example.com> {} +0000\n",
                "committer Test User <test@example.com> {} +0000\n\n{}\n",
            ),
            tree_id, missing_parent, EPOCH, EPOCH, message
        );
        Ok(self.repo.odb()?.write(ObjectType::Commit, data.as_bytes())?)
    }

    /// Point `main` at `id` and check it out symbolically
    pub fn set_head(&self, id: Oid) -> Result<()> {
        self.branch("main", id)?;
        self.repo.set_head("refs/heads/main")?;
        Ok(())
    }

    pub fn branch(&self, name: &str, id: Oid) -> Result<()> {
        self.repo
            .reference(&format!("refs/heads/{}", name), id, true, "test branch")?;
        Ok(())
    }

    pub fn tag(&self, name: &str, id: Oid) -> Result<()> {
        self.repo
            .reference(&format!("refs/tags/{}", name), id, true, "test tag")?;
        Ok(())
    }
}
