//! In-memory resolver for exercising the decision engine without touching
//! the real filesystem.

use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::os::unix::io::RawFd;
use std::path::{Component, Path, PathBuf};

use crate::decision::MAX_SYMLINK_HOPS;
use crate::error::DenyReason;
use crate::normalize::{self, split_parent};
use crate::resolve::Resolver;

pub use crate::diag::MemorySink;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File,
    Symlink(PathBuf),
}

/// A small virtual tree of directories, files and symlinks, plus a working
/// directory and a descriptor table.
///
/// ```
/// use std::path::Path;
/// use sandbox_fs_core::{Resolver, testing::FakeResolver};
///
/// let fs = FakeResolver::new().dir("/srv/app").symlink("/app", "/srv/app");
/// assert_eq!(fs.canonicalize(Path::new("/app")).unwrap().as_deref(), Some(Path::new("/srv/app")));
/// ```
#[derive(Debug, Clone)]
pub struct FakeResolver {
    nodes: BTreeMap<PathBuf, Node>,
    cwd: Option<PathBuf>,
    fds: BTreeMap<RawFd, PathBuf>,
    broken: Option<&'static str>,
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeResolver {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes,
            cwd: Some(PathBuf::from("/")),
            fds: BTreeMap::new(),
            broken: None,
        }
    }

    pub fn cwd(mut self, path: impl AsRef<Path>) -> Self {
        let path = normalize::normalize(path.as_ref());
        self = self.dir(&path);
        self.cwd = Some(path);
        self
    }

    /// Working directory lookups fail, as after the cwd was removed.
    pub fn without_cwd(mut self) -> Self {
        self.cwd = None;
        self
    }

    /// Directory and all its ancestors.
    pub fn dir(mut self, path: impl AsRef<Path>) -> Self {
        let path = normalize::normalize(path.as_ref());
        self.add_ancestors(&path);
        self.nodes.entry(path).or_insert(Node::Dir);
        self
    }

    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        let path = normalize::normalize(path.as_ref());
        self.add_ancestors(&path);
        self.nodes.insert(path, Node::File);
        self
    }

    /// `link` pointing at `target`, stored verbatim (relative or absolute).
    pub fn symlink(mut self, link: impl AsRef<Path>, target: impl AsRef<Path>) -> Self {
        let link = normalize::normalize(link.as_ref());
        self.add_ancestors(&link);
        self.nodes
            .insert(link, Node::Symlink(target.as_ref().to_path_buf()));
        self
    }

    /// Open descriptor `fd` referring to `path`.
    pub fn fd(mut self, fd: RawFd, path: impl AsRef<Path>) -> Self {
        let path = normalize::normalize(path.as_ref());
        self = self.dir(&path);
        self.fds.insert(fd, path);
        self
    }

    /// Descriptor for a non-filesystem object, reported verbatim.
    pub fn anonymous_fd(mut self, fd: RawFd, name: impl AsRef<Path>) -> Self {
        self.fds.insert(fd, name.as_ref().to_path_buf());
        self
    }

    /// Every symlink lookup fails as if `symbol` could not be loaded.
    pub fn broken(mut self, symbol: &'static str) -> Self {
        self.broken = Some(symbol);
        self
    }

    fn add_ancestors(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            self.nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Dir);
        }
    }

    fn check_broken(&self) -> Result<(), DenyReason> {
        match self.broken {
            Some(symbol) => Err(DenyReason::OriginalSymbolUnavailable(symbol)),
            None => Ok(()),
        }
    }

    /// `realpath(3)` over the virtual tree: components are walked left to
    /// right, symlinks are spliced into the remaining components.
    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        let start = if normalize::is_absolute(path) {
            path.to_path_buf()
        } else {
            normalize::join(self.cwd.as_deref()?, path)
        };

        let mut pending: VecDeque<OsString> = components(&start).collect();
        let mut resolved = PathBuf::from("/");
        let mut hops = 0;

        while let Some(name) = pending.pop_front() {
            if name == ".." {
                resolved.pop();
                continue;
            }
            let candidate = resolved.join(&name);
            match self.nodes.get(&candidate)? {
                Node::Dir => resolved = candidate,
                Node::File if pending.is_empty() => resolved = candidate,
                Node::File => return None,
                Node::Symlink(target) => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return None;
                    }
                    if normalize::is_absolute(target) {
                        resolved = PathBuf::from("/");
                    }
                    for component in components(target).collect::<Vec<_>>().into_iter().rev() {
                        pending.push_front(component);
                    }
                }
            }
        }
        Some(resolved)
    }
}

fn components(path: &Path) -> impl Iterator<Item = OsString> + '_ {
    path.components().filter_map(|c| match c {
        Component::Normal(name) => Some(name.to_os_string()),
        Component::ParentDir => Some(OsString::from("..")),
        Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
    })
}

impl Resolver for FakeResolver {
    fn canonicalize(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        self.check_broken()?;
        Ok(self.resolve(path))
    }

    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        self.check_broken()?;
        let Some((parent, name)) = split_parent(path) else {
            return Ok(None);
        };
        let Some(parent) = self.resolve(parent) else {
            return Ok(None);
        };
        match self.nodes.get(&parent.join(name)) {
            Some(Node::Symlink(target)) => Ok(Some(target.clone())),
            _ => Ok(None),
        }
    }

    fn current_dir(&self) -> Result<PathBuf, DenyReason> {
        self.cwd.clone().ok_or(DenyReason::UnresolvableCwd)
    }

    fn descriptor_path(&self, fd: RawFd) -> Result<PathBuf, DenyReason> {
        self.fds
            .get(&fd)
            .cloned()
            .ok_or(DenyReason::UnresolvableDescriptor(fd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_nested_symlinks() {
        let fs = FakeResolver::new()
            .file("/app/secret.txt")
            .symlink("/ws/link1", "/")
            .symlink("/ws/link2", "link1/app");
        assert_eq!(
            fs.canonicalize(Path::new("/ws/link2/secret.txt")).unwrap(),
            Some(PathBuf::from("/app/secret.txt"))
        );
    }

    #[test]
    fn test_missing_and_dangling() {
        let fs = FakeResolver::new().symlink("/ws/dangling", "/nowhere");
        assert_eq!(fs.canonicalize(Path::new("/ws/dangling")).unwrap(), None);
        assert_eq!(fs.canonicalize(Path::new("/ws/missing")).unwrap(), None);
        assert_eq!(
            fs.read_link(Path::new("/ws/dangling")).unwrap(),
            Some(PathBuf::from("/nowhere"))
        );
        assert_eq!(fs.read_link(Path::new("/ws")).unwrap(), None);
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let fs = FakeResolver::new().file("/ws/file");
        assert_eq!(fs.canonicalize(Path::new("/ws/file/x")).unwrap(), None);
    }

    #[test]
    fn test_symlink_loop_does_not_resolve() {
        let fs = FakeResolver::new().symlink("/a", "b").symlink("/b", "a");
        assert_eq!(fs.canonicalize(Path::new("/a")).unwrap(), None);
    }

    #[test]
    fn test_descriptors_and_cwd() {
        let fs = FakeResolver::new().cwd("/ws").dir("/ws/sub").fd(3, "/ws");
        assert_eq!(fs.descriptor_path(3).unwrap(), PathBuf::from("/ws"));
        assert_eq!(fs.descriptor_path(4), Err(DenyReason::UnresolvableDescriptor(4)));
        assert_eq!(
            fs.canonicalize(Path::new("sub/..")).unwrap(),
            Some(PathBuf::from("/ws"))
        );
        assert_eq!(
            fs.without_cwd().current_dir(),
            Err(DenyReason::UnresolvableCwd)
        );
    }
}
