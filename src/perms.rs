//! Folder-delegated permissions.
//!
//! Assets do not carry their own ACLs. An asset is accessible to its owner
//! and to superusers; anyone else is judged by the folder hierarchy the
//! asset lives in. The hierarchy check sits behind the
//! [`PermissionResolver`] trait so the asset layer stays decoupled from how
//! folders are stored; [`FolderTree`] is the in-memory implementation — an
//! explicit walk up the parent chain rather than recursive dispatch.

use std::collections::BTreeMap;

/// Opaque folder identity.
pub type FolderId = u64;

/// Opaque user identity.
pub type UserId = u64;

/// The capability kinds an asset or folder can be checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionKind {
    Read,
    Edit,
    AddChildren,
}

/// The requesting principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub is_superuser: bool,
    pub is_authenticated: bool,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            is_superuser: false,
            is_authenticated: true,
        }
    }

    pub fn superuser(id: UserId) -> Self {
        Self {
            id,
            is_superuser: true,
            is_authenticated: true,
        }
    }

    /// The unauthenticated principal. Fails every check unconditionally.
    pub fn anonymous() -> Self {
        Self {
            id: 0,
            is_superuser: false,
            is_authenticated: false,
        }
    }
}

/// Capability lookup for a folder, however folders happen to be stored.
pub trait PermissionResolver {
    fn has_permission(&self, folder: FolderId, user: &User, kind: PermissionKind) -> bool;
}

/// One folder node: owner plus explicit per-user grants.
#[derive(Debug, Clone, Default)]
pub struct Folder {
    pub parent: Option<FolderId>,
    pub owner: Option<UserId>,
    /// Explicit grants: (user, kind) pairs allowed on this folder.
    pub grants: Vec<(UserId, PermissionKind)>,
}

/// In-memory folder hierarchy with walk-up permission resolution.
///
/// A user passes when any folder from the asset's folder up to the root
/// either is owned by them or carries a matching grant.
#[derive(Debug, Default)]
pub struct FolderTree {
    folders: BTreeMap<FolderId, Folder>,
}

impl FolderTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: FolderId, folder: Folder) {
        self.folders.insert(id, folder);
    }

    fn allowed_here(folder: &Folder, user: &User, kind: PermissionKind) -> bool {
        if folder.owner == Some(user.id) {
            return true;
        }
        folder
            .grants
            .iter()
            .any(|&(grantee, granted)| grantee == user.id && granted == kind)
    }
}

impl PermissionResolver for FolderTree {
    fn has_permission(&self, folder: FolderId, user: &User, kind: PermissionKind) -> bool {
        if !user.is_authenticated {
            return false;
        }
        if user.is_superuser {
            return true;
        }

        let mut current = Some(folder);
        // Guard against cycles in a malformed tree: never walk more levels
        // than there are folders.
        let mut remaining = self.folders.len();
        while let Some(id) = current {
            let Some(node) = self.folders.get(&id) else {
                return false;
            };
            if Self::allowed_here(node, user, kind) {
                return true;
            }
            if remaining == 0 {
                return false;
            }
            remaining -= 1;
            current = node.parent;
        }
        false
    }
}
