use super::{FileSession, document::NodeId, id_ref::FileObject};
use crate::factory::{CreateRequest, RecallFactory};
use std::fmt;

pub type LaunchFn = Box<dyn FnOnce(&mut FileSession, &RecallFactory, NodeId, &FileObject) + Send>;

pub enum LaunchKind {
    /// Runs the factory on the target audio. Created containers are bound
    /// to the launch node; when the node already holds a container the
    /// request remaps into it.
    CreateRecalls(Box<CreateRequest>),
    /// Marks the target audio connectable.
    Connect,
    Callback(LaunchFn),
}

impl fmt::Debug for LaunchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchKind::CreateRecalls(request) => f.debug_tuple("CreateRecalls").field(&request.family).finish(),
            LaunchKind::Connect => f.write_str("Connect"),
            LaunchKind::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Deferred start action bound to a document node.
#[derive(Debug)]
pub struct Launch {
    pub node: NodeId,
    pub target: FileObject,
    pub kind: LaunchKind,
}

impl Launch {
    pub fn new(node: NodeId, target: FileObject, kind: LaunchKind) -> Self {
        Self { node, target, kind }
    }

    pub fn create_recalls(node: NodeId, target: FileObject, request: CreateRequest) -> Self {
        Self::new(node, target, LaunchKind::CreateRecalls(Box::new(request)))
    }

    pub fn callback(
        node: NodeId,
        target: FileObject,
        callback: impl FnOnce(&mut FileSession, &RecallFactory, NodeId, &FileObject) + Send + 'static,
    ) -> Self {
        Self::new(node, target, LaunchKind::Callback(Box::new(callback)))
    }
}
