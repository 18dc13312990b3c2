use super::{FileSession, document::NodeId, id_ref::FileObject};
use std::fmt;

pub type LookupFn = Box<dyn FnOnce(&mut FileSession, NodeId, &FileObject) + Send>;

pub enum LookupKind {
    /// Read side: link the target channel to the channel `xpath` selects.
    ChannelLink { xpath: String },
    /// Write side: record the target channel's partner as the node's
    /// `link` attribute once every channel has an id.
    WriteLink,
    Callback(LookupFn),
}

impl fmt::Debug for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::ChannelLink { xpath } => f.debug_struct("ChannelLink").field("xpath", xpath).finish(),
            LookupKind::WriteLink => f.write_str("WriteLink"),
            LookupKind::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Deferred reference fix-up bound to a document node.
#[derive(Debug)]
pub struct Lookup {
    pub node: NodeId,
    pub target: FileObject,
    pub kind: LookupKind,
}

impl Lookup {
    pub fn new(node: NodeId, target: FileObject, kind: LookupKind) -> Self {
        Self { node, target, kind }
    }

    pub fn callback(
        node: NodeId,
        target: FileObject,
        callback: impl FnOnce(&mut FileSession, NodeId, &FileObject) + Send + 'static,
    ) -> Self {
        Self::new(node, target, LookupKind::Callback(Box::new(callback)))
    }
}
