pub mod document;
pub mod id_ref;
pub mod launch;
pub mod lookup;
pub mod read;
pub mod write;
pub mod xpath;

use crate::{
    channel::{self, LinkError},
    factory::{FactoryWarning, RecallFactory},
    flags::CreateFlags,
};
use document::{Document, NodeId};
use id_ref::{FileObject, IdRef};
use launch::{Launch, LaunchKind};
use lookup::{Lookup, LookupKind};
use thiserror::Error;
use tracing::{debug, warn};
use xpath::{PathError, PathExpr};

pub use read::{ProjectReader, ReadReport, load_project};
pub use write::{WriteReport, save_project, write_project};

/// Root node name of a project document.
pub const PROJECT_NODE: &str = "rackwire-project";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Read,
    Write,
}

/// Progress of the deferred passes. Each pass runs once, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Collecting,
    LookupsResolved,
    Launched,
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("expected a {expected} node, found {found}")]
    UnexpectedNode { expected: &'static str, found: String },
    #[error("{node} has no {attribute} attribute")]
    MissingAttribute { node: String, attribute: &'static str },
    #[error("{node} has a bad {attribute} attribute {value:?}")]
    BadAttribute {
        node: String,
        attribute: &'static str,
        value: String,
    },
    #[error("cannot {action} in phase {phase:?}")]
    Phase { action: &'static str, phase: Phase },
}

/// Tolerated problems met during a load or save. They never stop the pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileDiagnostic {
    #[error("{0} matches no bound object")]
    UnresolvedReference(String),
    #[error(transparent)]
    MalformedPath(#[from] PathError),
    #[error("link of {channel} rejected: {error}")]
    LinkRejected { channel: String, error: LinkError },
    #[error("{node} links to a channel outside the project")]
    UnwrittenReference { node: String },
    #[error("no plugin registry knows {filename}:{effect}")]
    UnknownPlugin { filename: String, effect: String },
    #[error(transparent)]
    Factory(#[from] FactoryWarning),
    #[error("{queue} entry for {node} queued after its pass, dropped")]
    DroppedEntry { queue: &'static str, node: String },
    #[error("{node} has a bad {attribute} attribute {value:?}, ignored")]
    BadAttribute {
        node: String,
        attribute: &'static str,
        value: String,
    },
}

/// One load or save: the document, the id-ref table and the deferred
/// queues.
pub struct FileSession {
    pub document: Document,
    mode: SessionMode,
    phase: Phase,
    id_refs: Vec<IdRef>,
    lookups: Vec<Lookup>,
    launches: Vec<Launch>,
    diagnostics: Vec<FileDiagnostic>,
    next_id: usize,
}

impl FileSession {
    pub fn new(document: Document, mode: SessionMode) -> Self {
        Self {
            document,
            mode,
            phase: Phase::Collecting,
            id_refs: vec![],
            lookups: vec![],
            launches: vec![],
            diagnostics: vec![],
            next_id: 1,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn id_refs(&self) -> &[IdRef] {
        &self.id_refs
    }

    pub fn diagnostics(&self) -> &[FileDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<FileDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn diagnose(&mut self, diagnostic: FileDiagnostic) {
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Fresh document-unique identifier, `prefix-N`.
    pub fn generate_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}-{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Label of a node for messages: its name and, if any, its id.
    pub fn describe_node(&self, node: NodeId) -> String {
        match self.document.attribute(node, "id") {
            Some(id) => format!("{}#{id}", self.document.name(node)),
            None => self.document.name(node).to_string(),
        }
    }

    /// Binds `node` to `reference`. Newer entries shadow older ones.
    pub fn add_id_ref(&mut self, node: NodeId, reference: FileObject) {
        let xpath = self.document.attribute(node, "id").map(xpath::id_expression);
        self.id_refs.insert(
            0,
            IdRef {
                node,
                xpath,
                reference,
            },
        );
    }

    pub fn find_id_ref_by_node(&self, node: NodeId) -> Option<&IdRef> {
        self.id_refs.iter().find(|id_ref| id_ref.node == node)
    }

    /// Objects bound to the nodes `expression` selects. A malformed
    /// expression or one without matches yields nothing and a diagnostic.
    pub fn find_id_ref_by_xpath(&mut self, expression: &str) -> Vec<FileObject> {
        let path = match PathExpr::parse(expression) {
            Ok(path) => path,
            Err(error) => {
                self.diagnose(error.into());
                return vec![];
            }
        };
        let nodes = path.evaluate(&self.document);
        let found: Vec<FileObject> = nodes
            .into_iter()
            .filter_map(|node| self.find_id_ref_by_node(node))
            .map(|id_ref| id_ref.reference.clone())
            .collect();
        if found.is_empty() {
            self.diagnose(FileDiagnostic::UnresolvedReference(expression.to_string()));
        }
        found
    }

    pub fn find_id_ref_by_reference(&self, reference: &FileObject) -> Vec<&IdRef> {
        self.id_refs
            .iter()
            .filter(|id_ref| id_ref.reference.same_as(reference))
            .collect()
    }

    pub fn add_lookup(&mut self, lookup: Lookup) {
        if self.phase != Phase::Collecting {
            let node = self.describe_node(lookup.node);
            self.diagnose(FileDiagnostic::DroppedEntry {
                queue: "lookup",
                node,
            });
            return;
        }
        self.lookups.push(lookup);
    }

    pub fn add_launch(&mut self, launch: Launch) {
        if self.phase == Phase::Launched {
            let node = self.describe_node(launch.node);
            self.diagnose(FileDiagnostic::DroppedEntry {
                queue: "launch",
                node,
            });
            return;
        }
        self.launches.push(launch);
    }

    pub fn pending_lookups(&self) -> usize {
        self.lookups.len()
    }

    pub fn pending_launches(&self) -> usize {
        self.launches.len()
    }

    /// Runs every queued lookup once: declaration order when writing,
    /// reverse declaration order when reading.
    pub fn resolve_all_lookups(&mut self) -> Result<(), FileError> {
        if self.phase != Phase::Collecting {
            return Err(FileError::Phase {
                action: "resolve lookups",
                phase: self.phase,
            });
        }
        self.phase = Phase::LookupsResolved;
        let mut lookups = std::mem::take(&mut self.lookups);
        if self.mode == SessionMode::Read {
            lookups.reverse();
        }
        debug!("resolving {} lookups", lookups.len());
        for lookup in lookups {
            self.run_lookup(lookup);
        }
        Ok(())
    }

    /// Runs every queued launch once in reverse declaration order. Only
    /// allowed after the lookups resolved.
    pub fn start_all_launches(&mut self, factory: &RecallFactory) -> Result<(), FileError> {
        if self.phase != Phase::LookupsResolved {
            return Err(FileError::Phase {
                action: "start launches",
                phase: self.phase,
            });
        }
        self.phase = Phase::Launched;
        let launches = std::mem::take(&mut self.launches);
        debug!("starting {} launches", launches.len());
        for launch in launches.into_iter().rev() {
            self.run_launch(factory, launch);
        }
        Ok(())
    }

    fn run_lookup(&mut self, lookup: Lookup) {
        let Lookup { node, target, kind } = lookup;
        match kind {
            LookupKind::ChannelLink { xpath } => self.link_channel(node, &target, &xpath),
            LookupKind::WriteLink => self.write_link(node, &target),
            LookupKind::Callback(callback) => callback(self, node, &target),
        }
    }

    fn link_channel(&mut self, node: NodeId, target: &FileObject, xpath: &str) {
        let Some(channel) = target.as_channel() else {
            return;
        };
        let found = self.find_id_ref_by_xpath(xpath);
        let Some(partner) = found.iter().find_map(FileObject::as_channel) else {
            if !found.is_empty() {
                self.diagnose(FileDiagnostic::UnresolvedReference(xpath.to_string()));
            }
            return;
        };
        if let Err(error) = channel::set_link(channel, Some(partner)) {
            let channel = self.describe_node(node);
            self.diagnose(FileDiagnostic::LinkRejected { channel, error });
        }
    }

    fn write_link(&mut self, node: NodeId, target: &FileObject) {
        let Some(channel) = target.as_channel() else {
            return;
        };
        let Some(partner) = channel.lock().link() else {
            return;
        };
        let xpath = self
            .find_id_ref_by_reference(&FileObject::Channel(partner))
            .into_iter()
            .find_map(|id_ref| id_ref.xpath.clone());
        match xpath {
            Some(xpath) => self.document.set_attribute(node, "link", xpath),
            None => {
                let node = self.describe_node(node);
                self.diagnose(FileDiagnostic::UnwrittenReference { node });
            }
        }
    }

    fn run_launch(&mut self, factory: &RecallFactory, launch: Launch) {
        let Launch { node, target, kind } = launch;
        match kind {
            LaunchKind::CreateRecalls(request) => {
                let mut request = *request;
                let bound = self
                    .find_id_ref_by_node(node)
                    .and_then(|id_ref| id_ref.reference.as_container().cloned());
                if let Some(container) = bound {
                    request.create_flags |= CreateFlags::REMAP;
                    request = if request.create_flags.contains(CreateFlags::PLAY) {
                        request.with_containers(Some(container), None)
                    } else {
                        request.with_containers(None, Some(container))
                    };
                }
                let output = factory.create(target.as_audio(), request);
                for container in output.containers() {
                    self.add_id_ref(node, FileObject::Container(container));
                }
                for warning in output.warnings {
                    self.diagnostics.push(FileDiagnostic::Factory(warning));
                }
            }
            LaunchKind::Connect => {
                if let Some(audio) = target.as_audio() {
                    audio.lock().connected = true;
                }
            }
            LaunchKind::Callback(callback) => callback(self, factory, node, &target),
        }
    }
}

impl std::fmt::Debug for FileSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSession")
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .field("nodes", &self.document.len())
            .field("id_refs", &self.id_refs.len())
            .field("lookups", &self.lookups.len())
            .field("launches", &self.launches.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}
