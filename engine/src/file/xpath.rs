use super::document::{Document, NodeId};
use std::collections::HashSet;
use thiserror::Error;

pub const PREFIX: &str = "xpath=";

/// Expression selecting the element whose `id` attribute is `id`.
pub fn id_expression(id: &str) -> String {
    format!("{PREFIX}//*[@id='{id}']")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path {0:?} does not start with \"xpath=\"")]
    MissingPrefix(String),
    #[error("path {0:?} must start with '/'")]
    Relative(String),
    #[error("malformed step {0:?}")]
    Step(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: Option<String>,
    predicate: Option<(String, String)>,
}

impl Step {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        if let Some(name) = &self.name {
            if document.name(node) != name {
                return false;
            }
        }
        match &self.predicate {
            Some((key, value)) => document.attribute(node, key) == Some(value.as_str()),
            None => true,
        }
    }
}

/// The structural queries cross-references use: `/a/b`, `//b`, `*` and
/// one `[@attr='value']` predicate per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    steps: Vec<Step>,
}

fn parse_step(axis: Axis, text: &str) -> Result<Step, PathError> {
    let malformed = || PathError::Step(text.to_string());
    let (name, predicate) = match text.find('[') {
        Some(open) => {
            let body = text[open..]
                .strip_prefix("[@")
                .and_then(|b| b.strip_suffix(']'))
                .ok_or_else(malformed)?;
            let (key, quoted) = body.split_once('=').ok_or_else(malformed)?;
            let quoted = quoted.trim();
            let value = quoted
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| quoted.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(malformed)?;
            (&text[..open], Some((key.trim().to_string(), value.to_string())))
        }
        None => (text, None),
    };
    let valid_name = |c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':');
    let name = match name {
        "*" => None,
        "" => return Err(malformed()),
        name if name.chars().all(valid_name) => Some(name.to_string()),
        _ => return Err(malformed()),
    };
    Ok(Step {
        axis,
        name,
        predicate,
    })
}

/// Splits at '/' outside of brackets and quotes.
fn split_steps(text: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

impl PathExpr {
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let path = text
            .strip_prefix(PREFIX)
            .ok_or_else(|| PathError::MissingPrefix(text.to_string()))?;
        if !path.starts_with('/') {
            return Err(PathError::Relative(text.to_string()));
        }

        // A leading '/' yields an empty first part; every further empty
        // part marks a '//' descendant step.
        let mut steps = vec![];
        let mut axis = Axis::Child;
        for part in split_steps(path).into_iter().skip(1) {
            if part.is_empty() {
                if axis == Axis::Descendant {
                    return Err(PathError::Step(text.to_string()));
                }
                axis = Axis::Descendant;
                continue;
            }
            steps.push(parse_step(axis, part)?);
            axis = Axis::Child;
        }
        if steps.is_empty() || axis == Axis::Descendant {
            return Err(PathError::Step(text.to_string()));
        }
        Ok(Self { steps })
    }

    /// Matching nodes in document order, without duplicates.
    pub fn evaluate(&self, document: &Document) -> Vec<NodeId> {
        let root = document.root();
        let mut context: Vec<Option<NodeId>> = vec![None];
        for step in &self.steps {
            let mut seen = HashSet::new();
            let mut next = vec![];
            for node in &context {
                let candidates = match (node, step.axis) {
                    (None, Axis::Child) => vec![root],
                    (None, Axis::Descendant) => {
                        let mut all = vec![root];
                        all.extend(document.descendants(root));
                        all
                    }
                    (Some(node), Axis::Child) => document.children(*node).to_vec(),
                    (Some(node), Axis::Descendant) => document.descendants(*node),
                };
                for candidate in candidates {
                    if step.matches(document, candidate) && seen.insert(candidate) {
                        next.push(Some(candidate));
                    }
                }
            }
            context = next;
        }
        context.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn project() -> Document {
        let mut doc = Document::new("project");
        let root = doc.root();
        let list = doc.add_child(root, "audio-list");
        for (id, name) in [("audio-1", "drums"), ("audio-2", "bass")] {
            let audio = doc.add_child(list, "audio");
            doc.set_attribute(audio, "id", id);
            doc.set_attribute(audio, "name", name);
            let channels = doc.add_child(audio, "channel-list");
            let channel = doc.add_child(channels, "channel");
            doc.set_attribute(channel, "id", format!("{id}-ch"));
        }
        doc
    }

    fn names(doc: &Document, nodes: &[NodeId], attr: &str) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|n| doc.attribute(*n, attr).map(str::to_string))
            .collect()
    }

    #[rstest]
    #[case("xpath=//*[@id='audio-2']", vec!["audio-2"])]
    #[case("xpath=//audio", vec!["audio-1", "audio-2"])]
    #[case("xpath=/project/audio-list/audio[@name=\"drums\"]", vec!["audio-1"])]
    #[case("xpath=//audio//channel", vec!["audio-1-ch", "audio-2-ch"])]
    #[case("xpath=//audio[@id='audio-1']/channel-list/*", vec!["audio-1-ch"])]
    #[case("xpath=//*[@id='nowhere']", vec![])]
    #[case("xpath=/audio-list", vec![])]
    fn evaluates_supported_subset(#[case] path: &str, #[case] expected: Vec<&str>) {
        let doc = project();
        let found = PathExpr::parse(path).unwrap().evaluate(&doc);
        assert_eq!(names(&doc, &found, "id"), expected);
    }

    #[rstest]
    #[case("//*[@id='a']")]
    #[case("xpath=audio")]
    #[case("xpath=//")]
    #[case("xpath=///audio")]
    #[case("xpath=//audio[@id='a'")]
    #[case("xpath=//audio[id='a']")]
    #[case("xpath=//au dio")]
    fn rejects_malformed_paths(#[case] path: &str) {
        assert!(PathExpr::parse(path).is_err());
    }

    #[test]
    fn id_expression_selects_by_id() {
        let doc = project();
        let path = PathExpr::parse(&id_expression("audio-1-ch")).unwrap();
        assert_eq!(names(&doc, &path.evaluate(&doc), "id"), vec!["audio-1-ch"]);
    }
}
