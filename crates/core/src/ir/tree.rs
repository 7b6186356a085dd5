//! URL segment tree that shapes the builder hierarchy.
//!
//! Nodes live in one arena and refer to each other by index. Literal children
//! are keyed by their text; every parameter child at a position shares the
//! key [`PARAM_KEY`], so `/x/{a}/y` and `/x/{b}/y` fold into one branch.
//! Only a segment that is exactly one `{placeholder}` is a parameter;
//! `{name}.json` stays a literal keyed by its text.

use std::collections::BTreeMap;

use tracing::info;

use super::api::Operation;
use super::extract::placeholders;
use super::types::TypeRef;

/// Child key shared by all parameter segments.
pub const PARAM_KEY: &str = "{}";

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// What one tree level matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// The path root, above the first segment.
    Root,
    /// Fixed text, including segments with embedded placeholders.
    Literal(String),
    /// Name and type come from the first operation that created the node.
    Param {
        /// Placeholder name.
        name: String,
        /// Placeholder type.
        ty: TypeRef,
    },
}

/// One path segment position shared by some operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Segment this node matches.
    pub segment: Segment,
    /// `None` for the root.
    pub parent: Option<NodeId>,
    /// Number of segments from the root.
    pub depth: usize,
    /// Child nodes by key: literal text or [`PARAM_KEY`].
    pub children: BTreeMap<String, NodeId>,
    /// Indexes into the operation slice, in encounter order.
    pub operations: Vec<usize>,
}

/// Operations arranged by path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTree {
    nodes: Vec<Node>,
}

impl PathTree {
    /// Id of the root node.
    pub const ROOT: NodeId = 0;

    /// Fold operations into a tree, one level per non-empty path segment.
    pub fn build(operations: &[Operation]) -> Self {
        let mut tree = Self {
            nodes: vec![Node {
                segment: Segment::Root,
                parent: None,
                depth: 0,
                children: BTreeMap::new(),
                operations: Vec::new(),
            }],
        };

        for (index, op) in operations.iter().enumerate() {
            let mut current = Self::ROOT;
            let mut param_index = 0;

            for raw in op.path.split('/').filter(|s| !s.is_empty()) {
                let (key, segment) = match whole_placeholder(raw) {
                    Some(name) => {
                        let ty = op
                            .path_params
                            .get(param_index)
                            .map_or(TypeRef::String, |p| p.ty.clone());
                        (
                            PARAM_KEY.to_string(),
                            Segment::Param {
                                name: name.to_string(),
                                ty,
                            },
                        )
                    }
                    None => (raw.to_string(), Segment::Literal(raw.to_string())),
                };
                param_index += placeholders(raw).len();
                current = tree.child_or_insert(current, key, segment);
            }

            tree.nodes[current].operations.push(index);
        }

        info!(nodes = tree.nodes.len(), operations = operations.len(), "Built path tree");
        tree
    }

    fn child_or_insert(&mut self, parent: NodeId, key: String, segment: Segment) -> NodeId {
        if let Some(&id) = self.nodes[parent].children.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(Node {
            segment,
            parent: Some(parent),
            depth,
            children: BTreeMap::new(),
            operations: Vec::new(),
        });
        self.nodes[parent].children.insert(key, id);
        id
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Children of `id` in key order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (&str, NodeId)> {
        self.nodes[id]
            .children
            .iter()
            .map(|(key, &child)| (key.as_str(), child))
    }

    /// Follow literal keys (or [`PARAM_KEY`]) from the root.
    pub fn find(&self, keys: &[&str]) -> Option<NodeId> {
        keys.iter()
            .try_fold(Self::ROOT, |id, key| self.nodes[id].children.get(*key).copied())
    }

    /// Every node in depth-first, key-sorted order, starting at `start`.
    pub fn walk(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.values().rev());
        }
        order
    }

    /// Nodes from the root down to `id`, root excluded.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::with_capacity(self.nodes[id].depth);
        let mut current = Some(id);
        while let Some(node) = current {
            if node == Self::ROOT {
                break;
            }
            chain.push(node);
            current = self.nodes[node].parent;
        }
        chain.reverse();
        chain
    }
}

/// Name of a segment that is exactly one `{placeholder}`.
fn whole_placeholder(segment: &str) -> Option<&str> {
    let name = segment.strip_prefix('{')?.strip_suffix('}')?;
    (!name.contains(['{', '}'])).then_some(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ir::api::{HttpMethod, PathParam, ResponseType};
    use crate::naming::OwnershipRule;

    fn op(id: &str, method: HttpMethod, path: &str, params: &[(&str, TypeRef)]) -> Operation {
        Operation {
            id: id.to_string(),
            method,
            path: path.to_string(),
            path_params: params
                .iter()
                .map(|(name, ty)| PathParam {
                    name: (*name).to_string(),
                    ty: ty.clone(),
                    description: None,
                })
                .collect(),
            query_params: Vec::new(),
            body: None,
            response: ResponseType::Empty,
            service: "things".into(),
            package: "things".into(),
            rule: OwnershipRule::Tag,
            fn_name: id.to_string(),
            summary: None,
            description: None,
        }
    }

    #[test]
    fn test_params_merge_by_position() {
        let ops = vec![
            op("getA", HttpMethod::Get, "/things/{a}/sub", &[("a", TypeRef::Int64)]),
            op("getB", HttpMethod::Get, "/things/{b}/sub", &[("b", TypeRef::String)]),
        ];
        let tree = PathTree::build(&ops);

        assert_eq!(tree.len(), 4);
        let param = tree.find(&["things", PARAM_KEY]).unwrap();
        assert_eq!(
            tree.node(param).segment,
            Segment::Param {
                name: "a".into(),
                ty: TypeRef::Int64
            }
        );
        let sub = tree.find(&["things", PARAM_KEY, "sub"]).unwrap();
        assert_eq!(tree.node(sub).operations, vec![0, 1]);

        // Each operation keeps its own parameter name.
        assert_eq!(ops[1].path_params[0].name, "b");
    }

    #[test]
    fn test_operations_keep_encounter_order() {
        let ops = vec![
            op("put", HttpMethod::Put, "/things", &[]),
            op("delete", HttpMethod::Delete, "/things", &[]),
            op("root", HttpMethod::Get, "/", &[]),
        ];
        let tree = PathTree::build(&ops);
        let things = tree.find(&["things"]).unwrap();
        assert_eq!(tree.node(things).operations, vec![0, 1]);
        assert_eq!(tree.node(PathTree::ROOT).operations, vec![2]);
    }

    #[test]
    fn test_walk_is_key_sorted() {
        let ops = vec![
            op("z", HttpMethod::Get, "/zeta/{id}", &[("id", TypeRef::String)]),
            op("a", HttpMethod::Get, "/alpha/beta", &[]),
            op("m", HttpMethod::Get, "/alpha/aardvark", &[]),
            op("p", HttpMethod::Get, "/zeta/list", &[]),
        ];
        let tree = PathTree::build(&ops);
        let labels: Vec<String> = tree
            .walk(PathTree::ROOT)
            .into_iter()
            .map(|id| match &tree.node(id).segment {
                Segment::Root => "/".to_string(),
                Segment::Literal(s) => s.clone(),
                Segment::Param { name, .. } => format!("{{{name}}}"),
            })
            .collect();
        assert_eq!(
            labels,
            vec!["/", "alpha", "aardvark", "beta", "zeta", "list", "{id}"]
        );
    }

    #[test]
    fn test_duplicate_param_names_get_separate_nodes() {
        let ops = vec![op(
            "getY",
            HttpMethod::Get,
            "/x/{id}/y/{id}",
            &[("id", TypeRef::String), ("id", TypeRef::Int32)],
        )];
        let tree = PathTree::build(&ops);
        let inner = tree.find(&["x", PARAM_KEY, "y", PARAM_KEY]).unwrap();
        assert_eq!(
            tree.node(inner).segment,
            Segment::Param {
                name: "id".into(),
                ty: TypeRef::Int32
            }
        );
        assert_eq!(tree.lineage(inner).len(), 4);
        assert_eq!(tree.node(inner).depth, 4);
    }

    #[test]
    fn test_partial_placeholder_segments_stay_literal() {
        let ops = vec![
            op("getFile", HttpMethod::Get, "/files/{name}.json", &[("name", TypeRef::String)]),
            op("getDir", HttpMethod::Get, "/files/{name}", &[("name", TypeRef::String)]),
            op(
                "getRev",
                HttpMethod::Get,
                "/files/{name}.json/{rev}",
                &[("name", TypeRef::String), ("rev", TypeRef::Int64)],
            ),
        ];
        let tree = PathTree::build(&ops);

        let file = tree.find(&["files", "{name}.json"]).unwrap();
        assert_eq!(tree.node(file).segment, Segment::Literal("{name}.json".into()));
        assert_eq!(tree.node(file).operations, vec![0]);

        let dir = tree.find(&["files", PARAM_KEY]).unwrap();
        assert_ne!(file, dir);
        assert_eq!(tree.node(dir).operations, vec![1]);

        let rev = tree.find(&["files", "{name}.json", PARAM_KEY]).unwrap();
        assert_eq!(
            tree.node(rev).segment,
            Segment::Param {
                name: "rev".into(),
                ty: TypeRef::Int64
            }
        );
    }

    #[test]
    fn test_whole_placeholder() {
        assert_eq!(whole_placeholder("{id}"), Some("id"));
        assert_eq!(whole_placeholder("{name}.json"), None);
        assert_eq!(whole_placeholder("v{major}"), None);
        assert_eq!(whole_placeholder("{a}{b}"), None);
        assert_eq!(whole_placeholder("{}"), Some(""));
        assert_eq!(whole_placeholder("files"), None);
    }

    #[test]
    fn test_empty_tree() {
        let tree = PathTree::build(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.walk(PathTree::ROOT), vec![PathTree::ROOT]);
    }
}
