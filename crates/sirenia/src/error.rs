#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graph contains an edge with a missing endpoint: {edge_id}")]
    MissingEndpoint { edge_id: String },

    #[error("node {node_id} references an unknown parent: {parent_id}")]
    MissingParent { node_id: String, parent_id: String },

    #[error("duplicate node id: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("graph must have exactly one root node, found {roots}")]
    InvalidGraphShape { roots: usize },

    #[error("{unreachable} node(s) are not reachable from the root (parent cycle?)")]
    DetachedNodes { unreachable: usize },

    #[error("compound node #{node} has no child graph")]
    MissingChildGraph { node: usize },

    #[error("edge #{edge} is not incident to node #{node}")]
    IncidentMismatch { edge: usize, node: usize },

    #[error("invalid sublayout rooted at {root_id}: {reason}")]
    InvalidSublayout { root_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
