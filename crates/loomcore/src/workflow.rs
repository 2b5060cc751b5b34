use crate::WorkflowError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type WorkflowId = String;
pub type NodeId = String;

/// The closed set of node kinds the engine can execute.
///
/// Adding a variant here is deliberately a compile error everywhere the
/// engine matches on node kind (executor registry, status channels) until
/// the new kind is wired through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeKind {
    Initial,
    ManualTrigger,
    GoogleFormTrigger,
    HttpRequest,
    Gemini,
    OpenAi,
    Anthropic,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Initial,
        NodeKind::ManualTrigger,
        NodeKind::GoogleFormTrigger,
        NodeKind::HttpRequest,
        NodeKind::Gemini,
        NodeKind::OpenAi,
        NodeKind::Anthropic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Initial => "INITIAL",
            NodeKind::ManualTrigger => "MANUAL_TRIGGER",
            NodeKind::GoogleFormTrigger => "GOOGLE_FORM_TRIGGER",
            NodeKind::HttpRequest => "HTTP_REQUEST",
            NodeKind::Gemini => "GEMINI",
            NodeKind::OpenAi => "OPENAI",
            NodeKind::Anthropic => "ANTHROPIC",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownNodeType(s.to_string()))
    }
}

impl TryFrom<String> for NodeKind {
    type Error = WorkflowError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Complete workflow definition: the node set and the directed
/// connections used for dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub connections: Vec<Connection>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect two nodes on their default "main" ports.
    pub fn connect(
        &mut self,
        from_node: impl Into<NodeId>,
        to_node: impl Into<NodeId>,
    ) -> Result<(), WorkflowError> {
        self.connect_ports(from_node, "main", to_node, "main")
    }

    /// Connect two nodes on named ports.
    ///
    /// Rejects connections that reference unknown nodes, and duplicate
    /// edges on the same (from, to, from_output, to_input) tuple. Cycle
    /// detection is deferred to the sorter at run start.
    pub fn connect_ports(
        &mut self,
        from_node: impl Into<NodeId>,
        from_output: impl Into<String>,
        to_node: impl Into<NodeId>,
        to_input: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let from_node = from_node.into();
        let from_output = from_output.into();
        let to_node = to_node.into();
        let to_input = to_input.into();

        if self.find_node(&from_node).is_none() {
            return Err(WorkflowError::NodeNotFound(from_node));
        }
        if self.find_node(&to_node).is_none() {
            return Err(WorkflowError::NodeNotFound(to_node));
        }
        if self.connections.iter().any(|c| {
            c.from_node == from_node
                && c.to_node == to_node
                && c.from_output == from_output
                && c.to_input == to_input
        }) {
            return Err(WorkflowError::DuplicateConnection {
                from_node,
                from_output,
                to_node,
                to_input,
            });
        }

        self.connections.push(Connection {
            id: Uuid::new_v4().to_string(),
            from_node,
            from_output,
            to_node,
            to_input,
        });
        Ok(())
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check structural invariants on a workflow that was deserialized
    /// rather than built through `connect_ports`.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        for (index, node) in self.nodes.iter().enumerate() {
            if self.nodes[..index].iter().any(|n| n.id == node.id) {
                return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
            }
        }
        for (index, conn) in self.connections.iter().enumerate() {
            if self.find_node(&conn.from_node).is_none() {
                return Err(WorkflowError::NodeNotFound(conn.from_node.clone()));
            }
            if self.find_node(&conn.to_node).is_none() {
                return Err(WorkflowError::NodeNotFound(conn.to_node.clone()));
            }
            let duplicate = self.connections[..index].iter().any(|c| {
                c.from_node == conn.from_node
                    && c.to_node == conn.to_node
                    && c.from_output == conn.from_output
                    && c.to_input == conn.to_input
            });
            if duplicate {
                return Err(WorkflowError::DuplicateConnection {
                    from_node: conn.from_node.clone(),
                    from_output: conn.from_output.clone(),
                    to_node: conn.to_node.clone(),
                    to_input: conn.to_input.clone(),
                });
            }
        }
        Ok(())
    }
}

/// One configured node in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: Option<String>,
    /// Keyed configuration, opaque to the engine; each executor reads
    /// the fields it needs (camelCase keys, e.g. "variableName").
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Reference into the external credential store.
    #[serde(default, rename = "credentialId")]
    pub credential_id: Option<String>,
    pub position: Option<Position>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            data: Map::new(),
            credential_id: None,
            position: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_credential(mut self, credential_id: impl Into<String>) -> Self {
        self.credential_id = Some(credential_id.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

/// Directed edge between two nodes' named ports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    #[serde(rename = "fromNodeId")]
    pub from_node: NodeId,
    #[serde(rename = "toNodeId")]
    pub to_node: NodeId,
    #[serde(default = "main_port", rename = "fromOutput")]
    pub from_output: String,
    #[serde(default = "main_port", rename = "toInput")]
    pub to_input: String,
}

fn main_port() -> String {
    "main".to_string()
}

/// Node position in the visual editor; opaque to the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_workflow() -> Workflow {
        let mut workflow = Workflow::new("test");
        workflow.add_node(NodeSpec::new("a", NodeKind::Initial));
        workflow.add_node(NodeSpec::new("b", NodeKind::HttpRequest));
        workflow
    }

    #[test]
    fn connect_links_default_ports() {
        let mut workflow = two_node_workflow();
        workflow.connect("a", "b").unwrap();

        assert_eq!(workflow.connections.len(), 1);
        assert_eq!(workflow.connections[0].from_output, "main");
        assert_eq!(workflow.connections[0].to_input, "main");
    }

    #[test]
    fn duplicate_connection_is_rejected() {
        let mut workflow = two_node_workflow();
        workflow.connect("a", "b").unwrap();

        let err = workflow.connect("a", "b").unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateConnection { .. }));
    }

    #[test]
    fn parallel_edges_on_distinct_ports_are_allowed() {
        let mut workflow = two_node_workflow();
        workflow.connect_ports("a", "main", "b", "main").unwrap();
        workflow.connect_ports("a", "secondary", "b", "main").unwrap();

        assert_eq!(workflow.connections.len(), 2);
    }

    #[test]
    fn connect_rejects_unknown_nodes() {
        let mut workflow = two_node_workflow();
        let err = workflow.connect("a", "missing").unwrap_err();
        assert_eq!(err, WorkflowError::NodeNotFound("missing".to_string()));
    }

    #[test]
    fn validate_catches_duplicates_in_deserialized_workflows() {
        let mut workflow = two_node_workflow();
        workflow.connect("a", "b").unwrap();
        let mut copy = workflow.connections[0].clone();
        copy.id = "other".to_string();
        workflow.connections.push(copy);

        assert!(matches!(
            workflow.validate(),
            Err(WorkflowError::DuplicateConnection { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_node_ids() {
        let mut workflow = two_node_workflow();
        workflow.add_node(NodeSpec::new("a", NodeKind::Gemini));

        assert_eq!(
            workflow.validate().unwrap_err(),
            WorkflowError::DuplicateNodeId("a".to_string())
        );
    }

    #[test]
    fn node_kind_round_trips_through_strings() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        assert!(matches!(
            "TELEGRAM".parse::<NodeKind>(),
            Err(WorkflowError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn node_kind_serializes_to_original_tags() {
        let json = serde_json::to_string(&NodeKind::OpenAi).unwrap();
        assert_eq!(json, "\"OPENAI\"");
        let json = serde_json::to_string(&NodeKind::HttpRequest).unwrap();
        assert_eq!(json, "\"HTTP_REQUEST\"");
    }

    #[test]
    fn node_kind_round_trips_through_serde() {
        for kind in NodeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(serde_json::from_str::<NodeKind>(&json).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_type_tags_fail_deserialization_by_name() {
        let err = serde_json::from_str::<NodeSpec>(r#"{"id": "n1", "type": "TELEGRAM"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Unknown node type: TELEGRAM"));
    }
}
