// ABOUTME: Defines AgentDef and AgentGraph, the declarative shape of a multi-agent application.
// ABOUTME: Validation resolves tool and agent references and rejects cycles before anything runs.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Builtin tool names an agent definition may reference.
/// `google_search` is special: it enables the provider's native grounding
/// tool instead of registering a function declaration.
pub const BUILTIN_TOOLS: &[&str] = &["get_financial_data", "google_search"];

/// Name of the implicit function agents with sub-agents can call to hand
/// the conversation to one of them.
pub const TRANSFER_TOOL: &str = "transfer_to_agent";

/// Errors produced while parsing or validating an agent graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("agent graph has no agents")]
    Empty,

    #[error("duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("root_agent '{0}' is not defined")]
    UnknownRoot(String),

    #[error("agent '{agent}' references unknown agent '{target}'")]
    UnknownReference { agent: String, target: String },

    #[error("agent '{agent}' references unknown tool '{tool}'")]
    UnknownTool { agent: String, tool: String },

    #[error("agent '{0}' references itself")]
    SelfReference(String),

    #[error("agent reference cycle involving '{0}'")]
    Cycle(String),
}

/// A single agent definition: which model it runs on, how it is instructed,
/// and which tools and peer agents it can reach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub name: String,
    /// Model identifier. When absent the app manifest's default model is used.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub description: String,
    pub instruction: String,
    /// Builtin tool names available to this agent.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Peer agents this agent can invoke as tools, receiving their final
    /// reply as the tool result.
    #[serde(default)]
    pub agent_tools: Vec<String>,
    /// Peer agents this agent can transfer the conversation to.
    #[serde(default)]
    pub sub_agents: Vec<String>,
}

impl AgentDef {
    /// True if this agent's tool list enables the provider-native search tool.
    pub fn uses_native_search(&self) -> bool {
        self.tools.iter().any(|t| t == "google_search")
    }

    /// Builtin function tools, excluding provider-native entries.
    pub fn function_tools(&self) -> impl Iterator<Item = &str> {
        self.tools
            .iter()
            .filter(|t| t.as_str() != "google_search")
            .map(String::as_str)
    }
}

/// A validated set of agent definitions with a designated root agent.
/// Parsed from an app's `agents.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentGraph {
    pub agents: Vec<AgentDef>,
    pub root_agent: String,
}

impl AgentGraph {
    /// Parse an agent graph from YAML and validate it.
    pub fn parse_yaml(yaml: &str) -> Result<Self, GraphError> {
        let graph: AgentGraph = serde_yaml::from_str(yaml)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Look up an agent definition by name.
    pub fn resolve(&self, name: &str) -> Option<&AgentDef> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// The root agent definition. Valid graphs always have one.
    pub fn root(&self) -> Option<&AgentDef> {
        self.resolve(&self.root_agent)
    }

    /// Check structural validity: the root exists, every agent_tools and
    /// sub_agents entry resolves, tool names are known builtins, names are
    /// unique, and the reference graph is acyclic.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.agents.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut names = HashSet::new();
        for agent in &self.agents {
            if !names.insert(agent.name.as_str()) {
                return Err(GraphError::DuplicateAgent(agent.name.clone()));
            }
        }

        if !names.contains(self.root_agent.as_str()) {
            return Err(GraphError::UnknownRoot(self.root_agent.clone()));
        }

        for agent in &self.agents {
            for tool in &agent.tools {
                if !BUILTIN_TOOLS.contains(&tool.as_str()) {
                    return Err(GraphError::UnknownTool {
                        agent: agent.name.clone(),
                        tool: tool.clone(),
                    });
                }
            }
            for target in agent.agent_tools.iter().chain(agent.sub_agents.iter()) {
                if target == &agent.name {
                    return Err(GraphError::SelfReference(agent.name.clone()));
                }
                if !names.contains(target.as_str()) {
                    return Err(GraphError::UnknownReference {
                        agent: agent.name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        self.check_cycles()?;
        Ok(())
    }

    /// Depth-first cycle detection over the combined agent_tools + sub_agents
    /// edge set. Grey nodes are on the current path; hitting one is a cycle.
    fn check_cycles(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        let index: HashMap<&str, &AgentDef> =
            self.agents.iter().map(|a| (a.name.as_str(), a)).collect();
        let mut marks: HashMap<&str, Mark> =
            self.agents.iter().map(|a| (a.name.as_str(), Mark::White)).collect();

        fn visit<'a>(
            name: &'a str,
            index: &HashMap<&'a str, &'a AgentDef>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), GraphError> {
            match marks.get(name).copied() {
                Some(Mark::Black) => return Ok(()),
                Some(Mark::Grey) => return Err(GraphError::Cycle(name.to_string())),
                _ => {}
            }
            marks.insert(name, Mark::Grey);
            if let Some(def) = index.get(name) {
                for target in def.agent_tools.iter().chain(def.sub_agents.iter()) {
                    visit(target.as_str(), index, marks)?;
                }
            }
            marks.insert(name, Mark::Black);
            Ok(())
        }

        for agent in &self.agents {
            visit(agent.name.as_str(), &index, &mut marks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> AgentDef {
        AgentDef {
            name: name.to_string(),
            model: None,
            description: String::new(),
            instruction: format!("You are {}.", name),
            tools: Vec::new(),
            agent_tools: Vec::new(),
            sub_agents: Vec::new(),
        }
    }

    #[test]
    fn parse_yaml_minimal_graph() {
        let yaml = r#"
root_agent: helper
agents:
  - name: helper
    instruction: "You help."
"#;
        let graph = AgentGraph::parse_yaml(yaml).unwrap();
        assert_eq!(graph.agents.len(), 1);
        assert_eq!(graph.root().unwrap().name, "helper");
        assert!(graph.agents[0].model.is_none());
        assert!(graph.agents[0].tools.is_empty());
    }

    #[test]
    fn parse_yaml_coordinator_with_sub_agents() {
        let yaml = r#"
root_agent: coordinator
agents:
  - name: coordinator
    model: gemini-2.5-flash
    description: "Routes requests."
    instruction: "Route the request."
    sub_agents: [terraform, kubectl]
  - name: terraform
    model: gemini-2.5-pro
    instruction: "Generate HCL."
  - name: kubectl
    model: gemini-2.5-pro
    instruction: "Generate YAML."
"#;
        let graph = AgentGraph::parse_yaml(yaml).unwrap();
        let root = graph.root().unwrap();
        assert_eq!(root.sub_agents, vec!["terraform", "kubectl"]);
        assert_eq!(graph.resolve("kubectl").unwrap().model.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn validate_rejects_unknown_root() {
        let graph = AgentGraph {
            agents: vec![agent("a")],
            root_agent: "missing".to_string(),
        };
        let err = graph.validate().unwrap_err();
        assert!(matches!(err, GraphError::UnknownRoot(ref r) if r == "missing"));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let graph = AgentGraph {
            agents: vec![agent("a"), agent("a")],
            root_agent: "a".to_string(),
        };
        assert!(matches!(
            graph.validate().unwrap_err(),
            GraphError::DuplicateAgent(_)
        ));
    }

    #[test]
    fn validate_rejects_dangling_agent_tool() {
        let mut root = agent("root");
        root.agent_tools.push("ghost".to_string());
        let graph = AgentGraph {
            agents: vec![root],
            root_agent: "root".to_string(),
        };
        let err = graph.validate().unwrap_err();
        match err {
            GraphError::UnknownReference { agent, target } => {
                assert_eq!(agent, "root");
                assert_eq!(target, "ghost");
            }
            other => panic!("expected UnknownReference, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_unknown_tool_name() {
        let mut root = agent("root");
        root.tools.push("summon_demons".to_string());
        let graph = AgentGraph {
            agents: vec![root],
            root_agent: "root".to_string(),
        };
        assert!(matches!(
            graph.validate().unwrap_err(),
            GraphError::UnknownTool { .. }
        ));
    }

    #[test]
    fn validate_rejects_self_reference() {
        let mut root = agent("root");
        root.sub_agents.push("root".to_string());
        let graph = AgentGraph {
            agents: vec![root],
            root_agent: "root".to_string(),
        };
        assert!(matches!(
            graph.validate().unwrap_err(),
            GraphError::SelfReference(_)
        ));
    }

    #[test]
    fn validate_rejects_cycle() {
        let mut a = agent("a");
        a.agent_tools.push("b".to_string());
        let mut b = agent("b");
        b.sub_agents.push("a".to_string());
        let graph = AgentGraph {
            agents: vec![a, b],
            root_agent: "a".to_string(),
        };
        assert!(matches!(graph.validate().unwrap_err(), GraphError::Cycle(_)));
    }

    #[test]
    fn validate_accepts_diamond_without_cycle() {
        // a -> b, a -> c, b -> d, c -> d: a DAG, not a cycle.
        let mut a = agent("a");
        a.agent_tools.extend(["b".to_string(), "c".to_string()]);
        let mut b = agent("b");
        b.agent_tools.push("d".to_string());
        let mut c = agent("c");
        c.agent_tools.push("d".to_string());
        let graph = AgentGraph {
            agents: vec![a, b, c, agent("d")],
            root_agent: "a".to_string(),
        };
        graph.validate().unwrap();
    }

    #[test]
    fn validate_rejects_empty_graph() {
        let graph = AgentGraph {
            agents: Vec::new(),
            root_agent: "root".to_string(),
        };
        assert!(matches!(graph.validate().unwrap_err(), GraphError::Empty));
    }

    #[test]
    fn native_search_detection() {
        let mut a = agent("searcher");
        a.tools = vec!["google_search".to_string()];
        assert!(a.uses_native_search());
        assert_eq!(a.function_tools().count(), 0);

        let mut b = agent("quant");
        b.tools = vec!["get_financial_data".to_string()];
        assert!(!b.uses_native_search());
        assert_eq!(b.function_tools().collect::<Vec<_>>(), vec!["get_financial_data"]);
    }

    #[test]
    fn graph_serde_round_trip() {
        let yaml = r#"
root_agent: cio
agents:
  - name: analyst
    model: gemini-2.5-flash
    instruction: "Analyze."
    tools: [get_financial_data]
  - name: cio
    model: gemini-2.5-pro
    instruction: "Coordinate."
    agent_tools: [analyst]
"#;
        let graph = AgentGraph::parse_yaml(yaml).unwrap();
        let json = serde_json::to_string(&graph).unwrap();
        let back: AgentGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root_agent, "cio");
        assert_eq!(back.agents.len(), 2);
    }
}
