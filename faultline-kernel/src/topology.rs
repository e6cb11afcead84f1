/*!
 * TOPOLOGIE - Graphe en lecture seule des équipements réseau
 *
 * RÔLE : Dépendance feuille de tout le pipeline. Chargé une fois au démarrage,
 * partagé ensuite en lecture seule (Arc<Topology>) entre analyses concurrentes.
 *
 * FONCTIONNEMENT :
 * - Frontière de chargement unique : map `{id: record}` ou liste `[{id, ...}]`,
 *   JSON ou YAML, convertie en NetworkNode canonique
 * - Champs manquants/invalides => défauts (UNKNOWN, 999, {}), jamais fatal
 * - Parent inexistant toléré (dégradé en "pas de parent"), cycle rejeté
 * - Ordre d'itération = ordre du document (IndexMap), donc find_first déterministe
 */

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_LAYER: i64 = 999;

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("topology must be a map or a list of nodes, got {0}")]
    Shape(&'static str),
    #[error("duplicate node id: {0}")]
    DuplicateId(String),
    #[error("parent cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Router,
    Firewall,
    Switch,
    AccessPoint,
    Server,
    Unknown,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Router => "ROUTER",
            NodeType::Firewall => "FIREWALL",
            NodeType::Switch => "SWITCH",
            NodeType::AccessPoint => "ACCESS_POINT",
            NodeType::Server => "SERVER",
            NodeType::Unknown => "UNKNOWN",
            NodeType::Other(raw) => raw,
        }
    }
}

impl From<&str> for NodeType {
    fn from(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "ROUTER" => NodeType::Router,
            "FIREWALL" => NodeType::Firewall,
            "SWITCH" => NodeType::Switch,
            "ACCESS_POINT" | "AP" => NodeType::AccessPoint,
            "SERVER" => NodeType::Server,
            "" | "UNKNOWN" => NodeType::Unknown,
            _ => NodeType::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for NodeType {
    fn from(raw: String) -> Self {
        NodeType::from(raw.as_str())
    }
}

impl From<NodeType> for String {
    fn from(t: NodeType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Équipement canonique ; seule représentation consommée en interne
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub layer: i64,
    pub parent_id: Option<String>,
    pub redundancy_group: Option<String>,
    pub metadata: Map<String, Value>,
}

impl NetworkNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, layer: i64) -> Self {
        Self {
            id: id.into(),
            node_type,
            layer,
            parent_id: None,
            redundancy_group: None,
            metadata: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_redundancy_group(mut self, group: impl Into<String>) -> Self {
        self.redundancy_group = Some(group.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Nombre d'alimentations ; absent ou non entier => 1
    pub fn psu_count(&self) -> u64 {
        self.metadata
            .get("psu_count")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
            .unwrap_or(1)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Mot-clé présent dans l'id ou dans une valeur de métadonnée
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        if self.id.contains(keyword) {
            return true;
        }
        self.metadata.values().any(|v| match v {
            Value::String(s) => s.contains(keyword),
            other => other.to_string().contains(keyword),
        })
    }
}

/// Enregistrement brut : chaque champ est lu en Value pour tolérer les défauts
#[derive(Debug, Default, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "type")]
    node_type: Option<Value>,
    #[serde(default)]
    layer: Option<Value>,
    #[serde(default)]
    parent_id: Option<Value>,
    #[serde(default)]
    redundancy_group: Option<Value>,
    #[serde(default)]
    metadata: Option<Value>,
}

impl RawNode {
    fn from_value(value: Value) -> Self {
        if value.is_object() {
            serde_json::from_value(value).unwrap_or_default()
        } else {
            RawNode::default()
        }
    }

    fn into_node(self, id: String) -> NetworkNode {
        let node_type = match self.node_type {
            Some(Value::String(s)) => NodeType::from(s),
            _ => NodeType::Unknown,
        };
        let layer = match self.layer {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(DEFAULT_LAYER),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_LAYER),
            _ => DEFAULT_LAYER,
        };
        let metadata = match self.metadata {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        NetworkNode {
            id,
            node_type,
            layer,
            parent_id: non_empty_string(self.parent_id),
            redundancy_group: non_empty_string(self.redundancy_group),
            metadata,
        }
    }
}

fn non_empty_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

/// Critères de find_first ; chaque critère absent est ignoré
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub node_type: Option<NodeType>,
    pub layer: Option<i64>,
    pub keyword: Option<String>,
}

impl NodeQuery {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn on_layer(mut self, layer: i64) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn matches(&self, node: &NetworkNode) -> bool {
        if let Some(t) = &self.node_type {
            if &node.node_type != t {
                return false;
            }
        }
        if let Some(layer) = self.layer {
            if node.layer != layer {
                return false;
            }
        }
        match &self.keyword {
            Some(kw) => node.matches_keyword(kw),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopologySummary {
    pub total_nodes: usize,
    pub by_type: IndexMap<String, usize>,
    pub roots: Vec<String>,
    pub redundancy_groups: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: IndexMap<String, NetworkNode>,
    children: IndexMap<String, Vec<String>>,
}

impl Topology {
    /// Construit depuis des nœuds canoniques ; rejette doublons et cycles
    pub fn from_nodes<I>(nodes: I) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = NetworkNode>,
    {
        let mut map: IndexMap<String, NetworkNode> = IndexMap::new();
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(TopologyError::DuplicateId(node.id));
            }
            map.insert(node.id.clone(), node);
        }

        let mut children: IndexMap<String, Vec<String>> = IndexMap::new();
        for node in map.values() {
            match &node.parent_id {
                Some(pid) if map.contains_key(pid) => {
                    children.entry(pid.clone()).or_default().push(node.id.clone());
                }
                Some(pid) => {
                    warn!("[topology] {} references unknown parent {} (treated as root)", node.id, pid);
                }
                None => {}
            }
        }

        let topology = Self { nodes: map, children };
        topology.reject_cycles()?;
        debug!("[topology] loaded {} nodes", topology.nodes.len());
        Ok(topology)
    }

    /// Accepte `{id: record}` ou `[{"id": ..., ...}]`
    pub fn from_value(value: Value) -> Result<Self, TopologyError> {
        let mut nodes = Vec::new();
        match value {
            Value::Object(map) => {
                for (id, record) in map {
                    let raw = RawNode::from_value(record);
                    nodes.push(raw.into_node(id));
                }
            }
            Value::Array(items) => {
                for (pos, record) in items.into_iter().enumerate() {
                    let raw = RawNode::from_value(record);
                    let id = match &raw.id {
                        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
                        _ => {
                            warn!("[topology] record #{} has no id (skipped)", pos);
                            continue;
                        }
                    };
                    nodes.push(raw.into_node(id));
                }
            }
            Value::Null => return Ok(Self::default()),
            Value::Bool(_) => return Err(TopologyError::Shape("a boolean")),
            Value::Number(_) => return Err(TopologyError::Shape("a number")),
            Value::String(_) => return Err(TopologyError::Shape("a string")),
        }
        Self::from_nodes(nodes)
    }

    pub fn from_json_str(text: &str) -> Result<Self, TopologyError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, TopologyError> {
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_value(value)
    }

    /// Charge depuis un fichier ; `.yaml`/`.yml` => YAML, sinon JSON
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    fn reject_cycles(&self) -> Result<(), TopologyError> {
        // un seul parent par nœud : il suffit de remonter chaque chaîne
        let mut acyclic: IndexSet<&str> = IndexSet::new();
        for start in self.nodes.keys() {
            let mut path: IndexSet<&str> = IndexSet::new();
            let mut current = Some(start.as_str());
            while let Some(id) = current {
                if acyclic.contains(id) {
                    break;
                }
                if !path.insert(id) {
                    let from = path.get_index_of(id).unwrap_or(0);
                    let mut cycle: Vec<String> = path.iter().skip(from).map(|s| s.to_string()).collect();
                    cycle.push(id.to_string());
                    return Err(TopologyError::Cycle(cycle));
                }
                current = self.parent_of(id).map(|p| p.id.as_str());
            }
            acyclic.extend(path);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkNode> {
        self.nodes.values()
    }

    /// Parent existant ; parent_id inconnu => None
    pub fn parent_of(&self, id: &str) -> Option<&NetworkNode> {
        let pid = self.nodes.get(id)?.parent_id.as_deref()?;
        self.nodes.get(pid)
    }

    pub fn children_of(&self, id: &str) -> Vec<&NetworkNode> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    /// Du parent direct jusqu'à la racine
    pub fn ancestors_of(&self, id: &str) -> Vec<&NetworkNode> {
        let mut out = Vec::new();
        let mut seen: IndexSet<&str> = IndexSet::new();
        seen.insert(id);
        let mut current = self.parent_of(id);
        while let Some(node) = current {
            if !seen.insert(node.id.as_str()) {
                break;
            }
            out.push(node);
            current = self.parent_of(&node.id);
        }
        out
    }

    pub fn redundancy_group_members(&self, group: &str) -> Vec<&NetworkNode> {
        self.nodes
            .values()
            .filter(|n| n.redundancy_group.as_deref() == Some(group))
            .collect()
    }

    /// Même redundancy_group, soi-même exclu
    pub fn redundancy_peers_of(&self, id: &str) -> Vec<&NetworkNode> {
        let Some(group) = self.nodes.get(id).and_then(|n| n.redundancy_group.as_deref()) else {
            return Vec::new();
        };
        self.redundancy_group_members(group)
            .into_iter()
            .filter(|n| n.id != id)
            .collect()
    }

    /// Premier nœud trouvé dans l'ordre d'itération, pas le "meilleur"
    pub fn find_first(&self, query: &NodeQuery) -> Option<&str> {
        self.nodes
            .values()
            .find(|n| query.matches(n))
            .map(|n| n.id.as_str())
    }

    pub fn summary(&self) -> TopologySummary {
        let mut by_type: IndexMap<String, usize> = IndexMap::new();
        let mut redundancy_groups: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut roots = Vec::new();
        for node in self.nodes.values() {
            *by_type.entry(node.node_type.to_string()).or_insert(0) += 1;
            if let Some(group) = &node.redundancy_group {
                redundancy_groups.entry(group.clone()).or_default().push(node.id.clone());
            }
            if self.parent_of(&node.id).is_none() {
                roots.push(node.id.clone());
            }
        }
        TopologySummary {
            total_nodes: self.nodes.len(),
            by_type,
            roots,
            redundancy_groups,
        }
    }
}
