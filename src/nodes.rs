//! Probe node directory: listing, filtering and lookup

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{CheckHostError, Result};
use crate::transport::Transport;

/// First codepoint of the regional-indicator block; 'A' maps here
const REGIONAL_INDICATOR_BASE: u32 = 0x1F1E6;

/// Location metadata reported for a probe node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLocation {
    /// Two-letter country code, uppercase
    pub country_code: String,
    pub country_name: String,
    /// Derived flag emoji; empty when the code is not two ASCII letters
    pub country_flag: String,
    pub city: Option<String>,
    pub asn: String,
}

/// One probe host operated by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Service-assigned host name, unique within a listing
    pub identifier: String,
    pub ip: String,
    pub location: NodeLocation,
}

/// Inclusion/exclusion rule applied when the node listing is refreshed
///
/// Terms are matched case-insensitively against a node's country code,
/// country name and identifier. With `except` set the complement is kept.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    terms: Vec<String>,
    except: bool,
}

impl NodeFilter {
    /// Keep every node
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(terms: I, except: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|term| term.into().to_lowercase())
                .collect(),
            except,
        }
    }

    /// Keep only nodes matching one of `terms`
    pub fn include<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(terms, false)
    }

    /// Keep only nodes matching none of `terms`
    pub fn exclude<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(terms, true)
    }

    /// Whether a node survives this filter
    pub fn keeps(&self, node: &Node) -> bool {
        // An empty term list matches everything, so `except` then drops all.
        let matched = self.terms.is_empty() || {
            let code = node.location.country_code.to_lowercase();
            let name = node.location.country_name.to_lowercase();
            let identifier = node.identifier.to_lowercase();
            self.terms
                .iter()
                .any(|term| *term == code || *term == name || *term == identifier)
        };

        (self.except && !matched) || (!self.except && matched)
    }
}

/// The filtered node listing, in service listing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeSet {
    nodes: Vec<Node>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl NodeSet {
    /// Look a node up by its service identifier
    pub fn get(&self, identifier: &str) -> Option<&Node> {
        self.index.get(identifier).map(|&at| &self.nodes[at])
    }

    /// Nodes in listing order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Node identifiers in listing order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.identifier.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert(&mut self, node: Node) {
        // Listings key nodes uniquely; a duplicate replaces the earlier entry.
        match self.index.get(&node.identifier) {
            Some(&at) => self.nodes[at] = node,
            None => {
                self.index.insert(node.identifier.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }
}

impl FromIterator<Node> for NodeSet {
    fn from_iter<I: IntoIterator<Item = Node>>(nodes: I) -> Self {
        let mut set = NodeSet::default();
        for node in nodes {
            set.insert(node);
        }
        set
    }
}

/// Regional-indicator flag emoji for a two-letter country code
///
/// Anything that is not exactly two ASCII letters renders as an empty string.
pub fn country_flag(code: &str) -> String {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return String::new();
    }

    code.chars()
        .filter_map(|c| {
            char::from_u32(REGIONAL_INDICATOR_BASE + (c.to_ascii_uppercase() as u32 - 'A' as u32))
        })
        .collect()
}

/// Decode one node-listing entry
///
/// Entries look like
/// `{"ip": "...", "asn": "AS906", "location": ["us", "USA", "Los Angeles"]}`.
/// Returns `None` when required fields are missing so a single bad entry
/// cannot poison a refresh.
fn parse_node(identifier: &str, info: &Value) -> Option<Node> {
    let ip = info.get("ip")?.as_str()?;
    let asn = info.get("asn")?.as_str()?;
    let location = info.get("location")?.as_array()?;
    let country_code = location.first()?.as_str()?;
    let country_name = location.get(1)?.as_str()?;
    let city = location.get(2).and_then(Value::as_str).map(str::to_owned);

    Some(Node {
        identifier: identifier.to_owned(),
        ip: ip.to_owned(),
        location: NodeLocation {
            country_code: country_code.to_uppercase(),
            country_name: country_name.to_owned(),
            country_flag: country_flag(country_code),
            city,
            asn: asn.to_owned(),
        },
    })
}

#[derive(Debug, Deserialize)]
struct NodeListing {
    #[serde(default)]
    nodes: Option<Map<String, Value>>,
}

/// Fetch the node listing and apply `filter`, producing a fresh set
///
/// Pure with respect to client state: the caller decides whether to adopt
/// the returned set, so a failed refresh never clobbers the previous one.
pub async fn fetch_nodes(
    transport: &dyn Transport,
    base_url: &Url,
    filter: &NodeFilter,
) -> Result<NodeSet> {
    let url = base_url.join("nodes/hosts")?;
    let body = transport.get(url).await?;
    let listing: NodeListing = serde_json::from_str(&body)?;

    let entries = match listing.nodes {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(CheckHostError::NoData),
    };
    if entries.contains_key("error") {
        return Err(CheckHostError::service(format!(
            "node listing error: {}",
            entries["error"]
        )));
    }

    let mut set = NodeSet::default();
    for (identifier, info) in &entries {
        let Some(node) = parse_node(identifier, info) else {
            warn!("skipping malformed node listing entry {}", identifier);
            continue;
        };
        if filter.keeps(&node) {
            set.insert(node);
        }
    }

    if set.is_empty() {
        return Err(CheckHostError::NoData);
    }
    Ok(set)
}

/// Fetch the raw node-to-IP listing from `/nodes/ips`
pub async fn fetch_node_ips(
    transport: &dyn Transport,
    base_url: &Url,
) -> Result<Map<String, Value>> {
    let url = base_url.join("nodes/ips")?;
    let body = transport.get(url).await?;
    let listing: NodeListing = serde_json::from_str(&body)?;
    listing.nodes.ok_or(CheckHostError::NoData)
}
