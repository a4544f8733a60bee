use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::model::{CallToolRequestParams, PaginatedRequestParams};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::config::McpServerConfig;
use crate::error::{DefierError, Result};
use crate::interfaces::tools::{ToolCatalog, ToolDescriptor, ToolProvider};

/// Upper bound on `tools/list` pages per server.
const MAX_LIST_PAGES: usize = 20;

#[derive(Clone, Debug)]
struct McpServer {
    provider: ToolProvider,
    url: String,
    headers: HashMap<String, String>,
}

type Session = RunningService<RoleClient, ()>;

/// Tool catalog backed by streamable-HTTP MCP servers, one session per
/// provider. Sessions and descriptors are collected once and dropped again
/// on `shutdown`.
pub struct McpToolCatalog {
    servers: Vec<McpServer>,
    timeout: Duration,
    init: RwLock<Arc<OnceCell<()>>>,
    sessions: Mutex<HashMap<ToolProvider, Session>>,
    descriptors: RwLock<Vec<ToolDescriptor>>,
    /// Completed `connect_all` runs; one per initialize/shutdown cycle.
    loads: AtomicUsize,
}

impl McpToolCatalog {
    pub fn new(servers: &[McpServerConfig], timeout: Duration) -> Result<Self> {
        let mut parsed = Vec::new();
        for server in servers {
            let url = server.url.trim().to_string();
            let provider = ToolProvider::parse(&server.provider).ok_or_else(|| {
                DefierError::Config(format!(
                    "Unknown MCP provider '{}' (expected coingecko or blockscout)",
                    server.provider
                ))
            })?;
            if url.is_empty() {
                return Err(DefierError::Config(format!(
                    "MCP server '{provider}' requires a url"
                )));
            }
            parsed.push(McpServer {
                provider,
                url,
                headers: server.headers.clone().unwrap_or_default(),
            });
        }
        Ok(Self {
            servers: parsed,
            timeout,
            init: RwLock::new(Arc::new(OnceCell::new())),
            sessions: Mutex::new(HashMap::new()),
            descriptors: RwLock::new(Vec::new()),
            loads: AtomicUsize::new(0),
        })
    }

    fn build_http_client(&self, server: &McpServer) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        for (key, value) in &server.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
                DefierError::Config(format!("Invalid MCP header name '{}': {err}", key))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                DefierError::Config(format!("Invalid MCP header value for '{}': {err}", key))
            })?;
            headers.insert(name, value);
        }

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|err| DefierError::Http(err.to_string()))
    }

    async fn connect(&self, server: &McpServer) -> Result<Session> {
        let client = self.build_http_client(server)?;
        let mut transport_config = StreamableHttpClientTransportConfig::with_uri(server.url.clone());
        transport_config.allow_stateless = true;
        let transport = StreamableHttpClientTransport::with_client(client, transport_config);
        ().serve(transport)
            .await
            .map_err(|err| DefierError::Provider(format!("MCP connect to {}: {err}", server.url)))
    }

    async fn list_all_tools(
        peer: &Peer<RoleClient>,
        provider: ToolProvider,
    ) -> Result<Vec<ToolDescriptor>> {
        let mut descriptors = Vec::new();
        let mut cursor = None;
        for _ in 0..MAX_LIST_PAGES {
            let page = peer
                .list_tools(Some(PaginatedRequestParams { meta: None, cursor }))
                .await
                .map_err(|err| DefierError::Provider(err.to_string()))?;
            let page = serde_json::to_value(&page)
                .map_err(|e| DefierError::Serialization(e.to_string()))?;
            descriptors.extend(descriptors_from_page(&page, provider));
            cursor = page
                .get("nextCursor")
                .and_then(|c| c.as_str())
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(descriptors)
    }

    async fn connect_all(&self) -> Result<()> {
        let mut sessions = HashMap::new();
        let mut descriptors = Vec::new();
        for server in &self.servers {
            let session = match self.connect(server).await {
                Ok(session) => session,
                Err(err) => {
                    warn!(provider = %server.provider, error = %err, "Skipping MCP server");
                    continue;
                }
            };
            match Self::list_all_tools(session.peer(), server.provider).await {
                Ok(tools) => {
                    info!(provider = %server.provider, tools = tools.len(), "MCP tools loaded");
                    descriptors.extend(tools);
                    sessions.insert(server.provider, session);
                }
                Err(err) => {
                    warn!(provider = %server.provider, error = %err, "MCP tool listing failed");
                    if let Err(err) = session.cancel().await {
                        debug!(error = %err, "MCP session cancel failed");
                    }
                }
            }
        }
        let load = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        info!(load, tools = descriptors.len(), sessions = sessions.len(), "MCP catalog ready");
        *self.descriptors.write().await = descriptors;
        *self.sessions.lock().await = sessions;
        Ok(())
    }

    async fn peer_for(&self, provider: ToolProvider) -> Result<Peer<RoleClient>> {
        self.sessions
            .lock()
            .await
            .get(&provider)
            .map(|session| session.peer().clone())
            .ok_or_else(|| DefierError::Runtime(format!("No MCP session for {provider}")))
    }
}

fn descriptors_from_page(page: &Value, provider: ToolProvider) -> Vec<ToolDescriptor> {
    page.get("tools")
        .and_then(|tools| tools.as_array())
        .map(|tools| {
            tools
                .iter()
                .filter_map(|tool| {
                    let name = tool.get("name")?.as_str()?.to_string();
                    Some(ToolDescriptor {
                        name,
                        description: tool
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        input_schema: tool.get("inputSchema").cloned().unwrap_or(Value::Null),
                        provider,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ToolCatalog for McpToolCatalog {
    async fn initialize(&self) -> Result<()> {
        let cell = self.init.read().await.clone();
        cell.get_or_try_init(|| self.connect_all()).await?;
        Ok(())
    }

    async fn tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.initialize().await?;
        Ok(self.descriptors.read().await.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.initialize().await?;
        let provider = self
            .descriptors
            .read()
            .await
            .iter()
            .find(|tool| tool.name == name)
            .map(|tool| tool.provider)
            .ok_or_else(|| DefierError::Runtime(format!("Unknown tool '{name}'")))?;
        let peer = self.peer_for(provider).await?;
        debug!(tool = %name, provider = %provider, "Calling MCP tool");
        let result = peer
            .call_tool(CallToolRequestParams {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
                meta: None,
                task: None,
            })
            .await
            .map_err(|err| DefierError::Provider(format!("MCP tool {name}: {err}")))?;
        serde_json::to_value(&result).map_err(|e| DefierError::Serialization(e.to_string()))
    }

    async fn shutdown(&self) -> Result<()> {
        *self.init.write().await = Arc::new(OnceCell::new());
        self.descriptors.write().await.clear();
        let sessions: Vec<_> = self.sessions.lock().await.drain().collect();
        for (provider, session) in sessions {
            if let Err(err) = session.cancel().await {
                warn!(provider = %provider, error = %err, "MCP session cancel failed");
            }
        }
        Ok(())
    }
}
