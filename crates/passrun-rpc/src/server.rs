//! Stdio JSON-RPC server
//!
//! Reads one request per line and answers on stdout. Requests are handled
//! strictly one at a time, so a `Run` (decrypt, deliver, notify) finishes
//! before the next message is even read.

use passrun::{Action, MatchService, RunError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::protocol::{
    ActionsParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, MatchParams, MatchReply,
    RefreshReply, RunParams, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};

type RpcResult = Result<Value, JsonRpcError>;

/// Strip the launcher keyword from a raw query.
///
/// Returns the search term, or `None` when the query is not for us. The
/// keyword is matched case-insensitively and must stand alone or be followed
/// by whitespace: with keyword `pass`, "pass gh" searches "gh", "pass" lists
/// everything, "password" is not ours. An empty keyword accepts every query.
pub fn search_term<'a>(query: &'a str, keyword: &str) -> Option<&'a str> {
    let query = query.trim();
    if keyword.is_empty() {
        return Some(query);
    }

    let head = query.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }

    let rest = &query[keyword.len()..];
    if rest.is_empty() {
        Some("")
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Launcher-facing server owning one match service
pub struct RpcServer {
    service: MatchService,
    keyword: String,
}

impl RpcServer {
    pub fn new(service: MatchService) -> Self {
        let keyword = service.config().rpc.keyword.clone();
        Self { service, keyword }
    }

    pub fn service(&self) -> &MatchService {
        &self.service
    }

    /// Serve stdin/stdout until EOF
    pub async fn run(&self) -> anyhow::Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serve any line-oriented stream until EOF
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("Launcher disconnected");
                break;
            }

            let message = line.trim();
            if message.is_empty() {
                continue;
            }

            debug!("Received: {}", message);

            if let Some(resp) = self.handle_message(message).await {
                let resp_str = serde_json::to_string(&resp)?;
                debug!("Sending: {}", resp_str);
                writer.write_all(resp_str.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC message
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        let id = request.id.clone();
        let result = self.handle_request(&request.method, request.params).await;

        // No id means no response expected
        let id = match id {
            Some(id) => id,
            None => {
                if let Err(e) = result {
                    debug!("Notification {} failed: {}", request.method, e.message);
                }
                return None;
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(Some(id), value),
            Err(error) => JsonRpcResponse::error(Some(id), error),
        })
    }

    async fn handle_request(&self, method: &str, params: Option<Value>) -> RpcResult {
        match method {
            "Match" => self.handle_match(parse_params(params)?),
            "Actions" => self.handle_actions(parse_params(params)?),
            "Run" => self.handle_run(parse_params(params)?).await,
            "Refresh" => self.handle_refresh(),
            "ping" => Ok(json!({})),
            _ => {
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::new(
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                ))
            }
        }
    }

    fn handle_match(&self, params: MatchParams) -> RpcResult {
        let Some(term) = search_term(&params.query, &self.keyword) else {
            return to_value(Vec::<MatchReply>::new());
        };

        let replies: Vec<MatchReply> = self
            .service
            .match_query(term)
            .into_iter()
            .map(|item| MatchReply {
                match_id: item.match_id,
                text: item.text,
                subtext: item.subtext.to_string(),
                icon: item.icon.to_string(),
                relevance: item.relevance,
                category: item.category.to_string(),
            })
            .collect();

        debug!("Returning {} matches for '{}'", replies.len(), term);
        to_value(replies)
    }

    fn handle_actions(&self, params: ActionsParams) -> RpcResult {
        to_value(self.service.actions(&params.match_id))
    }

    async fn handle_run(&self, params: RunParams) -> RpcResult {
        let action = if params.action_id.is_empty() {
            Ok(Action::Copy)
        } else {
            params.action_id.parse::<Action>()
        };

        let outcome = match action {
            Ok(action) => self.service.run(&params.match_id, action).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => Ok(Value::Null),
            Err(e) => Err(run_error(&e)),
        }
    }

    fn handle_refresh(&self) -> RpcResult {
        match self.service.refresh() {
            Ok(entries) => to_value(RefreshReply { entries }),
            Err(e) => {
                warn!("Refresh failed: {}", e);
                to_value(RefreshReply { entries: 0 })
            }
        }
    }
}

fn run_error(err: &RunError) -> JsonRpcError {
    JsonRpcError::run_failed(err.kind(), err.to_string())
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    match params {
        Some(p) => serde_json::from_value(p)
            .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e))),
        None => Err(JsonRpcError::new(INVALID_PARAMS, "Missing params")),
    }
}

fn to_value<T: Serialize>(value: T) -> RpcResult {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, format!("Serialization error: {}", e)))
}
