//! Query server
//!
//! Routes JSON-RPC requests to the search engine. The engine is built before
//! the server starts and is only read from here.

use super::protocol::*;
use super::transport::LineTransport;
use crate::output::SearchResponse;
use flagsearch_core::{SearchEngine, SearchMethod};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

const SERVER_NAME: &str = "flagsearch";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON-RPC front end for a built engine
pub struct RpcServer {
    engine: Arc<SearchEngine>,
}

impl RpcServer {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }

    /// Serve stdin/stdout until EOF
    pub async fn run_stdio(&self) -> std::io::Result<()> {
        self.run(LineTransport::stdio()).await
    }

    /// Run the request loop until the reader reaches EOF
    pub async fn run<R, W>(&self, mut transport: LineTransport<R, W>) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("Query server ready");

        while let Some(line) = transport.read_line().await? {
            if let Some(response) = self.handle_line(&line) {
                transport.write_response(&response).await?;
            }
        }

        tracing::info!("Client disconnected");
        Ok(())
    }

    /// Decode and answer one line; notifications get no response
    pub fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match decode_request(line) {
            Ok(request) if request.is_notification() => {
                tracing::debug!("Ignoring notification: {}", request.method);
                None
            }
            Ok(request) => Some(self.handle_request(request)),
            Err(error) => {
                tracing::warn!("Rejected request: {}", error.message);
                Some(JsonRpcResponse::error(None, error))
            }
        }
    }

    /// Handle a JSON-RPC request
    pub fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("Handling request: {}", request.method);

        let result = match request.method.as_str() {
            "search" => self.handle_search(request.params),
            "territories" => self.handle_territories(),
            "models" => self.handle_models(),
            "ping" => Ok(serde_json::json!({
                "name": SERVER_NAME,
                "version": SERVER_VERSION,
            })),
            other => Err(JsonRpcError::method_not_found(other)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        }
    }

    fn handle_search(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: SearchParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
            })?;

        let method = match params.method.as_deref() {
            Some(name) => name.parse::<SearchMethod>()?,
            None => SearchMethod::default(),
        };

        let results = self.engine.search(&params.territory, method)?;
        let response = SearchResponse {
            territory: &params.territory,
            method,
            k: self.engine.k(),
            results: &results,
        };
        serde_json::to_value(&response).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_territories(&self) -> Result<Value, JsonRpcError> {
        serde_json::to_value(self.engine.territories())
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_models(&self) -> Result<Value, JsonRpcError> {
        serde_json::to_value(self.engine.models())
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagsearch_core::{EngineConfig, FeatureSet, FeatureStore, Identity};

    fn server() -> RpcServer {
        let columns = vec!["F_000000".into(), "F_000001".into(), "F_000002".into()];
        let rows = vec![
            (Identity::new("fr.jpg", "France"), vec![1.0, 0.0, 0.0]),
            (Identity::new("de.jpg", "Germany"), vec![0.0, 1.0, 0.0]),
            (Identity::new("be.jpg", "Belgium"), vec![0.9, 0.1, 0.0]),
        ];
        let set = FeatureSet::from_rows("VGG16", columns, rows).unwrap();
        let store = FeatureStore::from_sets([set]).unwrap();
        let engine = SearchEngine::from_store(store, &EngineConfig::default().with_k(2)).unwrap();
        RpcServer::new(Arc::new(engine))
    }

    fn call(server: &RpcServer, line: &str) -> Value {
        let response = server.handle_line(line).expect("response");
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_search_defaults_to_cosine() {
        let response = call(
            &server(),
            r#"{"jsonrpc":"2.0","id":1,"method":"search","params":{"territory":"France"}}"#,
        );
        assert_eq!(response["id"], 1);
        let result = &response["result"];
        assert_eq!(result["method"], "cosine");
        assert_eq!(result["k"], 2);
        let hits = result["results"]["VGG16"].as_array().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["territory_name"], "France");
        assert_eq!(hits[1]["territory_name"], "Belgium");
    }

    #[test]
    fn test_search_knn() {
        let response = call(
            &server(),
            r#"{"jsonrpc":"2.0","id":2,"method":"search","params":{"territory":"Germany","method":"knn"}}"#,
        );
        assert_eq!(response["result"]["results"]["VGG16"][0]["filename"], "de.jpg");
    }

    #[test]
    fn test_search_invalid_method() {
        let response = call(
            &server(),
            r#"{"jsonrpc":"2.0","id":3,"method":"search","params":{"territory":"France","method":"euclidean"}}"#,
        );
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["data"]["kind"], "invalid_method");
    }

    #[test]
    fn test_search_unknown_territory() {
        let response = call(
            &server(),
            r#"{"jsonrpc":"2.0","id":4,"method":"search","params":{"territory":"Atlantis"}}"#,
        );
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["data"]["kind"], "unknown_territory");
        assert!(response.get("result").is_none());
    }

    #[test]
    fn test_search_missing_params() {
        let response = call(&server(), r#"{"jsonrpc":"2.0","id":5,"method":"search"}"#);
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[test]
    fn test_territories_sorted() {
        let response = call(&server(), r#"{"jsonrpc":"2.0","id":6,"method":"territories"}"#);
        let names: Vec<_> = response["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["territory_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Belgium", "France", "Germany"]);
    }

    #[test]
    fn test_models() {
        let response = call(&server(), r#"{"jsonrpc":"2.0","id":7,"method":"models"}"#);
        assert_eq!(response["result"][0]["name"], "VGG16");
        assert_eq!(response["result"][0]["dimension"], 3);
    }

    #[test]
    fn test_unknown_method_and_parse_error() {
        let server = server();
        let response = call(&server, r#"{"jsonrpc":"2.0","id":8,"method":"render"}"#);
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);

        let response = call(&server, "{oops");
        assert_eq!(response["error"]["code"], PARSE_ERROR);
        assert!(response["id"].is_null());
    }

    #[test]
    fn test_notification_has_no_response() {
        assert!(server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"ping"}"#)
            .is_none());
    }

    #[test]
    fn test_null_id_gets_response() {
        let response = call(&server(), r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#);
        assert!(response["id"].is_null());
        assert_eq!(response["result"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn test_run_until_eof() {
        let input: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n{bad\n";
        let server = server();
        let mut output = Vec::new();
        server
            .run(LineTransport::new(input, &mut output))
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"]["name"], "flagsearch");
        assert_eq!(lines[1]["error"]["code"], PARSE_ERROR);
    }
}
