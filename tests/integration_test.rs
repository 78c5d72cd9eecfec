/// Integration tests wiring configuration, model client, tools and the agent
/// loop together, without external network access.
use std::sync::Arc;
use std::time::Duration;

use hagent_config::{AgentConfig, Config, ConfigError, EndpointConfig, SearchConfig};
use hagent_core::{Agent, StopReason};
use hagent_model::{Message, Role, ScriptedMockProvider, StreamingChatClient};
use hagent_tools::{SearchTool, ToolRegistry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn endpoint_config(toml_text: &str) -> Config {
    toml::from_str(toml_text).unwrap()
}

#[tokio::test]
async fn empty_api_key_fails_before_any_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = endpoint_config(&format!(
        r#"
        [endpoint]
        api_key = ""
        model_id = "qwen-plus"
        base_url = "http://127.0.0.1:{port}/v1"
        "#
    ));

    assert_eq!(config.endpoint().unwrap_err(), ConfigError::Missing("api_key"));
    assert!(StreamingChatClient::from_config(&config.endpoint).is_err());

    let accepted = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
    assert!(accepted.is_err(), "no connection may be attempted");
}

#[test]
fn endpoint_fields_are_all_required() {
    assert_eq!(
        EndpointConfig::new("sk", "", "https://x/v1", 60).unwrap_err(),
        ConfigError::Missing("model_id")
    );
    assert_eq!(
        EndpointConfig::new("sk", "m", "", 60).unwrap_err(),
        ConfigError::Missing("base_url")
    );
    assert_eq!(
        EndpointConfig::new("sk", "m", "https://x/v1", 0).unwrap_err(),
        ConfigError::InvalidTimeout
    );
}

#[test]
fn explicit_config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hagent.toml");
    std::fs::write(&path, "[agent]\nmax_rounds = 9\ntool_timeout_secs = 4\n").unwrap();

    let config = hagent_config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.agent.max_rounds, 9);
    assert_eq!(config.agent.tool_timeout(), Duration::from_secs(4));
}

#[tokio::test]
async fn mock_provider_from_config_answers() {
    let config = endpoint_config("[endpoint]\nprovider = \"mock\"\n");
    let client = Arc::new(StreamingChatClient::from_config(&config.endpoint).unwrap());
    let agent = Agent::new(client, Arc::new(ToolRegistry::new()), Arc::new(AgentConfig::default()));
    let (tx, _rx) = mpsc::channel(64);

    let outcome = agent.run("hello", tx).await;
    assert_eq!(outcome.stop, StopReason::Finished);
    assert_eq!(outcome.answer, "MOCK: hello");
}

/// Serve one SerpApi-style JSON document on a loopback port.
async fn search_backend(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/search.json", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let _ = sock.read(&mut buf).await;
        let resp = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = sock.write_all(resp.as_bytes()).await;
    });
    url
}

#[tokio::test]
async fn agent_searches_and_answers() {
    let url = search_backend(
        r#"{"organic_results":[{"title":"Blackwell","snippet":"NVIDIA's newest architecture."}]}"#,
    )
    .await;
    let mut tools = ToolRegistry::new();
    tools.register(SearchTool::new(SearchConfig {
        api_key: Some("k".into()),
        endpoint: url,
        ..SearchConfig::default()
    }));

    let model = ScriptedMockProvider::replies([
        "Thought: I need current data.\nAction: Search[latest NVIDIA GPU]",
        "Thought: found it.\nAction: Finish[Blackwell]",
    ]);
    let requests = model.requests.clone();
    let client = Arc::new(StreamingChatClient::new(Arc::new(model), Duration::from_secs(5)));
    let agent = Agent::new(client, Arc::new(tools), Arc::new(AgentConfig::default()));
    let (tx, _rx) = mpsc::channel(64);

    let outcome = agent.run("What is NVIDIA's latest GPU?", tx).await;
    assert!(outcome.is_finished());
    assert_eq!(outcome.answer, "Blackwell");

    let observation = &outcome.conversation.turns()[3];
    assert_eq!(observation.role, Role::Tool);
    assert_eq!(observation.content, "[1] Blackwell\nNVIDIA's newest architecture.");

    let requests = requests.lock().unwrap();
    assert_eq!(requests[1].messages[3], Message::tool(observation.content.clone()));
}
