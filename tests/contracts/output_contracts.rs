use std::path::PathBuf;
use std::sync::Arc;
use steward::agent::{AgentManifest, StaticDiscovery};
use steward::config::StewardConfig;
use steward::tooling::cli::CliContext;
use steward::ApiError;
use tempfile::TempDir;

fn context(dir: &TempDir) -> CliContext {
    let discovery = Arc::new(StaticDiscovery::new(vec![
        AgentManifest::new("chat").with_system_prompt("Be brief."),
        AgentManifest::new("research").with_tools(["search_notes", "read_file"]),
    ]));
    let mut config = StewardConfig::default();
    config.storage.index_path = dir.path().join("index");
    config.index.default_collection = "notes".to_string();
    CliContext::with_discovery(PathBuf::from("."), config, discovery).unwrap()
}

async fn run(ctx: &CliContext, line: &str) -> String {
    ctx.execute_line(line)
        .await
        .unwrap_or_else(|e| panic!("`{line}` failed: {e}"))
        .unwrap_or_default()
}

#[tokio::test]
async fn agent_session_outputs() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    assert_eq!(
        run(&ctx, "agent list").await,
        "Available Agents:\n- chat\n- research\n---"
    );
    assert_eq!(run(&ctx, "agent list-active").await, "No agents loaded.");
    assert_eq!(run(&ctx, "agent load chat").await, "Loading agent ... chat");
    assert_eq!(run(&ctx, "agent switch chat").await, "Switching agent ... chat");
    assert_eq!(
        run(&ctx, "agent send \"hello there\"").await,
        "Sent message to chat."
    );
    assert!(matches!(
        ctx.execute_line("agent send again").await,
        Err(ApiError::AgentBusy(_))
    ));
    assert_eq!(run(&ctx, "agent stop").await, "Stopping agent ... chat");
    assert_eq!(run(&ctx, "agent stop").await, "Agent is not running.");
    assert_eq!(run(&ctx, "agent list-tools --format json").await, "[]");
    assert_eq!(run(&ctx, "agent unload").await, "Unloaded agent.");
    assert_eq!(run(&ctx, "agent stop").await, "Agent is not running.");
    assert!(matches!(
        ctx.execute_line("agent unload").await,
        Err(ApiError::NoActiveAgent)
    ));
    ctx.shutdown().await;
}

#[tokio::test]
async fn rename_tool_is_silent() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    assert_eq!(run(&ctx, "agent rename-tool a b").await, "");
    run(&ctx, "agent load research").await;
    run(&ctx, "agent switch research").await;
    assert_eq!(run(&ctx, "agent rename-tool search_notes find").await, "");
    assert_eq!(run(&ctx, "agent list-tools").await, "find\nread_file");
    assert!(matches!(
        ctx.execute_line("agent rename-tool missing x").await,
        Err(ApiError::ToolNotFound(_))
    ));
}

#[cfg(feature = "vector-store")]
#[tokio::test]
async fn index_outputs() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    assert_eq!(run(&ctx, "index list").await, "No collections.");
    assert!(matches!(
        ctx.execute_line("index search anything --collection notse").await,
        Err(ApiError::NotFound(_))
    ));
    assert_eq!(run(&ctx, "index list").await, "No collections.");
    assert_eq!(
        run(&ctx, "index add \"rust lifetimes\" \"bread recipes\"").await,
        "Added 2 document(s) to notes."
    );
    let search = run(&ctx, "index search lifetimes -k 1").await;
    assert!(search.contains("rust lifetimes"));
    assert!(!search.contains("bread"));

    let list = run(&ctx, "index list").await;
    assert!(list.contains("notes"));
    assert!(list.contains("HashingEmbeddings"));

    let info: serde_json::Value =
        serde_json::from_str(&run(&ctx, "index info --format json").await).unwrap();
    assert_eq!(info["count"], 2);
    assert_eq!(info["name"], "notes");

    assert!(matches!(
        ctx.execute_line("index delete notes").await,
        Err(ApiError::InvalidArgument(_))
    ));
    assert_eq!(
        run(&ctx, "index delete notes --where missing=1").await,
        "Deleted 0 record(s) from notes."
    );
    assert_eq!(
        run(&ctx, "index drop notes --force").await,
        "Dropped collection notes."
    );
    assert!(matches!(
        ctx.execute_line("index info notes").await,
        Err(ApiError::NotFound(_))
    ));
}
