use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use steward::agent::{AgentEvent, AgentManager, DirectoryDiscovery, Listener};

/// Write `<dir>/<name>.toml` with the given tools.
pub fn write_manifest(dir: &Path, name: &str, tools: &[&str]) {
    let tools = tools
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(", ");
    fs::write(
        dir.join(format!("{}.toml", name)),
        format!(
            "description = \"{name} agent\"\nsystem_prompt = \"You are {name}.\"\ntools = [{tools}]\n"
        ),
    )
    .unwrap();
}

/// Manager over a temp agents directory holding `research` and `writer`, no built-ins.
pub fn manager_in(dir: &Path) -> AgentManager {
    write_manifest(dir, "research", &["web_search", "read_file"]);
    write_manifest(dir, "writer", &["draft"]);
    AgentManager::new(Arc::new(
        DirectoryDiscovery::with_dir(dir).without_builtins(),
    ))
}

/// Listener that records every event it sees.
pub fn recorder() -> (Listener, Arc<Mutex<Vec<AgentEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener: Listener = Arc::new(move |event: &AgentEvent| {
        sink.lock().unwrap().push(event.clone());
    });
    (listener, seen)
}

/// Listener that only counts calls.
pub fn counter() -> (Listener, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = count.clone();
    let listener: Listener = Arc::new(move |_: &AgentEvent| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    (listener, count)
}
