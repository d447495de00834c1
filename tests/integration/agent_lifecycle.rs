use crate::integration::support::{counter, manager_in, recorder};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steward::agent::{AgentEvent, AgentState, AgentTask, IdleTask, StopSignal, TaskContext};
use steward::{ApiError, StopOutcome};
use tempfile::TempDir;

/// Task that never looks at its stop signal.
struct Deaf;

#[async_trait]
impl AgentTask for Deaf {
    async fn run(&self, _ctx: TaskContext, _stop: StopSignal) -> Result<(), ApiError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Task that records the context it ran with and waits for stop.
struct Capture(Arc<parking_lot::Mutex<Option<TaskContext>>>, Arc<AtomicBool>);

#[async_trait]
impl AgentTask for Capture {
    async fn run(&self, ctx: TaskContext, mut stop: StopSignal) -> Result<(), ApiError> {
        *self.0.lock() = Some(ctx);
        stop.stopped().await;
        self.1.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_load_switch_stop_unload_scenario() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());

    let loadable: Vec<String> = manager.list_loadable().iter().unwrap().collect();
    assert_eq!(loadable, vec!["research", "writer"]);

    manager.load("research").unwrap();
    manager.load("writer").unwrap();
    manager.switch("research").unwrap();
    assert_eq!(
        manager.stop().unwrap(),
        StopOutcome::SignalSent {
            agent: "research".to_string()
        }
    );

    let loaded = manager.list_loaded();
    assert_eq!(loaded["research"], AgentState::Stopped);
    assert_eq!(loaded["writer"], AgentState::Loaded);

    assert_eq!(manager.unload().await.unwrap(), "research");
    let loaded = manager.list_loaded();
    assert_eq!(loaded.len(), 1);
    assert!(manager.active_name().is_none());

    // Still discoverable after unload
    let loadable: Vec<String> = manager.list_loadable().iter().unwrap().collect();
    assert!(loadable.contains(&"research".to_string()));
    manager.load("research").unwrap();
}

#[tokio::test]
async fn test_loadable_sequence_sees_new_manifests() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    let loadable = manager.list_loadable();
    assert_eq!(loadable.iter().unwrap().count(), 2);

    crate::integration::support::write_manifest(dir.path(), "critic", &[]);
    assert_eq!(loadable.iter().unwrap().count(), 3);
}

#[tokio::test]
async fn test_switch_keeps_previous_session_running() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    manager.load("research").unwrap();
    manager.load("writer").unwrap();
    manager.switch("research").unwrap();
    manager
        .send("survey", Arc::new(IdleTask::default()))
        .await
        .unwrap();

    manager.switch("writer").unwrap();
    assert!(manager
        .with_agent("research", |a| a.is_running())
        .unwrap());
    assert_eq!(manager.list_loaded()["research"], AgentState::Loaded);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_session_receives_agent_context() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    manager.load("research").unwrap();
    manager.switch("research").unwrap();
    manager.rename_tool("web_search", "search").unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(None));
    let stopped = Arc::new(AtomicBool::new(false));
    manager
        .send(
            "find sources",
            Arc::new(Capture(seen.clone(), stopped.clone())),
        )
        .await
        .unwrap();

    // Let the task record its context
    for _ in 0..100 {
        if seen.lock().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let ctx = seen.lock().clone().unwrap();
    assert_eq!(ctx.agent, "research");
    assert_eq!(ctx.message, "find sources");
    assert_eq!(ctx.system_prompt.as_deref(), Some("You are research."));
    assert_eq!(ctx.tools, vec!["search", "read_file"]);

    manager.unload().await.unwrap();
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_unload_aborts_task_that_ignores_stop() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path()).with_stop_timeout(Duration::from_millis(50));
    manager.load("writer").unwrap();
    manager.switch("writer").unwrap();
    manager.send("draft", Arc::new(Deaf)).await.unwrap();

    let started = std::time::Instant::now();
    manager.unload().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(manager.list_loaded().is_empty());
}

#[tokio::test]
async fn test_events_and_listener_release() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    manager.load("research").unwrap();
    manager.load("writer").unwrap();

    let (listener, seen) = recorder();
    manager.subscribe("research", listener.clone()).unwrap();
    let (writer_listener, writer_count) = counter();
    manager.subscribe("writer", writer_listener).unwrap();

    manager.switch("research").unwrap();
    manager.remember("paper", "arxiv 1706.03762").unwrap();
    assert!(manager.forget("paper").unwrap().forgotten);
    manager.stop().unwrap();
    manager.unload().await.unwrap();

    let events = seen.lock().unwrap().clone();
    assert_eq!(
        events.first(),
        Some(&AgentEvent::StateChanged {
            agent: "research".to_string(),
            from: AgentState::Loaded,
            to: AgentState::Active,
        })
    );
    assert!(events.contains(&AgentEvent::Forgot {
        agent: "research".to_string(),
        term: "paper".to_string(),
    }));
    assert_eq!(
        events.last(),
        Some(&AgentEvent::StateChanged {
            agent: "research".to_string(),
            from: AgentState::Stopped,
            to: AgentState::Unloaded,
        })
    );

    // Writer never changed state
    assert_eq!(writer_count.load(Ordering::SeqCst), 0);
    // Manager no longer holds the research listener
    assert_eq!(Arc::strong_count(&listener), 1);
}

#[tokio::test]
async fn test_failed_operations_leave_registry_unchanged() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(dir.path());
    manager.load("research").unwrap();
    manager.switch("research").unwrap();
    let before = manager.list_loaded();

    assert!(matches!(manager.load("ghost"), Err(ApiError::NotFound(_))));
    assert!(matches!(manager.switch("writer"), Err(ApiError::NotFound(_))));
    assert!(matches!(
        manager.load("research"),
        Err(ApiError::AlreadyLoaded(_))
    ));
    assert!(matches!(
        manager.rename_tool("read_file", "web_search"),
        Err(ApiError::InvalidArgument(_))
    ));

    assert_eq!(manager.list_loaded(), before);
    assert_eq!(manager.active_name().as_deref(), Some("research"));
}

#[test]
fn test_concurrent_switches_keep_one_agent_active() {
    let dir = TempDir::new().unwrap();
    crate::integration::support::write_manifest(dir.path(), "critic", &[]);
    crate::integration::support::write_manifest(dir.path(), "editor", &[]);
    let manager = Arc::new(manager_in(dir.path()));
    let names = ["critic", "editor", "research", "writer"];
    for name in names {
        manager.load(name).unwrap();
    }

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                for round in 0..200 {
                    manager.switch(names[(worker + round) % names.len()]).unwrap();
                    if round % 5 == worker % 5 {
                        let _ = manager.stop();
                    }
                    let (loaded, active) = manager.loaded_with_active();
                    let focused = loaded.values().filter(|s| s.holds_focus()).count();
                    assert!(focused <= 1);
                    match active {
                        Some(name) => assert!(loaded[&name].holds_focus()),
                        None => assert_eq!(focused, 0),
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let (loaded, active) = manager.loaded_with_active();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded.values().filter(|s| s.holds_focus()).count(), 1);
    assert!(loaded[&active.unwrap()].holds_focus());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_switch_and_unload_keep_registry_consistent() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(manager_in(dir.path()));
    let names = ["research", "writer"];

    let mut tasks = Vec::new();
    for worker in 0..6usize {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..100usize {
                let name = names[(worker + round) % names.len()];
                // Races with other workers are expected to fail some calls
                let _ = manager.load(name);
                let _ = manager.switch(name);
                if round % 3 == worker % 3 {
                    let _ = manager.unload().await;
                }
                let (loaded, active) = manager.loaded_with_active();
                let focused = loaded.values().filter(|s| s.holds_focus()).count();
                assert!(focused <= 1);
                match active {
                    Some(name) => assert!(loaded[&name].holds_focus()),
                    None => assert_eq!(focused, 0),
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}
