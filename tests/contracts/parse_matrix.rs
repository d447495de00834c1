use clap::{CommandFactory, Parser};
use steward::tooling::cli::{AgentCommands, Cli, Commands, IndexCommands, ShellLine};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["steward", "agent", "load", "research"],
        vec!["steward", "agent", "switch", "research"],
        vec!["steward", "agent", "stop"],
        vec!["steward", "agent", "unload"],
        vec!["steward", "agent", "list"],
        vec!["steward", "agent", "list-active", "--format", "json"],
        vec!["steward", "agent", "rename-tool", "search", "web_search"],
        vec!["steward", "agent", "list-tools"],
        vec!["steward", "agent", "clear-memory"],
        vec!["steward", "agent", "forget", "colour"],
        vec!["steward", "agent", "remember", "colour", "blue"],
        vec!["steward", "agent", "send", "hello"],
        vec!["steward", "index", "list"],
        vec!["steward", "index", "info"],
        vec!["steward", "index", "info", "notes", "--format", "json"],
        vec!["steward", "index", "add", "one", "two", "--collection", "notes"],
        vec!["steward", "index", "search", "query", "-k", "2"],
        vec![
            "steward", "index", "delete", "notes", "--id", "a", "--id", "b", "--where", "k=v",
        ],
        vec!["steward", "index", "drop", "notes", "--force"],
        vec!["steward", "shell"],
        vec!["steward", "--verbose", "--log-level", "debug", "agent", "list"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_missing_arguments() {
    let invalid: Vec<Vec<&str>> = vec![
        vec!["steward", "agent", "load"],
        vec!["steward", "agent", "rename-tool", "only-one"],
        vec!["steward", "agent", "remember", "term"],
        vec!["steward", "index", "add"],
        vec!["steward", "index", "drop"],
        vec!["steward", "agent", "stop", "extra"],
    ];
    for args in invalid {
        assert!(
            Cli::try_parse_from(args.clone()).is_err(),
            "expected parse failure for args: {args:?}"
        );
    }
}

#[test]
fn parse_delete_collects_repeated_flags() {
    let cli = Cli::try_parse_from([
        "steward", "index", "delete", "notes", "--id", "a", "--id", "b", "--where", "kind=draft",
    ])
    .unwrap();
    match cli.command {
        Commands::Index {
            command:
                IndexCommands::Delete {
                    name,
                    ids,
                    where_pairs,
                },
        } => {
            assert_eq!(name, "notes");
            assert_eq!(ids, vec!["a", "b"]);
            assert_eq!(where_pairs, vec!["kind=draft"]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn shell_line_has_no_binary_name() {
    let line = ShellLine::try_parse_from(["agent", "switch", "chat"]).unwrap();
    assert_eq!(
        line.command,
        Commands::Agent {
            command: AgentCommands::Switch {
                name: "chat".to_string()
            }
        }
    );
}

#[test]
fn help_lists_every_agent_command() {
    let mut command = Cli::command();
    let agent = command
        .find_subcommand_mut("agent")
        .expect("agent subcommand");
    let names: Vec<String> = agent
        .get_subcommands()
        .map(|c| c.get_name().to_string())
        .collect();
    for expected in [
        "load",
        "switch",
        "stop",
        "unload",
        "list",
        "list-active",
        "rename-tool",
        "list-tools",
        "clear-memory",
        "forget",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    Cli::command().debug_assert();
}
