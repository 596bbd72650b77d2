use super::*;
use crate::api::Token;
use crate::core::history::{store_token_history, ChatHistory};
use crate::core::providers::find_builtin_provider;
use tempfile::TempDir;

fn parse_args(argv: &[&str]) -> Args {
    Args::try_parse_from(argv)
        .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
}

#[test]
fn render_flags_parse() {
    let args = parse_args(&[
        "chatpane",
        "render",
        "reply.md",
        "--chunk-size",
        "4",
        "--no-cursor",
        "--code-style",
        "component",
    ]);
    match args.command {
        Commands::Render {
            file,
            chunk_size,
            no_cursor,
            code_style,
        } => {
            assert_eq!(file.as_deref(), Some(Path::new("reply.md")));
            assert_eq!(chunk_size, 4);
            assert!(no_cursor);
            assert_eq!(code_style, Some(CodeBlockStyle::Component));
        }
        _ => panic!("expected render subcommand"),
    }

    let args = parse_args(&["chatpane", "render"]);
    assert!(matches!(
        args.command,
        Commands::Render {
            file: None,
            chunk_size: 16,
            no_cursor: false,
            code_style: None
        }
    ));

    assert!(Args::try_parse_from(["chatpane", "render", "--code-style", "fancy"]).is_err());
}

#[test]
fn chat_collects_prompt_words() {
    let args = parse_args(&[
        "chatpane",
        "--config",
        "/tmp/chatpane.toml",
        "chat",
        "-m",
        "gpt-4o",
        "--history",
        "history.json",
        "explain",
        "borrowing",
        "briefly",
    ]);
    assert_eq!(args.config.as_deref(), Some(Path::new("/tmp/chatpane.toml")));
    match args.command {
        Commands::Chat {
            model,
            history,
            prompt,
        } => {
            assert_eq!(model.as_deref(), Some("gpt-4o"));
            assert_eq!(history.as_deref(), Some(Path::new("history.json")));
            assert_eq!(prompt, vec!["explain", "borrowing", "briefly"]);
        }
        _ => panic!("expected chat subcommand"),
    }

    assert!(Args::try_parse_from(["chatpane", "chat"]).is_err());
}

#[test]
fn set_without_key_and_unset_parse() {
    assert!(matches!(
        parse_args(&["chatpane", "set"]).command,
        Commands::Set { key: None, .. }
    ));
    match parse_args(&["chatpane", "set", "server-url", "http://x/chat/"]).command {
        Commands::Set { key, value } => {
            assert_eq!(key.as_deref(), Some("server-url"));
            assert_eq!(value, vec!["http://x/chat/"]);
        }
        _ => panic!("expected set subcommand"),
    }
    assert!(matches!(
        parse_args(&["chatpane", "unset", "cursor"]).command,
        Commands::Unset { .. }
    ));
}

#[test]
fn history_commands_round_trip_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = temp_dir.path().join("history.json");
    let export = temp_dir.path().join("export.json");
    let copy = temp_dir.path().join("copy.json");

    let provider = find_builtin_provider("gpt-4o-mini").cloned().unwrap();
    let mut history = ChatHistory::default();
    let tokens = [Token {
        role: "assistant".to_string(),
        content: "Stored reply".to_string(),
        llm_info: provider.clone(),
    }];
    store_token_history(&tokens, &mut history, &provider);
    history.save(&store).unwrap();

    run_history(HistoryCommands::Export {
        file: store.clone(),
        output: Some(export.clone()),
    })
    .unwrap();
    run_history(HistoryCommands::Import {
        file: copy.clone(),
        from: export.clone(),
    })
    .unwrap();
    assert_eq!(ChatHistory::load(&copy).unwrap(), history);

    run_history(HistoryCommands::Clear { file: copy.clone() }).unwrap();
    assert!(ChatHistory::load(&copy).unwrap().is_empty());

    std::fs::write(&export, "{}").unwrap();
    let err = run_history(HistoryCommands::Import {
        file: copy,
        from: export,
    })
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid file format: Imported data is not an array"
    );
}

#[test]
fn config_flag_is_used_for_set_and_unset() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("config.toml");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let path_str = path.to_str().unwrap();
    runtime
        .block_on(async_main(parse_args(&[
            "chatpane", "--config", path_str, "set", "code-style", "component",
        ])))
        .unwrap();
    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.code_style.as_deref(), Some("component"));

    runtime
        .block_on(async_main(parse_args(&[
            "chatpane", "--config", path_str, "unset", "code-style",
        ])))
        .unwrap();
    assert_eq!(Config::load_from_path(&path).unwrap(), Config::default());

    let err = runtime
        .block_on(async_main(parse_args(&[
            "chatpane", "--config", path_str, "set", "theme", "dark",
        ])))
        .unwrap_err();
    assert!(err.to_string().starts_with("Unknown config key: theme"));
}

#[test]
fn provider_add_and_remove_edit_the_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("config.toml");
    let path_str = path.to_str().unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime
        .block_on(async_main(parse_args(&[
            "chatpane",
            "--config",
            path_str,
            "provider",
            "add",
            "qwen2.5-coder",
            "--provider",
            "vllm",
            "--api-base",
            "http://localhost:9000/v1",
            "--api-key-name",
            "VLLM_KEY",
        ])))
        .unwrap();
    let config = Config::load_from_path(&path).unwrap();
    let stored = config.get_custom_provider("qwen2.5-coder").expect("provider");
    assert_eq!(stored.provider, "vllm");
    assert_eq!(stored.title, "vllm - qwen2.5-coder");
    assert_eq!(stored.api_base.as_deref(), Some("http://localhost:9000/v1"));
    assert_eq!(stored.api_key_name, "VLLM_KEY");
    assert_eq!(stored.local, None);

    let err = runtime
        .block_on(async_main(parse_args(&[
            "chatpane", "--config", path_str, "provider", "remove", "gpt-4o",
        ])))
        .unwrap_err();
    assert!(err.to_string().contains("is not a custom provider"));

    runtime
        .block_on(async_main(parse_args(&[
            "chatpane", "--config", path_str, "provider", "remove", "QWEN2.5-CODER",
        ])))
        .unwrap();
    assert!(Config::load_from_path(&path)
        .unwrap()
        .custom_providers
        .is_empty());
}

#[test]
fn provider_add_flags_parse() {
    match parse_args(&["chatpane", "provider", "add", "llama3.2", "--local"]).command {
        Commands::Provider {
            command: ProviderCommands::Add(args),
        } => {
            let provider = LlmProvider::from(args);
            assert_eq!(provider.provider, "custom");
            assert_eq!(provider.local, Some(true));
            assert!(provider.api_base.is_none());
        }
        _ => panic!("expected provider add subcommand"),
    }
    assert!(Args::try_parse_from(["chatpane", "provider", "add"]).is_err());
}
