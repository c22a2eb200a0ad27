use super::*;

#[test]
fn no_subcommand_parses() {
    let cli = Cli::try_parse_from(["msri"]).unwrap();
    assert!(cli.command.is_none());
}

#[test]
fn run_defaults() {
    let cli = Cli::try_parse_from(["msri", "run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            date: None,
            memory: false,
            json: false,
            ..
        })
    ));
}

#[test]
fn run_with_date_and_memory_store() {
    let cli = Cli::try_parse_from(["msri", "run", "--date", "2024-03-10", "--memory", "--json"])
        .unwrap();
    let Some(Commands::Run {
        date, memory, json, ..
    }) = cli.command
    else {
        panic!("expected run");
    };
    assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 10));
    assert!(memory);
    assert!(json);
}

#[test]
fn run_rejects_malformed_date() {
    assert!(Cli::try_parse_from(["msri", "run", "--date", "10/03/2024"]).is_err());
}

#[cfg(feature = "demo")]
#[test]
fn run_with_demo_seed() {
    let cli = Cli::try_parse_from(["msri", "run", "--demo-seed", "7"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            demo_seed: Some(7),
            ..
        })
    ));
}

#[test]
fn health_json() {
    let cli = Cli::try_parse_from(["msri", "health", "--json"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Health { json: true })));
}

#[test]
fn series_range() {
    let cli = Cli::try_parse_from([
        "msri",
        "series",
        "--from",
        "2024-01-01",
        "--to",
        "2024-03-31",
    ])
    .unwrap();
    let Some(Commands::Series {
        from,
        to,
        summary,
        json,
    }) = cli.command
    else {
        panic!("expected series");
    };
    assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1));
    assert_eq!(to, NaiveDate::from_ymd_opt(2024, 3, 31));
    assert!(!summary);
    assert!(!json);
}

#[test]
fn series_summary() {
    let cli = Cli::try_parse_from(["msri", "series", "--summary"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Series { summary: true, .. })
    ));
}

#[test]
fn db_migrate() {
    let cli = Cli::try_parse_from(["msri", "db", "migrate"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn db_ping() {
    let cli = Cli::try_parse_from(["msri", "db", "ping"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn config_check_with_path() {
    let cli = Cli::try_parse_from(["msri", "config", "check", "--path", "config/index.yaml"])
        .unwrap();
    let Some(Commands::Config {
        command: ConfigCommands::Check { path },
    }) = cli.command
    else {
        panic!("expected config check");
    };
    assert_eq!(path, Some(PathBuf::from("config/index.yaml")));
}

#[test]
fn shipped_index_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/index.yaml");
    assert!(query::run_config_check(&path).is_ok());
}

#[test]
fn db_requires_a_subcommand() {
    assert!(Cli::try_parse_from(["msri", "db"]).is_err());
}

fn app_config(env: msri_core::Environment) -> AppConfig {
    AppConfig {
        database_url: None,
        env,
        log_level: "info".to_string(),
        index_config_path: std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../config/index.yaml"),
        db_max_connections: 1,
        db_min_connections: 1,
        db_acquire_timeout_secs: 1,
        fetch_timeout_secs: 1,
        fetch_user_agent: "msri-test".to_string(),
        fetch_max_retries: 0,
        fetch_retry_backoff_ms: 1,
        merge_max_attempts: 1,
    }
}

#[tokio::test]
async fn synthetic_data_is_refused_in_production() {
    let app = app_config(msri_core::Environment::Production);
    let index = msri_core::load_index_config(&app.index_config_path).unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    let err = run::run_cycle(&app, index, date, true, false, Some(7))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("production"), "got: {err}");
}

#[tokio::test]
async fn postgres_commands_need_a_database_url() {
    let app = app_config(msri_core::Environment::Development);
    let index = msri_core::load_index_config(&app.index_config_path).unwrap();

    let err = open_store(&app, &index).await.err().expect("expected an error");
    assert!(err.to_string().contains("DATABASE_URL"), "got: {err}");
}

#[cfg(feature = "demo")]
#[tokio::test]
async fn memory_run_needs_no_database() {
    let app = app_config(msri_core::Environment::Development);
    let index = msri_core::load_index_config(&app.index_config_path).unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    run::run_cycle(&app, index, date, true, true, Some(3))
        .await
        .unwrap();
}
