use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_feed_and_cache_contract() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.feed.page_size.get(), 10);
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.ttl, Duration::from_secs(20));
    assert_eq!(settings.cache.max_entries.get(), 256);
    assert_eq!(settings.database.backend, DatabaseBackend::Postgres);
    assert_eq!(settings.identity.user_header.as_str(), "x-remote-user");
    assert_eq!(settings.identity.login_url, "/auth/login/");
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.feed.page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("page size must be positive");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "feed.page_size",
            ..
        }
    ));
}

#[test]
fn zero_cache_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.max_entries = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn invalid_identity_header_is_rejected() {
    let mut raw = RawSettings::default();
    raw.identity.user_header = Some("not a header".to_string());

    let err = Settings::from_raw(raw).expect_err("header name must be valid");
    assert!(err.to_string().contains("identity.user_header"));
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cache_can_be_tuned_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_enabled: Some(false),
        cache_ttl_seconds: Some(5),
        feed_page_size: Some(3),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.ttl, Duration::from_secs(5));
    assert_eq!(settings.feed.page_size.get(), 3);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["yatube"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "yatube",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-backend",
        "memory",
        "--cache-enabled=false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_backend,
                Some(DatabaseBackend::Memory)
            );
            assert_eq!(serve.overrides.cache_enabled, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_group_create_arguments() {
    let args = CliArgs::parse_from([
        "yatube",
        "groups",
        "--database-url",
        "postgres://example",
        "create",
        "Cats of the world",
        "--description",
        "Everything about cats",
    ]);

    match args.command.expect("groups command") {
        Command::Groups(groups) => {
            assert_eq!(
                groups.database.database_url.as_deref(),
                Some("postgres://example")
            );
            match groups.command {
                GroupsCommand::Create(create) => {
                    assert_eq!(create.title, "Cats of the world");
                    assert!(create.slug.is_none());
                    assert_eq!(create.description, "Everything about cats");
                }
                GroupsCommand::Delete(_) => panic!("wrong subcommand parsed"),
            }
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_user_create_arguments() {
    let args = CliArgs::parse_from(["yatube", "users", "create", "leo"]);

    match args.command.expect("users command") {
        Command::Users(users) => match users.command {
            UsersCommand::Create(create) => assert_eq!(create.username, "leo"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["yatube", "migrate", "--database-url", "postgres://m"]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(migrate.database.database_url.as_deref(), Some("postgres://m"));
        }
        _ => panic!("wrong command parsed"),
    }
}
