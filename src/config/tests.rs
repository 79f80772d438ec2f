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

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_usable_without_any_file() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PORT);
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.fragment_ttl, None);
    assert_eq!(settings.auth.session_ttl, time::Duration::hours(336));
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_fragment_ttl_means_no_expiry() {
    let mut raw = RawSettings::default();
    raw.cache.fragment_ttl_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.fragment_ttl, None);

    let mut raw = RawSettings::default();
    raw.cache.fragment_ttl_seconds = Some(20);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.fragment_ttl, Some(Duration::from_secs(20)));
}

#[test]
fn zero_fragment_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.fragment_limit = Some(0);
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.fragment_limit",
            ..
        }
    ));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_database_url_is_treated_as_missing() {
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
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["yatube"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["yatube", "migrate", "--database-url", "postgres://example"]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "yatube",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-enabled",
        "false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_enabled, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}
