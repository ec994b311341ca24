use propbind::{bind_target, Binder, EnvSource, MapSource};

#[derive(Debug, Clone, Default, PartialEq)]
struct AppConfig {
    name: String,
    debug: bool,
    database: Database,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Database {
    host: String,
    port: u16,
    url: String,
}

bind_target!(AppConfig {
    name: String,
    debug: bool,
    database: Database,
});

bind_target!(Database {
    host: String,
    port: u16,
    url: String,
});

fn main() -> Result<(), propbind::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // env overrides -> defaults; placeholders resolve across both.
    let binder = Binder::builder()
        .with_source(EnvSource::new("MYAPP", "__"))
        .with_source(
            MapSource::new("defaults")
                .with("app.name", "demo")
                .with("app.debug", "false")
                .with("app.database.host", "localhost")
                .with("app.database.port", "5432")
                .with("app.database.url", "postgres://${app.database.host}:${app.database.port}/demo"),
        )
        .build();

    let config: AppConfig = binder
        .bind("app")?
        .into_option()
        .expect("defaults guarantee a bound config");

    println!("App: {} (debug={})", config.name, config.debug);
    println!("Database URL: {}", config.database.url);

    Ok(())
}
