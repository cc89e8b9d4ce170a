use std::env;
use tracing_subscriber::{prelude::*, registry, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "dockyard_api=info,dockyard_store=info,tower_http=info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the built-in directives. `LOG_FORMAT=json` switches
/// to one JSON object per line, anything else gets the human formatter.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_DIRECTIVES},hyper=warn,sqlx=warn")));

    let is_json = env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    let subscriber = registry().with(env_filter);

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
    if is_json {
        subscriber.with(fmt_layer.json()).init();
    } else {
        subscriber.with(fmt_layer.with_target(true)).init();
    }
}
