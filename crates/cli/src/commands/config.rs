use slotwise_core::config::{AppConfig, LoadOptions, LogFormat};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines = vec!["effective config (source precedence: overrides > env > file > default):"
        .to_string()];

    lines.push(render_line("database.url", &config.database.url));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
    ));
    lines.push(render_line("database.timeout_secs", &config.database.timeout_secs.to_string()));

    lines.push(render_line("calendar.provider", &format!("{:?}", config.calendar.provider)));
    lines.push(render_line("calendar.calendar_id", &config.calendar.calendar_id));

    lines.push(render_line("dialogue.enabled", &config.dialogue.enabled.to_string()));
    lines.push(render_line("dialogue.model", &config.dialogue.model));
    lines.push(render_line(
        "dialogue.api_key",
        if config.dialogue.api_key.is_some() { "***redacted***" } else { "(unset)" },
    ));

    lines.push(render_line("scheduling.timezone", &config.scheduling.timezone));
    lines.push(render_line(
        "scheduling.work_hours",
        &format!(
            "{:02}:00-{:02}:00",
            config.scheduling.work_hours_start, config.scheduling.work_hours_end
        ),
    ));
    lines.push(render_line(
        "scheduling.buffer_minutes",
        &config.scheduling.buffer_minutes.to_string(),
    ));
    lines.push(render_line(
        "scheduling.search_window_days",
        &config.scheduling.search_window_days.to_string(),
    ));
    lines.push(render_line(
        "scheduling.max_presented_options",
        &config.scheduling.max_presented_options.to_string(),
    ));

    lines.push(render_line("server.bind_address", &config.server.bind_address));
    lines.push(render_line("server.port", &config.server.port.to_string()));

    lines.push(render_line("logging.level", &config.logging.level));
    let format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };
    lines.push(render_line("logging.format", format));

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}
