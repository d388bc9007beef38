use crate::ui;
use anyhow::Result;
use probe_config::parse_config_from_file;
use probe_core::CollectorRegistry;
use std::path::PathBuf;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    ui::heading("Validating agent config");
    ui::field(0, "File", config_file.display());

    let checked = async {
        let config = parse_config_from_file(&config_file).await?;
        let collectors = CollectorRegistry::with_defaults().build(
            &config.const_labels,
            &config.collectors.settings,
            &config.collectors.disabled,
        )?;
        anyhow::Ok((config, collectors))
    };

    match checked.await {
        Ok((config, collectors)) => {
            ui::verdict(true, "Config is valid");
            ui::field(0, "Target", &config.target.url);
            ui::field(0, "Listen", &config.listen);
            ui::field(
                0,
                "Collectors",
                collectors.keys().cloned().collect::<Vec<_>>().join(", "),
            );

            match config.collectors.concurrency_limit {
                Some(limit) => ui::field(0, "Concurrency limit", limit),
                None => ui::field(0, "Concurrency limit", "derived from connection cap"),
            }

            match config.cache_config().map_err(anyhow::Error::msg)? {
                Some(cache) => {
                    ui::field(0, "Cache", cache.kind);
                    ui::field(1, "Default TTL", humantime::format_duration(cache.default_ttl));
                    for (collector, ttl) in &cache.collector_ttl {
                        ui::field(1, &format!("TTL {}", collector), humantime::format_duration(*ttl));
                    }
                    for server in &cache.servers {
                        ui::field(1, "Server", server);
                    }
                }
                None => ui::field(0, "Cache", "disabled"),
            }

            if collectors.is_empty() {
                ui::warning("every collector is disabled");
            }

            Ok(())
        }
        Err(e) => {
            ui::verdict(false, "Config is invalid");
            ui::field(0, "Error", &e);
            Err(e)
        }
    }
}
