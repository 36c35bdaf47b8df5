//! Merging of defaults, environment variables and YAML overrides.

use std::path::PathBuf;

use super::env::apply_env;
use super::validation::validate_tls_paths;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Build a configuration from defaults, the environment and an optional YAML
/// document, in increasing order of priority.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();
    apply_env(&mut config)?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) -> Result<(), String> {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                let cert_path = tls.cert_path.map(PathBuf::from);
                let key_path = tls.key_path.map(PathBuf::from);
                validate_tls_paths(cert_path.as_ref(), key_path.as_ref())?;
                match (cert_path, key_path) {
                    (Some(cert_path), Some(key_path)) => {
                        config.tls = Some(TlsConfig {
                            cert_path,
                            key_path,
                        });
                    }
                    _ if tls.enabled == Some(true) && config.tls.is_none() => {
                        return Err(
                            "TLS is enabled but cert_path and key_path are not configured"
                                .to_string(),
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    if let Some(upstream) = yaml.upstream {
        if let Some(key) = upstream.api_key {
            config.upstream_api_key = Some(key);
        }
        if let Some(url) = upstream.session_url {
            config.upstream_session_url = url;
        }
        if let Some(url) = upstream.connect_url {
            config.upstream_connect_url = url;
        }
        if let Some(model) = upstream.model {
            config.upstream_model = model;
        }
        if let Some(instructions) = upstream.instructions {
            config.upstream_instructions = instructions;
        }
        if let Some(voice) = upstream.voice {
            config.upstream_voice = Some(voice);
        }
        if let Some(beta) = upstream.beta_header {
            let beta = beta.trim();
            config.upstream_beta_header = (!beta.is_empty()).then(|| beta.to_string());
        }
        if let Some(frame) = upstream.interrupt_frame {
            config.upstream_interrupt_frame = frame;
        }
        config.upstream_control_actions.extend(upstream.control_actions);
        if let Some(secs) = upstream.connect_timeout_seconds {
            config.upstream_connect_timeout_seconds = secs;
        }
        if let Some(secs) = upstream.request_timeout_seconds {
            config.upstream_request_timeout_seconds = secs;
        }
    }

    if let Some(session) = yaml.session {
        if let Some(ttl) = session.ttl_seconds {
            config.session_ttl_seconds = ttl;
        }
        if let Some(max) = session.max_entries {
            config.session_max_entries = max;
        }
        if let Some(single_use) = session.single_use {
            config.session_single_use = single_use;
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(max) = security.max_websocket_connections {
            config.max_websocket_connections = Some(max);
        }
        if let Some(max) = security.max_connections_per_ip {
            config.max_connections_per_ip = max;
        }
    }

    Ok(())
}
