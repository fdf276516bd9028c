//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, STT_WS_URL, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! ## Deployment shortcuts:
//! `HOST`, `PORT`, `STT_WS_URL` and `TTS_WS_URL` are accepted without the
//! APP_ prefix, matching how the service has historically been deployed.

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, recognizer, synthesizer,
/// broadcast) makes it easier to understand and maintain as the application grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub recognizer: RecognizerConfig,
    pub synthesizer: SynthesizerConfig,
    pub broadcast: BroadcastConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Streaming recognizer (STT) client configuration.
///
/// ## Fields:
/// - `endpoint`: WebSocket URL of the external recognizer
/// - `chunk_size`: PCM bytes per transmitted frame
/// - `frame_interval_ms`: pause between frames, emulating real-time delivery
/// - `silence_ms`: duration of synthetic trailing silence that flushes the recognizer
/// - `deadline_ms`: upper bound on one recognition call; on expiry the session
///   closes and returns whatever partial transcript has accumulated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    pub endpoint: String,
    pub chunk_size: usize,
    pub frame_interval_ms: u64,
    pub silence_ms: u64,
    pub deadline_ms: u64,
}

/// Speech synthesizer (TTS) client configuration.
///
/// ## Fields:
/// - `endpoint`: WebSocket URL of the external synthesizer
/// - `read_timeout_ms`: silence on the socket for this long means the
///   synthesizer has finished sending audio
/// - `output_sample_rate`: rate stamped on the WAV returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    pub endpoint: String,
    pub read_timeout_ms: u64,
    pub output_sample_rate: u32,
}

/// Broadcast message queue configuration.
///
/// ## Tuning guidelines:
/// The queue holds events between client polls of `/api/messages`. When it is
/// full the oldest entry is evicted, so slow consumers lose the oldest events
/// rather than blocking producers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    pub capacity: usize,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file
/// exists. They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8080,                     // Common development port
            },
            recognizer: RecognizerConfig {
                endpoint: "ws://127.0.0.1:8002/stt".to_string(),
                chunk_size: 16 * 1024,   // 16 KiB of PCM per frame
                frame_interval_ms: 20,   // 20ms pacing between frames
                silence_ms: 1000,        // 1s of trailing silence
                deadline_ms: 30_000,     // Whole-call upper bound
            },
            synthesizer: SynthesizerConfig {
                endpoint: "ws://127.0.0.1:8003/tts".to_string(),
                read_timeout_ms: 6000,      // Quiet socket means synthesis finished
                output_sample_rate: 44_100, // CD-adjacent rate for returned WAV
            },
            broadcast: BroadcastConfig {
                capacity: 256,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST, PORT, STT_WS_URL and TTS_WS_URL
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `APP_RECOGNIZER_CHUNK_SIZE=8192`: Override frame size
    /// - `STT_WS_URL=ws://stt.internal:8002/stt`: Point at another recognizer
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists) - required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            // Example: APP_SERVER_HOST becomes server.host in the config
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Handle special environment variables used by deployment platforms
        // These don't follow the APP_ prefix convention but are commonly used
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(url) = env::var("STT_WS_URL") {
            settings = settings.set_override("recognizer.endpoint", url)?;
        }

        if let Ok(url) = env::var("TTS_WS_URL") {
            settings = settings.set_override("synthesizer.endpoint", url)?;
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 (port 0 is reserved and can't be used)
    /// - Backend endpoints are WebSocket URLs
    /// - Chunk size and frame interval are non-zero (the pacing math divides by them)
    /// - Broadcast capacity allows at least one queued message
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        for (name, endpoint) in [
            ("recognizer", &self.recognizer.endpoint),
            ("synthesizer", &self.synthesizer.endpoint),
        ] {
            if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
                return Err(anyhow::anyhow!(
                    "{} endpoint must be a ws:// or wss:// URL, got {}",
                    name,
                    endpoint
                ));
            }
        }

        if self.recognizer.chunk_size == 0 {
            return Err(anyhow::anyhow!("Recognizer chunk size must be greater than 0"));
        }

        if self.recognizer.frame_interval_ms == 0 {
            return Err(anyhow::anyhow!("Frame interval must be greater than 0"));
        }

        if self.synthesizer.output_sample_rate == 0 {
            return Err(anyhow::anyhow!("Synthesizer output sample rate must be greater than 0"));
        }

        if self.broadcast.capacity == 0 {
            return Err(anyhow::anyhow!("Broadcast queue capacity must be greater than 0"));
        }

        Ok(())  // All validation passed
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// This method allows updating only some fields, not the entire configuration.
    /// For example, you can send just `{"recognizer": {"endpoint": "ws://other:8002/stt"}}`
    /// to repoint the recognizer.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        // Parse the JSON string into a generic value
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        // Update server configuration if provided
        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        // Update recognizer configuration if provided
        if let Some(recognizer) = partial_config.get("recognizer") {
            if let Some(endpoint) = recognizer.get("endpoint").and_then(|v| v.as_str()) {
                self.recognizer.endpoint = endpoint.to_string();
            }
            if let Some(size) = recognizer.get("chunk_size").and_then(|v| v.as_u64()) {
                self.recognizer.chunk_size = size as usize;
            }
            if let Some(interval) = recognizer.get("frame_interval_ms").and_then(|v| v.as_u64()) {
                self.recognizer.frame_interval_ms = interval;
            }
            if let Some(silence) = recognizer.get("silence_ms").and_then(|v| v.as_u64()) {
                self.recognizer.silence_ms = silence;
            }
            if let Some(deadline) = recognizer.get("deadline_ms").and_then(|v| v.as_u64()) {
                self.recognizer.deadline_ms = deadline;
            }
        }

        // Update synthesizer configuration if provided
        if let Some(synthesizer) = partial_config.get("synthesizer") {
            if let Some(endpoint) = synthesizer.get("endpoint").and_then(|v| v.as_str()) {
                self.synthesizer.endpoint = endpoint.to_string();
            }
            if let Some(timeout) = synthesizer.get("read_timeout_ms").and_then(|v| v.as_u64()) {
                self.synthesizer.read_timeout_ms = timeout;
            }
            if let Some(rate) = synthesizer.get("output_sample_rate").and_then(|v| v.as_u64()) {
                self.synthesizer.output_sample_rate = rate as u32;
            }
        }

        // Update broadcast configuration if provided
        if let Some(broadcast) = partial_config.get("broadcast") {
            if let Some(capacity) = broadcast.get("capacity").and_then(|v| v.as_u64()) {
                self.broadcast.capacity = capacity as usize;
            }
        }

        // Validate the updated configuration to ensure it's still valid
        self.validate()?;
        Ok(())
    }
}
