//! `set` / `unset` handling for configuration keys.

use std::fmt;

use crate::core::config::Config;
use crate::render::CodeBlockStyle;
use crate::utils::url::is_http_url;

pub const KEYS: &[&str] = &[
    "server-url",
    "default-model",
    "cursor",
    "code-style",
    "blink-interval",
    "scroll-throttle",
    "engine-max-attempts",
];

/// Errors that can occur when modifying configuration settings.
#[derive(Debug)]
pub enum SettingError {
    /// The provided setting key is not recognized.
    UnknownKey(String),
    /// The provided value could not be parsed as a boolean.
    InvalidBoolean(String),
    /// The provided value is not a non-negative integer.
    InvalidNumber { key: &'static str, input: String },
    /// The provided value is not one of the allowed choices.
    InvalidChoice {
        key: &'static str,
        input: String,
        choices: &'static str,
    },
    /// Required arguments are missing.
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => {
                write!(f, "Unknown config key: {key} (known keys: {})", KEYS.join(", "))
            }
            SettingError::InvalidBoolean(input) => write!(
                f,
                "Invalid boolean value: {input}. Use 'on' or 'off' (also accepts true/false, yes/no)"
            ),
            SettingError::InvalidNumber { key, input } => {
                write!(f, "Invalid value for {key}: {input} (expected a whole number)")
            }
            SettingError::InvalidChoice {
                key,
                input,
                choices,
            } => write!(f, "Invalid value for {key}: {input} (expected {choices})"),
            SettingError::MissingArgs { hint, example } => write!(f, "{hint}. Example: {example}"),
        }
    }
}

impl std::error::Error for SettingError {}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, input: &str) -> Result<T, SettingError> {
    input
        .trim()
        .parse()
        .map_err(|_| SettingError::InvalidNumber {
            key,
            input: input.to_string(),
        })
}

fn require(
    args: &[String],
    hint: &'static str,
    example: &'static str,
) -> Result<String, SettingError> {
    let value = args.join(" ");
    if value.trim().is_empty() {
        return Err(SettingError::MissingArgs { hint, example });
    }
    Ok(value.trim().to_string())
}

/// Applies `key = args` to `config` and returns the message to show.
pub fn set_setting(config: &mut Config, key: &str, args: &[String]) -> Result<String, SettingError> {
    match key {
        "server-url" => {
            let value = require(
                args,
                "Specify the backend chat endpoint",
                "chatpane set server-url http://localhost:8000/chat/",
            )?;
            if !is_http_url(&value) {
                return Err(SettingError::InvalidChoice {
                    key: "server-url",
                    input: value,
                    choices: "an http:// or https:// URL",
                });
            }
            config.server_url = Some(value.clone());
            Ok(format!("✅ Set server-url to: {value}"))
        }
        "default-model" => {
            let value = require(
                args,
                "Specify the model to use by default",
                "chatpane set default-model gpt-4o-mini",
            )?;
            config.default_model = Some(value.clone());
            Ok(format!("✅ Set default-model to: {value}"))
        }
        "cursor" => {
            let input = require(args, "Specify on or off", "chatpane set cursor off")?;
            let value = parse_bool(&input).ok_or(SettingError::InvalidBoolean(input))?;
            config.cursor = Some(value);
            Ok(format!("✅ Set cursor to: {}", format_bool(value)))
        }
        "code-style" => {
            let input = require(args, "Specify a code style", "chatpane set code-style component")?;
            if CodeBlockStyle::parse(&input).is_none() {
                return Err(SettingError::InvalidChoice {
                    key: "code-style",
                    input,
                    choices: "inline or component",
                });
            }
            let value = input.to_ascii_lowercase();
            config.code_style = Some(value.clone());
            Ok(format!("✅ Set code-style to: {value}"))
        }
        "blink-interval" => {
            let input = require(args, "Specify milliseconds", "chatpane set blink-interval 500")?;
            let value: u64 = parse_number("blink-interval", &input)?;
            config.blink_interval_ms = Some(value);
            Ok(format!("✅ Set blink-interval to: {value}ms"))
        }
        "scroll-throttle" => {
            let input = require(args, "Specify milliseconds", "chatpane set scroll-throttle 100")?;
            let value: u64 = parse_number("scroll-throttle", &input)?;
            config.scroll_throttle_ms = Some(value);
            Ok(format!("✅ Set scroll-throttle to: {value}ms"))
        }
        "engine-max-attempts" => {
            let input = require(
                args,
                "Specify the number of attempts",
                "chatpane set engine-max-attempts 3",
            )?;
            let value: u32 = parse_number("engine-max-attempts", &input)?;
            if value == 0 {
                return Err(SettingError::InvalidNumber {
                    key: "engine-max-attempts",
                    input,
                });
            }
            config.engine_max_attempts = Some(value);
            Ok(format!("✅ Set engine-max-attempts to: {value}"))
        }
        _ => Err(SettingError::UnknownKey(key.to_string())),
    }
}

pub fn unset_setting(config: &mut Config, key: &str) -> Result<String, SettingError> {
    match key {
        "server-url" => config.server_url = None,
        "default-model" => config.default_model = None,
        "cursor" => config.cursor = None,
        "code-style" => config.code_style = None,
        "blink-interval" => config.blink_interval_ms = None,
        "scroll-throttle" => config.scroll_throttle_ms = None,
        "engine-max-attempts" => config.engine_max_attempts = None,
        _ => return Err(SettingError::UnknownKey(key.to_string())),
    }
    Ok(format!("✅ Unset {key}"))
}
