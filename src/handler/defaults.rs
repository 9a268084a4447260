// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! OS preference writer.
//!
//! Manages single keys of the macOS user defaults database. Values are written
//! with an explicit type flag. When the entry does not name a type, the flag
//! is inferred from the JSON value itself.
//!
//! # Comparison
//!
//! The `defaults read` tool prints booleans as `1` or `0`, and prints numbers
//! without a fraction as integers. Expected values are normalized the same way
//! before comparing against what is currently stored.

use crate::{
    config::{DefaultsConfig, DefaultsType},
    handler::{CheckResult, Context, Handler},
    shell::{RunOptions, Shell},
};

use serde_json::{Number, Value};
use tracing::instrument;

/// Handler for macOS user defaults.
#[derive(Default, Debug, Clone, Copy)]
pub struct Defaults;

impl Handler for Defaults {
    type Config = DefaultsConfig;

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn check<S: Shell>(
        &self,
        ctx: &Context<S>,
        config: &DefaultsConfig,
        name: &str,
    ) -> CheckResult {
        let cmd = format!("defaults read {} {}", quote(&config.domain), quote(&config.key));
        let result = ctx.query(&cmd).await;
        if !result.success {
            return CheckResult::not_installed("Not set");
        }

        let current = result.stdout.trim();
        let expected = format_for_comparison(&config.value);
        if current == expected {
            CheckResult::installed(format!("Set to {current}"))
        } else {
            CheckResult::modified(format!("Current: {current}, expected: {expected}"))
        }
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn install<S: Shell>(&self, ctx: &Context<S>, config: &DefaultsConfig, name: &str) -> bool {
        let cmd = format!(
            "defaults write {} {} {} {}",
            quote(&config.domain),
            quote(&config.key),
            type_flag(config.kind, &config.value),
            format_for_write(&config.value),
        );
        let result = ctx
            .mutate(format!("Setting {name}: {cmd}"), &cmd, &RunOptions::default())
            .await;
        if !result.success {
            ctx.log()
                .append(format!("Failed to set {name}: {}", result.stderr));
            return false;
        }

        ctx.done(format!("Successfully set {name}"));
        true
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn uninstall<S: Shell>(
        &self,
        ctx: &Context<S>,
        config: &DefaultsConfig,
        name: &str,
    ) -> bool {
        let cmd = format!("defaults delete {} {}", quote(&config.domain), quote(&config.key));
        let result = ctx
            .mutate(format!("Removing {name}: {cmd}"), &cmd, &RunOptions::default())
            .await;

        // INVARIANT: Deleting a key that is already gone counts as success.
        if result.success || result.stderr.contains("does not exist") {
            ctx.done(format!("Successfully removed {name}"));
            return true;
        }

        ctx.log()
            .append(format!("Failed to remove {name}: {}", result.stderr));
        false
    }
}

/// Type flag for `defaults write`.
fn type_flag(kind: Option<DefaultsType>, value: &Value) -> &'static str {
    let kind = kind.unwrap_or_else(|| infer_type(value));
    match kind {
        DefaultsType::Bool => "-bool",
        DefaultsType::String => "-string",
        DefaultsType::Int => "-int",
        DefaultsType::Float => "-float",
        DefaultsType::Dict => "-dict",
        DefaultsType::Array => "-array",
    }
}

fn infer_type(value: &Value) -> DefaultsType {
    match value {
        Value::Bool(_) => DefaultsType::Bool,
        Value::Number(number) if is_integral(number) => DefaultsType::Int,
        Value::Number(_) => DefaultsType::Float,
        Value::Array(_) => DefaultsType::Array,
        Value::Object(_) => DefaultsType::Dict,
        Value::String(_) | Value::Null => DefaultsType::String,
    }
}

/// Render value as `defaults write` arguments.
fn format_for_write(value: &Value) -> String {
    match value {
        Value::Bool(true) => "YES".into(),
        Value::Bool(false) => "NO".into(),
        Value::Number(number) => format_number(number),
        Value::String(string) => quote(string),
        Value::Null => quote(""),
        Value::Array(items) => items
            .iter()
            .map(format_for_write)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, value)| format!("{} {}", quote(key), format_for_write(value)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Render value the way `defaults read` prints it.
fn format_for_comparison(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".into(),
        Value::Bool(false) => "0".into(),
        Value::Number(number) => format_number(number),
        Value::String(string) => string.clone(),
        other => other.to_string(),
    }
}

fn is_integral(number: &Number) -> bool {
    number.is_i64()
        || number.is_u64()
        || number
            .as_f64()
            .is_some_and(|float| float.is_finite() && float.fract() == 0.0)
}

fn format_number(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }

    if let Some(uint) = number.as_u64() {
        return uint.to_string();
    }

    match number.as_f64() {
        // INVARIANT: Only integral floats in the exactly representable range
        // are printed without a fraction.
        Some(float) if is_integral(number) && float.abs() < 9.0e15 => {
            format!("{}", float as i64)
        }
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}

/// Double-quote string for the shell.
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
