// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Environment variable operations from the `environment:` field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// Priority used for startup scripts when none is declared.
pub const DEFAULT_PRIORITY: u8 = 50;

/// Separator used by prepend/append when none is declared.
pub const DEFAULT_SEPARATOR: &str = ":";

/// A single environment operation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnvOp {
    Set(SetEnv),
    Prepend(PrependEnv),
    Append(AppendEnv),
    Comment(CommentEnv),
    Priority(PriorityEnv),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SetEnv {
    pub set: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PrependEnv {
    pub prepend: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppendEnv {
    pub append: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CommentEnv {
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PriorityEnv {
    pub priority: u8,
}

impl EnvOp {
    /// Name of the variable this operation touches, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            EnvOp::Set(s) => Some(&s.set),
            EnvOp::Prepend(p) => Some(&p.prepend),
            EnvOp::Append(a) => Some(&a.append),
            EnvOp::Comment(_) | EnvOp::Priority(_) => None,
        }
    }
}

/// Apply operations in order to a variable map.
///
/// Prepending or appending to an unset or empty variable yields just the
/// value, without a dangling separator.
pub fn apply_env_ops(ops: &[EnvOp], vars: &mut BTreeMap<String, String>) {
    for op in ops {
        match op {
            EnvOp::Set(s) => {
                vars.insert(s.set.clone(), s.value.clone());
            }
            EnvOp::Prepend(p) => {
                let sep = p.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                let joined = match vars.get(&p.prepend) {
                    Some(existing) if !existing.is_empty() => {
                        format!("{}{sep}{existing}", p.value)
                    }
                    _ => p.value.clone(),
                };
                vars.insert(p.prepend.clone(), joined);
            }
            EnvOp::Append(a) => {
                let sep = a.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                let joined = match vars.get(&a.append) {
                    Some(existing) if !existing.is_empty() => {
                        format!("{existing}{sep}{}", a.value)
                    }
                    _ => a.value.clone(),
                };
                vars.insert(a.append.clone(), joined);
            }
            EnvOp::Comment(_) | EnvOp::Priority(_) => {}
        }
    }
}

/// Render operations as a POSIX shell startup script.
pub fn generate_startup_script(ops: &[EnvOp]) -> String {
    let mut script = format!("# generated by pkgenv (priority {})\n", get_priority(ops));
    for op in ops {
        match op {
            EnvOp::Set(s) => {
                script.push_str(&format!("export {}=\"{}\"\n", s.set, escape(&s.value)));
            }
            EnvOp::Prepend(p) => {
                let sep = p.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                script.push_str(&format!(
                    "export {name}=\"{value}{sep}${{{name}}}\"\n",
                    name = p.prepend,
                    value = escape(&p.value),
                    sep = escape(sep),
                ));
            }
            EnvOp::Append(a) => {
                let sep = a.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                script.push_str(&format!(
                    "export {name}=\"${{{name}}}{sep}{value}\"\n",
                    name = a.append,
                    value = escape(&a.value),
                    sep = escape(sep),
                ));
            }
            EnvOp::Comment(c) => {
                for line in c.comment.lines() {
                    script.push_str(&format!("# {line}\n"));
                }
            }
            EnvOp::Priority(_) => {}
        }
    }
    script
}

/// Priority of the startup script; the last declared priority wins.
pub fn get_priority(ops: &[EnvOp]) -> u8 {
    ops.iter()
        .rev()
        .find_map(|op| match op {
            EnvOp::Priority(p) => Some(p.priority),
            _ => None,
        })
        .unwrap_or(DEFAULT_PRIORITY)
}

/// Escape a value for use inside double quotes in a POSIX shell.
pub(crate) fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
