// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Profile resolution.
//!
//! A profile may inherit from any number of base profiles, which may in turn
//! inherit from their own bases. Resolution flattens this hierarchy into a
//! plain list of package names and a plain list of pre-install task names.
//!
//! # Ordering
//!
//! Resolution is a depth-first walk over bases in declaration order. Every base
//! is fully resolved, including its own bases, before the items of the profile
//! that inherits from it are appended. A name that already showed up earlier is
//! not repeated, i.e., first occurrence wins.
//!
//! # Cycles
//!
//! The base graph is not trusted to be acyclic. A profile that was already
//! entered is skipped when reached again, so cyclic and self-referencing base
//! chains terminate without error. Bases that name unknown profiles are skipped
//! as well.

use crate::config::{ConfigDocument, Profile};

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Flattened view of a profile and everything it inherits.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProfile {
    /// Package names in resolution order.
    pub packages: Vec<String>,

    /// Pre-install task names in resolution order.
    #[serde(rename = "pre-install")]
    pub pre_install: Vec<String>,
}

/// Resolve target profile of configuration document.
///
/// # Errors
///
/// - Return [`ProfileError::NotFound`] if `name` is not a known profile.
pub fn resolve(document: &ConfigDocument, name: &str) -> Result<ResolvedProfile> {
    if !document.profiles.contains_key(name) {
        return Err(ProfileError::NotFound {
            name: name.to_string(),
            available: document.profiles.keys().cloned().collect(),
        });
    }

    let mut resolver = Resolver::default();
    let mut visited = HashSet::new();
    let mut stack = vec![Frame::Enter(name)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(name) => {
                // INVARIANT: Mark before descending into bases to break cycles.
                if !visited.insert(name) {
                    continue;
                }

                let Some(profile) = document.profiles.get(name) else {
                    continue;
                };

                stack.push(Frame::Emit(profile));
                let bases = profile.bases().collect::<Vec<_>>();
                stack.extend(bases.into_iter().rev().map(Frame::Enter));
            }
            Frame::Emit(profile) => resolver.emit(profile),
        }
    }

    Ok(resolver.finish())
}

/// Every package name that any profile ends up with.
pub fn tracked_packages(document: &ConfigDocument) -> BTreeSet<String> {
    document
        .profiles
        .keys()
        .filter_map(|name| resolve(document, name).ok())
        .flat_map(|resolved| resolved.packages)
        .collect()
}

/// Unit of work of the resolution walk.
enum Frame<'a> {
    /// Visit profile by name, scheduling its bases before its own items.
    Enter(&'a str),

    /// Append items of an already visited profile.
    Emit(&'a Profile),
}

#[derive(Default)]
struct Resolver {
    packages: Vec<String>,
    pre_install: Vec<String>,
    seen_packages: HashSet<String>,
    seen_tasks: HashSet<String>,
}

impl Resolver {
    fn emit(&mut self, profile: &Profile) {
        for package in profile.packages() {
            if self.seen_packages.insert(package.clone()) {
                self.packages.push(package.clone());
            }
        }

        for task in profile.pre_install() {
            if self.seen_tasks.insert(task.clone()) {
                self.pre_install.push(task.clone());
            }
        }
    }

    fn finish(self) -> ResolvedProfile {
        ResolvedProfile {
            packages: self.packages,
            pre_install: self.pre_install,
        }
    }
}

/// Profile resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Requested profile is not part of the document.
    #[error("profile '{name}' not found, available profiles: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },
}

/// Friendly result alias :3
type Result<T, E = ProfileError> = std::result::Result<T, E>;
