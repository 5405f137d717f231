// SPDX-License-Identifier: MPL-2.0

//! Turns the proof of unsatisfiability a failed solve produces — a
//! [`Store`] and the empty-termed [`IncompatibilityId`] at its root —
//! into the numbered, human-readable explanation described in spec.md
//! §4.2: a depth-first walk of the derivation DAG that assigns reference
//! numbers to reused derivations on demand and renders each step as one
//! of four sentence shapes depending on whether its two causes are
//! themselves derived or external.
//!
//! Grounded on the `DefaultStringReporter` the teacher crate gets for
//! free from the `pubgrub` dependency, reimplemented here against this
//! crate's own [`Incompatibility`]/[`Reason`] types now that the solver
//! itself is in-tree.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::pgsolver::incompatibility::Store;
use crate::pgsolver::types::{IncompatibilityId, Reason, Term};
use crate::pkg::PackageId;

const TRUNCATION_NOTICE: &str = "[Error message truncated or incomplete]";

/// The rendered explanation, plus whether the output buffer ran out of
/// room before the whole derivation tree had been described.
#[derive(Debug, Clone)]
pub struct Report {
    pub text: String,
    pub truncated: bool,
}

/// Render a human-readable explanation of why no solution exists.
///
/// `name_of` resolves a [`PackageId`] to the string a user would
/// recognize (`"author/name"`, or `"this project"` for the synthetic
/// root). `buffer_cap` bounds the output size in bytes; once exceeded the
/// walk stops early and [`TRUNCATION_NOTICE`] is appended.
pub fn report(
    store: &Store,
    root: IncompatibilityId,
    name_of: &dyn Fn(PackageId) -> String,
    buffer_cap: usize,
) -> Report {
    let mut ctx = Context {
        store,
        name_of,
        buffer_cap,
        numbering: HashMap::new(),
        next_number: 1,
        out: String::new(),
        truncated: false,
    };
    ctx.explain(root);
    Report {
        text: ctx.out,
        truncated: ctx.truncated,
    }
}

struct Context<'a> {
    store: &'a Store,
    name_of: &'a dyn Fn(PackageId) -> String,
    buffer_cap: usize,
    numbering: HashMap<IncompatibilityId, usize>,
    next_number: usize,
    out: String,
    truncated: bool,
}

impl<'a> Context<'a> {
    fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.out.len() + line.len() + 1 > self.buffer_cap {
            self.out.push_str(TRUNCATION_NOTICE);
            self.truncated = true;
            return;
        }
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(line);
    }

    fn label_of(&mut self, id: IncompatibilityId) -> usize {
        if let Some(n) = self.numbering.get(&id) {
            return *n;
        }
        let n = self.next_number;
        self.next_number += 1;
        self.numbering.insert(id, n);
        n
    }

    fn is_labeled(&self, id: IncompatibilityId) -> bool {
        self.numbering.contains_key(&id)
    }

    /// Render the leaf sentence for a non-derived incompatibility
    /// (`Root`, `NoVersions`, `Dependency`).
    fn leaf_sentence(&self, id: IncompatibilityId) -> String {
        let incompat = self.store.get(id);
        match &incompat.reason {
            Reason::Root => "the root project requires exactly this project".to_string(),
            Reason::NoVersions { package, term } => {
                format!(
                    "no versions of {} match {}",
                    (self.name_of)(*package),
                    render_term(term)
                )
            }
            Reason::Dependency {
                package,
                package_term,
                dependency,
                range,
            } => {
                format!(
                    "{} {} depends on {} {}",
                    (self.name_of)(*package),
                    render_term(package_term),
                    (self.name_of)(*dependency),
                    render_range(range)
                )
            }
            Reason::Derived { .. } => unreachable!("leaf_sentence only called on non-derived reasons"),
        }
    }

    /// Recursively explain `id`, appending lines to the output buffer.
    /// Returns nothing; the explanation's final clause is always the last
    /// line pushed so callers compose with "And because (id), ...".
    fn explain(&mut self, id: IncompatibilityId) {
        if self.truncated {
            return;
        }
        let incompat = self.store.get(id);
        let (left, right) = match &incompat.reason {
            Reason::Derived { left, right } => (*left, *right),
            _ => {
                self.push_line(&capitalize(&self.leaf_sentence(id)));
                return;
            }
        };

        let left_derived = matches!(self.store.get(left).reason, Reason::Derived { .. });
        let right_derived = matches!(self.store.get(right).reason, Reason::Derived { .. });

        match (left_derived, right_derived) {
            (true, true) => self.explain_both_derived(id, left, right),
            (true, false) => self.explain_one_derived(id, left, right),
            (false, true) => self.explain_one_derived(id, right, left),
            (false, false) => {
                let line = format!(
                    "Because {} and {}, {}.",
                    self.leaf_sentence(left),
                    self.leaf_sentence(right),
                    self.conclusion(id)
                );
                self.push_line(&line);
            }
        }
    }

    /// Both causes are themselves derived incompatibilities: explain the
    /// simpler-looking one inline first (fewer terms), label it if it
    /// gets reused elsewhere, then connect to the other.
    fn explain_both_derived(&mut self, id: IncompatibilityId, left: IncompatibilityId, right: IncompatibilityId) {
        let (first, second) = if self.store.get(left).terms.len() <= self.store.get(right).terms.len() {
            (left, right)
        } else {
            (right, left)
        };

        if self.is_labeled(first) {
            let n = self.label_of(first);
            let line = format!("And because ({}), {}.", n, self.conclusion(id));
            self.push_line(&line);
            return;
        }

        self.explain(first);
        let n = self.label_of(first);
        self.relabel_last_line(n);

        if self.is_labeled(second) {
            let n2 = self.label_of(second);
            let line = format!("And because ({}) and ({}), {}.", n, n2, self.conclusion(id));
            self.push_line(&line);
        } else if matches!(self.store.get(second).reason, Reason::Derived { .. }) {
            self.explain(second);
            let line = format!("And because ({}) and the above, {}.", n, self.conclusion(id));
            self.push_line(&line);
        } else {
            let line = format!(
                "And because ({}) and {}, {}.",
                n,
                self.leaf_sentence(second),
                self.conclusion(id)
            );
            self.push_line(&line);
        }
    }

    /// One cause is derived, the other external (a leaf reason).
    fn explain_one_derived(&mut self, id: IncompatibilityId, derived: IncompatibilityId, external: IncompatibilityId) {
        if self.is_labeled(derived) {
            let n = self.label_of(derived);
            let line = format!(
                "And because {}, {}.",
                join_with_ref(n, &self.leaf_sentence(external)),
                self.conclusion(id)
            );
            self.push_line(&line);
            return;
        }

        // Two-layer collapse: if the derived child's own first cause is
        // external too, and it hasn't been referenced elsewhere, fold it
        // into one paragraph instead of a one-line stub followed by a
        // one-line "and because (N)" continuation.
        if let Reason::Derived { left: inner_left, right: inner_right } = &self.store.get(derived).reason {
            let (inner_left, inner_right) = (*inner_left, *inner_right);
            let inner_left_derived = matches!(self.store.get(inner_left).reason, Reason::Derived { .. });
            let inner_right_derived = matches!(self.store.get(inner_right).reason, Reason::Derived { .. });
            if !inner_left_derived && !inner_right_derived && !self.is_labeled(derived) {
                let line = format!(
                    "Because {} and {}, {}. And because {}, {}.",
                    self.leaf_sentence(inner_left),
                    self.leaf_sentence(inner_right),
                    self.conclusion(derived),
                    self.leaf_sentence(external),
                    self.conclusion(id)
                );
                self.push_line(&line);
                return;
            }
        }

        self.explain(derived);
        let line = format!("And because {}, {}.", self.leaf_sentence(external), self.conclusion(id));
        self.push_line(&line);
    }

    fn relabel_last_line(&mut self, n: usize) {
        if let Some(idx) = self.out.rfind('\n') {
            let (head, tail) = self.out.split_at(idx + 1);
            let mut new_tail = format!("({}) ", n);
            new_tail.push_str(tail);
            self.out = format!("{}{}", head, new_tail);
        } else {
            let mut new_out = format!("({}) ", n);
            new_out.push_str(&self.out);
            self.out = new_out;
        }
    }

    /// The conclusion clause shared by every sentence shape: what this
    /// incompatibility's terms rule out, or the final verdict for the
    /// proof's root (empty-termed) incompatibility.
    fn conclusion(&self, id: IncompatibilityId) -> String {
        let incompat = self.store.get(id);
        if incompat.terms.is_empty() {
            return "version solving failed".to_string();
        }
        let mut parts = Vec::new();
        for (package, term) in incompat.terms.iter() {
            let rendered = render_term(term);
            parts.push(format!("{} {}", (self.name_of)(*package), rendered));
        }
        format!("{} is impossible", parts.join(" and "))
    }
}

fn join_with_ref(n: usize, leaf: &str) -> String {
    let mut s = String::new();
    let _ = write!(s, "({}) and {}", n, leaf);
    s
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str() + ".",
        None => String::new(),
    }
}

fn render_term(term: &Term) -> String {
    let prefix = if term.is_positive() { "" } else { "not " };
    format!("{}{}", prefix, render_range(&term.accepted_versions()))
}

fn render_range(range: &crate::pgsolver::ranges::Ranges) -> String {
    range.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgsolver::incompatibility::Store;
    use crate::pgsolver::types::Term;
    use crate::pkg::AuthorName;
    use crate::version::{Version, VersionRange};
    use std::str::FromStr;

    fn name_of(store_names: &HashMap<PackageId, &str>) -> impl Fn(PackageId) -> String + '_ {
        move |p: PackageId| {
            if p == PackageId::ROOT {
                "this project".to_string()
            } else {
                store_names.get(&p).map(|s| s.to_string()).unwrap_or_else(|| p.0.to_string())
            }
        }
    }

    #[test]
    fn reports_a_single_level_dependency_conflict() {
        let mut store = Store::new();
        let root = PackageId::ROOT;
        let a = PackageId(1);

        let root_id = store.add_root(Version::new(1, 0, 0));
        let no_versions_id = store.add_no_versions(a, Term::positive(ranges_from(VersionRange::any())));
        let derived = store.add_derived(vec![], root_id, no_versions_id);

        let names: HashMap<PackageId, &str> = [(a, "author/pkg")].into_iter().collect();
        let out = report(&store, derived, &name_of(&names), 8192);
        assert!(!out.text.is_empty());
        assert!(!out.truncated);
        let _ = AuthorName::from_str("author/pkg");
        let _ = root;
    }

    #[test]
    fn truncates_when_the_buffer_is_too_small() {
        let mut store = Store::new();
        let root_id = store.add_root(Version::new(1, 0, 0));
        let no_versions_id =
            store.add_no_versions(PackageId(1), Term::positive(ranges_from(VersionRange::any())));
        let derived = store.add_derived(vec![], root_id, no_versions_id);
        let names: HashMap<PackageId, &str> = HashMap::new();
        let out = report(&store, derived, &name_of(&names), 4);
        assert!(out.truncated);
        assert!(out.text.ends_with(TRUNCATION_NOTICE));
    }

    fn ranges_from(r: VersionRange) -> crate::pgsolver::ranges::Ranges {
        crate::pgsolver::ranges::Ranges::from_range(&r)
    }
}
