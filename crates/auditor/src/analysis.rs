//! Per-unit detection of enforcement idioms.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use regex::Regex;
use rolegate_domain::{MigrationState, PermissionKey};
use serde::Serialize;

use crate::AuditConfig;
use crate::source::{call_arguments, mask_strings, string_literal, strip_comments};

/// HTTP methods a unit may export, in report order.
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Directory segments that never name a resource.
const NEUTRAL_SEGMENTS: [&str; 5] = ["api", "app", "src", "pages", "routes"];

/// Which enforcement path a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Gateway wrapper.
    Gateway,
    /// Direct policy evaluator call.
    Evaluator,
}

/// One enforcement call found in a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnforcementCall {
    /// Called function name.
    pub function: String,
    /// Gateway or evaluator.
    pub kind: CallKind,
    /// Literal `(resource, action)` pairs passed to the call.
    pub pairs: Vec<PermissionKey>,
    /// 1-based line of the call.
    pub line: usize,
}

impl Display for EnforcementCall {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.pairs.is_empty() {
            return write!(formatter, "{}(<dynamic>)", self.function);
        }

        let pairs = self
            .pairs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(formatter, "{}({pairs})", self.function)
    }
}

/// Comparison operator of a legacy privilege check, read as `field <op> threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOperator {
    /// `<`
    #[serde(rename = "<")]
    LessThan,
    /// `<=`
    #[serde(rename = "<=")]
    LessOrEqual,
    /// `>`
    #[serde(rename = ">")]
    GreaterThan,
    /// `>=`
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// `==` or `===`
    #[serde(rename = "==")]
    Equal,
    /// `!=` or `!==`
    #[serde(rename = "!=")]
    NotEqual,
}

impl ComparisonOperator {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessOrEqual),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterOrEqual),
            "==" | "===" => Some(Self::Equal),
            "!=" | "!==" => Some(Self::NotEqual),
            _ => None,
        }
    }

    /// Mirrors the operator for `threshold <op> field` comparisons.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::LessThan => Self::GreaterThan,
            Self::LessOrEqual => Self::GreaterOrEqual,
            Self::GreaterThan => Self::LessThan,
            Self::GreaterOrEqual => Self::LessOrEqual,
            Self::Equal => Self::Equal,
            Self::NotEqual => Self::NotEqual,
        }
    }

    /// Returns the operator symbol.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

/// Numeric comparison against the legacy privilege level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyCheck {
    /// Compared field name.
    pub field: String,
    /// Operator, normalized so the field is on the left.
    pub operator: ComparisonOperator,
    /// Compared threshold.
    pub threshold: i64,
    /// 1-based line of the comparison.
    pub line: usize,
}

impl Display for LegacyCheck {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{} {} {} (line {})",
            self.field,
            self.operator.as_str(),
            self.threshold,
            self.line
        )
    }
}

/// Finding attached to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueTag {
    /// Exported methods with no enforcement at all.
    NoProtection,
    /// Only the legacy privilege level guards the unit.
    HardcodedPrivilegeCheck,
    /// An enforcement pair is missing from the permission catalog.
    UnknownPermission,
    /// Enforcement calls exist but none names a literal pair.
    DynamicPermission,
}

impl IssueTag {
    /// Returns the stable tag label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoProtection => "NO_PROTECTION",
            Self::HardcodedPrivilegeCheck => "HARDCODED_PRIVILEGE_CHECK",
            Self::UnknownPermission => "UNKNOWN_PERMISSION",
            Self::DynamicPermission => "DYNAMIC_PERMISSION",
        }
    }
}

/// Audit result for one protected-operation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerRecord {
    /// Unit path relative to the source root, `/`-separated.
    pub path: String,
    /// Resource the unit is grouped under.
    pub resource: String,
    /// Exported HTTP methods.
    pub http_methods: Vec<String>,
    /// Gateway and evaluator calls.
    pub enforcement_calls: Vec<EnforcementCall>,
    /// Legacy privilege comparisons.
    pub legacy_checks: Vec<LegacyCheck>,
    /// Migration state derived from the detected idioms.
    pub classification: MigrationState,
    /// Whether the unit sits under an allow-listed segment.
    pub allow_listed: bool,
    /// Findings, empty for a clean unit.
    pub issues: Vec<IssueTag>,
}

impl HandlerRecord {
    /// Returns whether the unit carries no findings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Compiled detectors for one audit run.
#[derive(Debug)]
pub(crate) struct UnitAnalyzer {
    config: AuditConfig,
    catalog: BTreeSet<PermissionKey>,
    catalog_resources: BTreeSet<String>,
    call: Regex,
    legacy_forward: Regex,
    legacy_reverse: Regex,
    export_function: Regex,
    export_binding: Regex,
    export_list: Regex,
    annotation: Regex,
    object_forward: Regex,
    object_reverse: Regex,
    pair_literal: Regex,
}

impl UnitAnalyzer {
    pub(crate) fn new(
        config: AuditConfig,
        catalog: BTreeSet<PermissionKey>,
    ) -> Result<Self, regex::Error> {
        let functions = alternation(
            config
                .enforcement_functions
                .iter()
                .chain(config.evaluator_functions.iter()),
        );
        let fields = alternation(config.legacy_fields.iter());
        let methods = HTTP_METHODS.join("|");
        let operator = r"(===|!==|==|!=|<=|>=|<|>)";
        let quoted = r#"["'`]([A-Za-z][\w-]*)["'`]"#;

        Ok(Self {
            catalog_resources: catalog
                .iter()
                .map(|key| key.resource().to_owned())
                .collect(),
            call: Regex::new(&format!(r"\b({functions})\s*\("))?,
            legacy_forward: Regex::new(&format!(r"\b({fields})\b\s*{operator}\s*(-?\d+)\b"))?,
            legacy_reverse: Regex::new(&format!(
                r"(?:^|[^\w.])(-?\d+)\s*{operator}\s*(?:[\w$]+\??\.)*({fields})\b"
            ))?,
            export_function: Regex::new(&format!(
                r"\bexport\s+(?:async\s+)?function\s*\*?\s*({methods})\b"
            ))?,
            export_binding: Regex::new(&format!(r"\bexport\s+(?:const|let|var)\s+({methods})\b"))?,
            export_list: Regex::new(r"\bexport\s*(?:(?:const|let|var)\s*)?\{([^}]*)\}")?,
            annotation: Regex::new(r"authz-resource:\s*([A-Za-z][\w-]*)")?,
            object_forward: Regex::new(&format!(
                r"resource\s*:\s*{quoted}\s*,\s*action\s*:\s*{quoted}"
            ))?,
            object_reverse: Regex::new(&format!(
                r"action\s*:\s*{quoted}\s*,\s*resource\s*:\s*{quoted}"
            ))?,
            pair_literal: Regex::new(r#"["'`]([A-Za-z][\w-]*):([A-Za-z][\w-]*)["'`]"#)?,
            config,
            catalog,
        })
    }

    pub(crate) fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub(crate) fn catalog_size(&self) -> usize {
        self.catalog.len()
    }

    pub(crate) fn analyze(&self, path: &str, source: &str) -> HandlerRecord {
        let code = strip_comments(source);
        let masked = mask_strings(&code);
        let directories = directory_segments(path);

        let http_methods = self.exported_methods(&masked);
        let enforcement_calls = self.enforcement_calls(&code, &masked);
        let legacy_checks = self.legacy_checks(&masked);
        let allow_listed = directories.iter().any(|segment| {
            let segment = segment.trim_matches(|c| c == '(' || c == ')').to_ascii_lowercase();
            self.config
                .allow_list_segments
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&segment))
        });

        let delegates = enforcement_calls.iter().any(|call| !call.pairs.is_empty());
        let dynamic_only = !delegates && !enforcement_calls.is_empty();

        let classification = if delegates {
            MigrationState::Migrated
        } else if !legacy_checks.is_empty() {
            MigrationState::LegacyOnly
        } else {
            MigrationState::Unprotected
        };

        let mut issues = Vec::new();
        match classification {
            MigrationState::LegacyOnly => issues.push(IssueTag::HardcodedPrivilegeCheck),
            MigrationState::Unprotected
                if !dynamic_only && !http_methods.is_empty() && !allow_listed =>
            {
                issues.push(IssueTag::NoProtection);
            }
            _ => {}
        }
        if dynamic_only && !allow_listed {
            issues.push(IssueTag::DynamicPermission);
        }
        if !self.catalog.is_empty()
            && enforcement_calls
                .iter()
                .flat_map(|call| call.pairs.iter())
                .any(|pair| !self.catalog.contains(pair))
        {
            issues.push(IssueTag::UnknownPermission);
        }

        HandlerRecord {
            path: path.to_owned(),
            resource: self.resource_for(source, &directories),
            http_methods,
            enforcement_calls,
            legacy_checks,
            classification,
            allow_listed,
            issues,
        }
    }

    fn exported_methods(&self, code: &str) -> Vec<String> {
        let mut found = BTreeSet::new();

        for captures in self
            .export_function
            .captures_iter(code)
            .chain(self.export_binding.captures_iter(code))
        {
            found.insert(captures[1].to_owned());
        }

        for captures in self.export_list.captures_iter(code) {
            for item in captures[1].split(',') {
                let exported = item.rsplit(" as ").next().unwrap_or(item).trim();
                let exported = exported.split(':').next().unwrap_or(exported).trim();
                if HTTP_METHODS.contains(&exported) {
                    found.insert(exported.to_owned());
                }
            }
        }

        HTTP_METHODS
            .iter()
            .filter(|method| found.contains(**method))
            .map(|method| (*method).to_owned())
            .collect()
    }

    /// Finds calls in `masked` and reads their arguments from `code` at the same offsets.
    fn enforcement_calls(&self, code: &str, masked: &str) -> Vec<EnforcementCall> {
        let mut calls = Vec::new();

        for captures in self.call.captures_iter(masked) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if masked[..whole.start()].trim_end().ends_with("function") {
                continue;
            }

            let open_paren = whole.end() - 1;
            let pairs = call_arguments(code, open_paren)
                .map(|arguments| self.literal_pairs(&arguments))
                .unwrap_or_default();
            let kind = if self
                .config
                .evaluator_functions
                .iter()
                .any(|function| function == name.as_str())
            {
                CallKind::Evaluator
            } else {
                CallKind::Gateway
            };

            calls.push(EnforcementCall {
                function: name.as_str().to_owned(),
                kind,
                pairs,
                line: line_of(code, whole.start()),
            });
        }

        calls
    }

    /// Reads pairs from adjacent string arguments, pair objects or `"resource:action"` strings.
    fn literal_pairs(&self, arguments: &[&str]) -> Vec<PermissionKey> {
        let literals = arguments
            .iter()
            .map(|argument| string_literal(argument))
            .collect::<Vec<_>>();

        for window in literals.windows(2) {
            if let [Some(resource), Some(action)] = window
                && !resource.contains(':')
                && !action.contains(':')
                && let Ok(key) = PermissionKey::new(*resource, *action)
            {
                return vec![key];
            }
        }

        let mut pairs = BTreeSet::new();
        for argument in arguments
            .iter()
            .filter(|argument| argument.starts_with(['[', '{', '"', '\'', '`']))
        {
            for captures in self.object_forward.captures_iter(argument) {
                pairs.extend(PermissionKey::new(&captures[1], &captures[2]).ok());
            }
            for captures in self.object_reverse.captures_iter(argument) {
                pairs.extend(PermissionKey::new(&captures[2], &captures[1]).ok());
            }
            for captures in self.pair_literal.captures_iter(argument) {
                pairs.extend(PermissionKey::new(&captures[1], &captures[2]).ok());
            }
        }

        pairs.into_iter().collect()
    }

    fn legacy_checks(&self, code: &str) -> Vec<LegacyCheck> {
        let mut checks = Vec::new();

        for captures in self.legacy_forward.captures_iter(code) {
            let (Some(whole), Some(operator), Ok(threshold)) = (
                captures.get(0),
                ComparisonOperator::parse(&captures[2]),
                captures[3].parse::<i64>(),
            ) else {
                continue;
            };
            checks.push(LegacyCheck {
                field: captures[1].to_owned(),
                operator,
                threshold,
                line: line_of(code, whole.start()),
            });
        }

        for captures in self.legacy_reverse.captures_iter(code) {
            let (Some(number), Some(operator), Ok(threshold)) = (
                captures.get(1),
                ComparisonOperator::parse(&captures[2]),
                captures[1].parse::<i64>(),
            ) else {
                continue;
            };
            checks.push(LegacyCheck {
                field: captures[3].to_owned(),
                operator: operator.flipped(),
                threshold,
                line: line_of(code, number.start()),
            });
        }

        checks.sort_by_key(|check| check.line);
        checks
    }

    /// Explicit annotation first, then the last segment naming a catalog resource,
    /// then the first meaningful segment.
    fn resource_for(&self, source: &str, directories: &[&str]) -> String {
        if let Some(captures) = self.annotation.captures(source) {
            return captures[1].to_ascii_lowercase();
        }

        let meaningful = directories
            .iter()
            .filter(|segment| {
                !segment.starts_with('(')
                    && !segment.starts_with('[')
                    && !segment.starts_with('@')
                    && !NEUTRAL_SEGMENTS.contains(&segment.to_ascii_lowercase().as_str())
            })
            .map(|segment| segment.to_ascii_lowercase().replace('-', "_"))
            .collect::<Vec<_>>();

        meaningful
            .iter()
            .rev()
            .find(|segment| self.catalog_resources.contains(*segment))
            .or_else(|| meaningful.first())
            .cloned()
            .unwrap_or_else(|| "(root)".to_owned())
    }
}

fn alternation<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|")
}

fn directory_segments(path: &str) -> Vec<&str> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty()).collect::<Vec<_>>();
    segments.pop();
    segments
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
