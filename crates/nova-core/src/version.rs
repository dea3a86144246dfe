//! Compatibility gate: which features exist, and which variant of each
//! historically divergent rule applies, for a targeted Lua revision.
//!
//! Every version-dependent decision in the runtime goes through [`gate`].
//! Supporting a new revision means adding a variant and extending the rows in
//! `RULES`; consumers never compare versions themselves.

use crate::error::CoreError;
use crate::string::LuaString;
use crate::value::Value;
use std::fmt;
use Behavior::*;
use LuaVersion::{Lua51, Lua52, Lua53, Lua54, Lua55};

/// A targeted Lua language revision.
///
/// The derived ordering is only meaningful between concrete revisions;
/// `Latest` is an alias and must go through [`LuaVersion::resolve`] first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LuaVersion {
    Lua51,
    Lua52,
    Lua53,
    Lua54,
    Lua55,
    #[default]
    Latest,
}

impl LuaVersion {
    pub const ALL: [LuaVersion; 5] = [
        LuaVersion::Lua51,
        LuaVersion::Lua52,
        LuaVersion::Lua53,
        LuaVersion::Lua54,
        LuaVersion::Lua55,
    ];

    /// Map the `Latest` alias to the revision it currently stands for.
    pub fn resolve(self) -> LuaVersion {
        match self {
            LuaVersion::Latest => LuaVersion::Lua54,
            v => v,
        }
    }

    /// Minor version number (`1` for 5.1).
    pub fn minor(self) -> u8 {
        match self.resolve() {
            LuaVersion::Lua51 => 1,
            LuaVersion::Lua52 => 2,
            LuaVersion::Lua53 => 3,
            LuaVersion::Lua54 | LuaVersion::Latest => 4,
            LuaVersion::Lua55 => 5,
        }
    }

    /// Parse `"5.3"`, `"lua53"`, `"Lua 5.3"` or `"latest"`.
    pub fn parse(text: &str) -> Option<LuaVersion> {
        let lowered = text.trim().to_ascii_lowercase();
        let digits: String = lowered
            .trim_start_matches("lua")
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect();
        match digits.as_str() {
            "latest" => Some(LuaVersion::Latest),
            "51" => Some(LuaVersion::Lua51),
            "52" => Some(LuaVersion::Lua52),
            "53" => Some(LuaVersion::Lua53),
            "54" => Some(LuaVersion::Lua54),
            "55" => Some(LuaVersion::Lua55),
            _ => None,
        }
    }
}

impl fmt::Display for LuaVersion {
    /// Renders as `_VERSION` does: `Lua 5.4`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lua 5.{}", self.minor())
    }
}

/// A version-dependent capability or rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Observable integer/float number subkinds (`math.type`, `math.tointeger`).
    IntegerSubtype,
    /// Native integer bitwise operators.
    IntegerBitOps,
    /// The `bit32` library.
    Bit32Library,
    /// Per-function mutable environments (`getfenv`/`setfenv`).
    FunctionEnvironments,
    /// The implicit `_ENV` upvalue of loaded chunks.
    EnvUpvalue,
    /// How a numeric position argument is coerced to an integer.
    PositionCoercion,
    /// Shape of a process-execution result.
    ProcessStatus,
    /// Tables honour `__len` (before this only userdata did).
    LenMetamethodOnTables,
    /// `a <= b` may be answered by `not (b < a)` when `__le` is absent.
    LeFallbackToLt,
    /// `__eq`/`__lt`/`__le` only fire when both operands carry the same handler.
    SameHandlerComparison,
    /// Global `unpack`.
    GlobalUnpack,
    /// `table.pack` and `table.unpack`.
    TablePackUnpack,
    /// `table.move`.
    TableMove,
    /// The table library and `ipairs` read and write through metamethods.
    MetamethodAwareTableLib,
    /// `table.insert`/`table.remove` reject positions outside `1..=#t+1`.
    PositionBoundsCheck,
    /// `debug.upvalueid` and `debug.upvaluejoin`.
    UpvalueIdentity,
    /// Global `rawlen`.
    RawLen,
    /// `xpcall` forwards extra arguments to the callee.
    XpcallArguments,
    /// `__name` in a metatable names the type in messages and `tostring`.
    MetatableName,
    /// `pairs` defers to a `__pairs` metamethod.
    PairsMetamethod,
    /// How an integral float is rendered as text.
    IntegralFloatFormat,
}

impl Feature {
    /// User-facing name, used in `Unavailable` messages.
    pub fn name(self) -> &'static str {
        match self {
            Feature::IntegerSubtype => "integer subtype",
            Feature::IntegerBitOps => "integer bitwise operators",
            Feature::Bit32Library => "bit32",
            Feature::FunctionEnvironments => "getfenv/setfenv",
            Feature::EnvUpvalue => "_ENV",
            Feature::PositionCoercion => "position coercion",
            Feature::ProcessStatus => "process status",
            Feature::LenMetamethodOnTables => "__len on tables",
            Feature::LeFallbackToLt => "__le fallback to __lt",
            Feature::SameHandlerComparison => "same-handler comparison",
            Feature::GlobalUnpack => "unpack",
            Feature::TablePackUnpack => "table.pack/table.unpack",
            Feature::TableMove => "table.move",
            Feature::MetamethodAwareTableLib => "metamethod-aware table library",
            Feature::PositionBoundsCheck => "position bounds check",
            Feature::UpvalueIdentity => "debug.upvalueid/debug.upvaluejoin",
            Feature::RawLen => "rawlen",
            Feature::XpcallArguments => "xpcall arguments",
            Feature::MetatableName => "__name",
            Feature::PairsMetamethod => "__pairs",
            Feature::IntegralFloatFormat => "float formatting",
        }
    }
}

/// The concrete behaviour the gate selects for an available feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    /// The feature exists with its single behaviour.
    Enabled,
    /// Non-integral float positions truncate toward zero.
    Truncate,
    /// Non-integral float positions are rejected.
    Strict,
    /// Process results are a single numeric status.
    StatusCode,
    /// Process results are `(true|nil, "exit"|"signal", code)`.
    StatusTriple,
    /// Integral floats print without a fractional part (`1`).
    BareIntegral,
    /// Integral floats print with a `.0` suffix (`1.0`).
    SuffixedIntegral,
}

struct Rule {
    feature: Feature,
    since: LuaVersion,
    until: LuaVersion,
    behavior: Behavior,
}

const fn rule(feature: Feature, since: LuaVersion, until: LuaVersion, behavior: Behavior) -> Rule {
    Rule {
        feature,
        since,
        until,
        behavior,
    }
}

const RULES: &[Rule] = &[
    rule(Feature::IntegerSubtype, Lua53, Lua55, Enabled),
    rule(Feature::IntegerBitOps, Lua53, Lua55, Enabled),
    rule(Feature::Bit32Library, Lua52, Lua52, Enabled),
    rule(Feature::FunctionEnvironments, Lua51, Lua51, Enabled),
    rule(Feature::EnvUpvalue, Lua52, Lua55, Enabled),
    rule(Feature::PositionCoercion, Lua51, Lua52, Truncate),
    rule(Feature::PositionCoercion, Lua53, Lua55, Strict),
    rule(Feature::ProcessStatus, Lua51, Lua51, StatusCode),
    rule(Feature::ProcessStatus, Lua52, Lua55, StatusTriple),
    rule(Feature::LenMetamethodOnTables, Lua52, Lua55, Enabled),
    rule(Feature::LeFallbackToLt, Lua51, Lua53, Enabled),
    rule(Feature::SameHandlerComparison, Lua51, Lua51, Enabled),
    rule(Feature::GlobalUnpack, Lua51, Lua51, Enabled),
    rule(Feature::TablePackUnpack, Lua52, Lua55, Enabled),
    rule(Feature::TableMove, Lua53, Lua55, Enabled),
    rule(Feature::MetamethodAwareTableLib, Lua53, Lua55, Enabled),
    rule(Feature::PositionBoundsCheck, Lua52, Lua55, Enabled),
    rule(Feature::UpvalueIdentity, Lua52, Lua55, Enabled),
    rule(Feature::RawLen, Lua52, Lua55, Enabled),
    rule(Feature::XpcallArguments, Lua52, Lua55, Enabled),
    rule(Feature::MetatableName, Lua53, Lua55, Enabled),
    rule(Feature::PairsMetamethod, Lua52, Lua55, Enabled),
    rule(Feature::IntegralFloatFormat, Lua51, Lua52, BareIntegral),
    rule(Feature::IntegralFloatFormat, Lua53, Lua55, SuffixedIntegral),
];

/// Resolve `(version, feature)` to a behaviour, or `None` when the feature
/// does not exist in that revision.
pub fn gate(version: LuaVersion, feature: Feature) -> Option<Behavior> {
    let v = version.resolve();
    RULES
        .iter()
        .find(|r| r.feature == feature && r.since <= v && v <= r.until)
        .map(|r| r.behavior)
}

/// The gate bound to one execution context's selected version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Compat {
    version: LuaVersion,
}

impl Compat {
    pub fn new(version: LuaVersion) -> Self {
        Compat { version }
    }

    /// The version as configured (possibly `Latest`).
    pub fn version(&self) -> LuaVersion {
        self.version
    }

    pub fn behavior(&self, feature: Feature) -> Option<Behavior> {
        gate(self.version, feature)
    }

    pub fn allows(&self, feature: Feature) -> bool {
        self.behavior(feature).is_some()
    }

    /// Like [`Compat::behavior`], but a missing feature is an `Unavailable` fault.
    pub fn require(&self, feature: Feature) -> Result<Behavior, CoreError> {
        self.behavior(feature).ok_or(CoreError::Unavailable {
            feature: feature.name(),
            version: self.version.resolve(),
        })
    }

    /// Whether non-integral float positions must be rejected.
    pub fn strict_positions(&self) -> bool {
        self.behavior(Feature::PositionCoercion) == Some(Strict)
    }

    /// Results of a finished child process whose raw status is `code`.
    /// Negative codes denote termination by signal `-code`.
    pub fn process_status(&self, code: i64) -> Vec<Value> {
        match self.behavior(Feature::ProcessStatus) {
            Some(StatusCode) | None => vec![Value::Integer(code)],
            Some(_) => {
                let (tag, code) = if code < 0 {
                    ("signal", -code)
                } else {
                    ("exit", code)
                };
                let ok = if code == 0 && tag == "exit" {
                    Value::Boolean(true)
                } else {
                    Value::Nil
                };
                vec![ok, Value::String(LuaString::from(tag)), Value::Integer(code)]
            }
        }
    }
}
