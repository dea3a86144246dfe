//! Execution-context configuration.

use nova_core::LuaVersion;

/// Default nesting limit for calls (LUAI_MAXCCALLS in the reference runtime).
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Default bound on `__index`/`__newindex`/`__call` chains.
pub const DEFAULT_MAX_META_CHAIN: usize = 2000;

/// Settings fixed when a [`crate::vm::Vm`] is created.
///
/// Built with chained setters:
///
/// ```
/// use nova_core::LuaVersion;
/// use nova_vm::options::VmOptions;
///
/// let opts = VmOptions::default()
///     .version(LuaVersion::Lua53)
///     .max_call_depth(64)
///     .capture_traceback(true);
/// assert_eq!(opts.max_call_depth, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmOptions {
    pub version: LuaVersion,
    pub max_call_depth: usize,
    pub max_meta_chain: usize,
    /// Number of calls allowed before execution is interrupted.
    pub call_budget: Option<u64>,
    /// Live-object ceiling; allocation past it is an out-of-memory fault.
    pub max_objects: Option<usize>,
    /// Attach a rendered traceback to script errors when they are raised.
    pub capture_traceback: bool,
    /// Append `[compatibility: Lua 5.x]` to displayed error messages.
    pub annotate_compatibility: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions {
            version: LuaVersion::Latest,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_meta_chain: DEFAULT_MAX_META_CHAIN,
            call_budget: None,
            max_objects: None,
            capture_traceback: false,
            annotate_compatibility: false,
        }
    }
}

impl VmOptions {
    pub fn version(mut self, version: LuaVersion) -> Self {
        self.version = version;
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn max_meta_chain(mut self, hops: usize) -> Self {
        self.max_meta_chain = hops;
        self
    }

    pub fn call_budget(mut self, calls: u64) -> Self {
        self.call_budget = Some(calls);
        self
    }

    pub fn max_objects(mut self, objects: usize) -> Self {
        self.max_objects = Some(objects);
        self
    }

    pub fn capture_traceback(mut self, on: bool) -> Self {
        self.capture_traceback = on;
        self
    }

    pub fn annotate_compatibility(mut self, on: bool) -> Self {
        self.annotate_compatibility = on;
        self
    }
}
