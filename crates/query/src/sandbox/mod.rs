//! Tier 2, part two: run candidate code against the dataset.
//!
//! Code is vetted by [`validate`] first, then executed in a fresh Lua 5.4
//! state with the standard library stripped, `df` bound to the dataset and a
//! handful of primitives. Execution is bounded by an instruction budget, a
//! wall-clock timeout and a memory limit. Every fault, including a panic,
//! comes back as a [`SandboxError`].

pub mod dataset_api;
pub mod lua_tokenizer;
pub mod validate;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{HookTriggers, Lua, Value as LuaValue, VmState};

use gridask_config::SandboxSettings;
use gridask_engine::Dataset;

use crate::outcome::ResultData;
use dataset_api::{install_primitives, lua_to_result, DatasetUserData};
pub use validate::{validate, Program, Statement, StatementKind, BUILTINS, RESULT_NAMES};

/// Maximum instructions per execution
pub const INSTRUCTION_LIMIT: i64 = 100_000_000;

/// How often the hook checks limits
const INSTRUCTION_HOOK_INTERVAL: u32 = 10_000;

/// Chunk name used in interpreter messages ("fragment:3: ...")
const CHUNK_NAME: &str = "=fragment";

/// Globals removed before any fragment runs.
const STRIPPED_GLOBALS: &[&str] = &[
    "os", "io", "debug", "package", "require", "load", "loadfile", "dofile",
    "collectgarbage", "string", "math", "table", "utf8", "coroutine", "print",
    "rawset", "rawget", "rawequal", "rawlen", "setmetatable", "getmetatable",
    "pcall", "xpcall", "error", "next", "pairs", "ipairs", "select", "type",
    "tostring", "tonumber", "assert", "warn", "_G",
];

/// Reference for the generated code's dialect, embedded in the synthesis
/// prompt.
pub const API_REFERENCE: &str = r#"AVAILABLE API:
df:head(n)                 first n rows (default 5)
df:tail(n)                 last n rows (default 5)
df:select("a", "b")        keep the named columns
df:filter({col = value})   rows where col equals value
df:filter({col = {min = a, max = b}})   inclusive range, either bound optional
df:filter({col = {v1, v2}})             col is one of the values
df:group_aggregate("group_col", "value_col", "mean")   mean, sum, count, min, max, median
df:sort_by("col", true)    sort, descending when the second argument is true
df:describe()              count, mean, std, min, quartiles, max of numeric columns
df:column_info()           name, type, non-null count, nulls, unique values
df:missing_report()        columns with missing values
df:corr()                  correlation matrix of numeric columns
df:value_counts("col", n)  most frequent values
df:nrows(), df:ncols(), df:columns()
df["col"] or df:col("col") a column; use df:col("col") when the column
                           shares a method name (head, filter, columns, ...), with:
  :mean() :sum() :median() :min() :max() :std() :count() :nunique()
  :unique() :values() :value_counts(n)
len(x)  sum(x)  min(...)  max(...)  round(x, digits)
"#;

#[derive(Debug, Clone, PartialEq)]
pub enum SandboxError {
    /// Static validation refused the code
    Rejected { line: usize, reason: String },
    Syntax(String),
    Runtime(String),
    Timeout { limit_ms: u64 },
    InstructionLimit { limit: i64 },
    MemoryLimit { limit_mb: usize },
    /// No result name was bound and there was no trailing expression
    NoResult,
    /// The final value has no tabular or scalar form
    UnsupportedResult(String),
    Setup(String),
    Panic(String),
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::Rejected { line, reason } => write!(f, "line {}: {}", line, reason),
            SandboxError::Syntax(msg) => write!(f, "syntax error: {}", msg),
            SandboxError::Runtime(msg) => f.write_str(msg),
            SandboxError::Timeout { limit_ms } => {
                write!(f, "execution timed out after {} ms", limit_ms)
            }
            SandboxError::InstructionLimit { limit } => {
                write!(f, "instruction limit exceeded ({} instructions)", limit)
            }
            SandboxError::MemoryLimit { limit_mb } => {
                write!(f, "memory limit exceeded ({} MiB)", limit_mb)
            }
            SandboxError::NoResult => f.write_str("code produced no result"),
            SandboxError::UnsupportedResult(kind) => {
                write!(f, "cannot turn a Lua {} into a result", kind)
            }
            SandboxError::Setup(msg) => write!(f, "sandbox setup failed: {}", msg),
            SandboxError::Panic(msg) => write!(f, "execution panicked: {}", msg),
        }
    }
}

impl std::error::Error for SandboxError {}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    pub timeout: Duration,
    pub memory_limit_bytes: usize,
    pub instruction_limit: i64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            memory_limit_bytes: 64 * 1024 * 1024,
            instruction_limit: INSTRUCTION_LIMIT,
        }
    }
}

impl SandboxConfig {
    pub fn from_settings(settings: &SandboxSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            memory_limit_bytes: settings.memory_limit_mb.saturating_mul(1024 * 1024),
            ..Self::default()
        }
    }
}

/// Flags the hook raises so errors can be classified afterwards.
#[derive(Default)]
struct LimitFlags {
    timed_out: AtomicBool,
    out_of_budget: AtomicBool,
}

/// Wall-clock budget of one execution. The hook checks it between
/// instructions; dataset methods check it on entry, since a handful of
/// calls can run for a long time without reaching the hook.
#[derive(Clone)]
pub(crate) struct Deadline {
    start: Instant,
    timeout: Duration,
    flags: Arc<LimitFlags>,
}

impl Deadline {
    fn new(timeout: Duration, flags: Arc<LimitFlags>) -> Self {
        Self { start: Instant::now(), timeout, flags }
    }

    fn check(&self) -> mlua::Result<()> {
        if self.start.elapsed() > self.timeout {
            self.flags.timed_out.store(true, Ordering::Relaxed);
            return Err(mlua::Error::RuntimeError(format!(
                "execution timeout ({} ms limit)",
                self.timeout.as_millis()
            )));
        }
        Ok(())
    }
}

/// Fails once the running execution is past its deadline. A state without
/// one (outside [`Sandbox::execute`]) never times out.
pub(crate) fn check_deadline(lua: &Lua) -> mlua::Result<()> {
    match lua.app_data_ref::<Deadline>() {
        Some(deadline) => deadline.check(),
        None => Ok(()),
    }
}

/// Executes code fragments. Holds no Lua state between calls.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Validate and run `code` with `df` bound to `dataset`.
    pub fn execute(&self, dataset: &Dataset, code: &str) -> Result<ResultData, SandboxError> {
        let program = validate(code)?;
        log::debug!("executing {} statement(s)", program.statements.len());

        let dataset = Arc::new(dataset.clone());
        match catch_unwind(AssertUnwindSafe(|| self.run(&program, dataset))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("sandbox panicked: {}", msg);
                Err(SandboxError::Panic(msg))
            }
        }
    }

    fn run(&self, program: &Program, dataset: Arc<Dataset>) -> Result<ResultData, SandboxError> {
        let flags = Arc::new(LimitFlags::default());
        let deadline = Deadline::new(self.config.timeout, flags.clone());

        let lua = self.prepare(dataset).map_err(|e| SandboxError::Setup(e.to_string()))?;
        lua.set_app_data(deadline.clone());
        self.install_hook(&lua, deadline.clone(), flags.clone());

        let body = program.body_chunk();
        if !body.is_empty() {
            lua.load(&body)
                .set_name(CHUNK_NAME)
                .exec()
                .map_err(|e| self.classify(e, &flags))?;
        }
        deadline.check().map_err(|e| self.classify(e, &flags))?;

        let globals = lua.globals();
        for name in RESULT_NAMES {
            let value: LuaValue = globals.get(*name).map_err(|e| self.classify(e, &flags))?;
            if !value.is_nil() {
                log::debug!("result bound to '{}'", name);
                return lua_to_result(value);
            }
        }

        match program.trailing_chunk() {
            Some(chunk) => {
                let value = lua
                    .load(&chunk)
                    .set_name(CHUNK_NAME)
                    .eval::<LuaValue>()
                    .map_err(|e| self.classify(e, &flags))?;
                deadline.check().map_err(|e| self.classify(e, &flags))?;
                lua_to_result(value)
            }
            None => Err(SandboxError::NoResult),
        }
    }

    /// Fresh state: limits set, globals stripped, `df` and primitives bound.
    fn prepare(&self, dataset: Arc<Dataset>) -> mlua::Result<Lua> {
        let lua = Lua::new();
        lua.set_memory_limit(self.config.memory_limit_bytes)?;

        // Strings would otherwise reach the string library through their metatable.
        lua.load("getmetatable('').__index = nil").set_name("=setup").exec()?;

        let globals = lua.globals();
        for name in STRIPPED_GLOBALS {
            globals.set(*name, LuaValue::Nil)?;
        }
        install_primitives(&lua)?;
        globals.set("df", DatasetUserData::new(dataset))?;
        Ok(lua)
    }

    fn install_hook(&self, lua: &Lua, deadline: Deadline, flags: Arc<LimitFlags>) {
        let limit = self.config.instruction_limit;
        let budget = Arc::new(AtomicI64::new(limit));
        let step = INSTRUCTION_HOOK_INTERVAL as i64;

        lua.set_hook(
            HookTriggers::new().every_nth_instruction(INSTRUCTION_HOOK_INTERVAL),
            move |_lua, _debug| {
                deadline.check()?;

                // Each call accounts for the `step` instructions just executed.
                let remaining = budget.fetch_sub(step, Ordering::Relaxed) - step;
                if remaining <= 0 {
                    flags.out_of_budget.store(true, Ordering::Relaxed);
                    Err(mlua::Error::RuntimeError(format!(
                        "instruction limit exceeded ({} instructions)",
                        limit
                    )))
                } else {
                    Ok(VmState::Continue)
                }
            },
        );
    }

    fn classify(&self, error: mlua::Error, flags: &LimitFlags) -> SandboxError {
        let classified = if flags.timed_out.load(Ordering::Relaxed) {
            SandboxError::Timeout { limit_ms: self.config.timeout.as_millis() as u64 }
        } else if flags.out_of_budget.load(Ordering::Relaxed) {
            SandboxError::InstructionLimit { limit: self.config.instruction_limit }
        } else {
            match root_cause(&error) {
                mlua::Error::MemoryError(_) => SandboxError::MemoryLimit {
                    limit_mb: self.config.memory_limit_bytes / (1024 * 1024),
                },
                mlua::Error::SyntaxError { message, .. } => SandboxError::Syntax(clean_message(message)),
                mlua::Error::RuntimeError(message) => SandboxError::Runtime(clean_message(message)),
                other => SandboxError::Runtime(clean_message(&other.to_string())),
            }
        };
        log::debug!("execution failed: {}", classified);
        classified
    }
}

fn root_cause(error: &mlua::Error) -> &mlua::Error {
    match error {
        mlua::Error::CallbackError { cause, .. } => root_cause(cause),
        other => other,
    }
}

/// "fragment:3: attempt to ..." reads as "line 3: attempt to ...".
fn clean_message(message: &str) -> String {
    let first = message.lines().next().unwrap_or_default();
    match first.strip_prefix("fragment:") {
        Some(rest) => format!("line {}", rest),
        None => first.to_string(),
    }
}
