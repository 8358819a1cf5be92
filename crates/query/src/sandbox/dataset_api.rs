// Dataset and column handles exposed to fragments as `df` and `df["col"]`,
// plus the free primitives (len, sum, min, max, round).
//
// Every engine error becomes a Lua runtime error carrying the engine's
// message; the executor turns it back into a SandboxError.

use std::sync::Arc;

use mlua::{
    AnyUserData, Lua, MetaMethod, Result as LuaResult, Table, UserData, UserDataMethods,
    Value as LuaValue, Variadic,
};

use gridask_engine::stats::{mean, median, round_to, std_dev};
use gridask_engine::value::format_float;
use gridask_engine::{AggFunc, Column, Condition, Conditions, Dataset, EngineError, Value};

use super::{check_deadline, SandboxError};
use crate::outcome::ResultData;

/// Rows returned by `head()`/`tail()` without an argument.
pub const DEFAULT_HEAD_ROWS: usize = 5;

fn engine_err(e: EngineError) -> mlua::Error {
    mlua::Error::RuntimeError(e.to_string())
}

fn runtime(msg: impl Into<String>) -> mlua::Error {
    mlua::Error::RuntimeError(msg.into())
}

// ============================================================================
// Conversions
// ============================================================================

/// Engine value to Lua. Nulls become nil.
pub fn value_to_lua(lua: &Lua, value: &Value) -> LuaResult<LuaValue> {
    Ok(match value {
        Value::Null => LuaValue::Nil,
        Value::Int(i) => LuaValue::Integer(*i),
        Value::Float(f) if f.is_nan() => LuaValue::Nil,
        Value::Float(f) => LuaValue::Number(*f),
        Value::Bool(b) => LuaValue::Boolean(*b),
        Value::DateTime(_) => LuaValue::String(lua.create_string(value.to_string())?),
        Value::Text(s) => LuaValue::String(lua.create_string(s)?),
    })
}

/// Lua scalar to engine value.
pub fn lua_to_value(value: &LuaValue) -> LuaResult<Value> {
    match value {
        LuaValue::Nil => Ok(Value::Null),
        LuaValue::Boolean(b) => Ok(Value::Bool(*b)),
        LuaValue::Integer(i) => Ok(Value::Int(*i)),
        LuaValue::Number(n) => Ok(Value::Float(*n)),
        LuaValue::String(s) => Ok(Value::Text(s.to_str()?.to_string())),
        other => Err(runtime(format!("expected a number, string or boolean, got {}", other.type_name()))),
    }
}

fn values_table(lua: &Lua, values: &[Value]) -> LuaResult<Table> {
    let table = lua.create_table_with_capacity(values.len(), 0)?;
    for v in values {
        table.raw_push(value_to_lua(lua, v)?)?;
    }
    Ok(table)
}

fn as_number(value: &LuaValue) -> Option<f64> {
    match value {
        LuaValue::Integer(i) => Some(*i as f64),
        LuaValue::Number(n) => Some(*n),
        _ => None,
    }
}

/// Display form used for sequence items and table keys.
fn display(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "NaN".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => format_float(*n),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        LuaValue::UserData(ud) => {
            if let Ok(d) = ud.borrow::<DatasetUserData>() {
                format!("<dataset {}x{}>", d.ds.n_rows(), d.ds.n_cols())
            } else if let Ok(c) = ud.borrow::<ColumnUserData>() {
                format!("<column {}>", c.column().name())
            } else {
                "<userdata>".to_string()
            }
        }
        other => format!("<{}>", other.type_name()),
    }
}

/// Lua value to a cell for a key/value result table.
fn cell(value: &LuaValue) -> Value {
    lua_to_value(value).unwrap_or_else(|_| Value::Text(display(value)))
}

fn is_sequence(table: &Table) -> LuaResult<bool> {
    let n = table.raw_len();
    let mut count = 0usize;
    for pair in table.clone().pairs::<LuaValue, LuaValue>() {
        let (k, _) = pair?;
        match k {
            LuaValue::Integer(i) if i >= 1 && (i as usize) <= n => count += 1,
            _ => return Ok(false),
        }
    }
    Ok(count == n)
}

/// Convert the fragment's final value into result data.
pub fn lua_to_result(value: LuaValue) -> Result<ResultData, SandboxError> {
    let lua_err = |e: mlua::Error| SandboxError::Runtime(e.to_string());
    match value {
        LuaValue::Nil => Err(SandboxError::NoResult),
        LuaValue::Boolean(_) | LuaValue::Integer(_) | LuaValue::Number(_) | LuaValue::String(_) => {
            Ok(ResultData::Scalar(display(&value)))
        }
        LuaValue::UserData(ud) => {
            if let Ok(d) = ud.borrow::<DatasetUserData>() {
                Ok(ResultData::Table(d.ds.as_ref().clone()))
            } else if let Ok(c) = ud.borrow::<ColumnUserData>() {
                Dataset::new(vec![c.column().clone()])
                    .map(ResultData::Table)
                    .map_err(|e| SandboxError::Runtime(e.to_string()))
            } else {
                Err(SandboxError::UnsupportedResult("userdata".to_string()))
            }
        }
        LuaValue::Table(table) => {
            if is_sequence(&table).map_err(lua_err)? {
                let items = table
                    .sequence_values::<LuaValue>()
                    .map(|v| v.map(|v| display(&v)))
                    .collect::<LuaResult<Vec<_>>>()
                    .map_err(lua_err)?;
                return Ok(ResultData::Sequence(items));
            }
            let mut rows = table
                .pairs::<LuaValue, LuaValue>()
                .map(|pair| pair.map(|(k, v)| vec![cell(&k), cell(&v)]))
                .collect::<LuaResult<Vec<_>>>()
                .map_err(lua_err)?;
            rows.sort_by(|a, b| a[0].total_cmp(&b[0]));
            Dataset::from_rows(vec!["key", "value"], rows)
                .map(ResultData::Table)
                .map_err(|e| SandboxError::Runtime(e.to_string()))
        }
        other => Err(SandboxError::UnsupportedResult(other.type_name().to_string())),
    }
}

// ============================================================================
// Userdata
// ============================================================================

/// `df`: read-only handle to a dataset. Operations return new handles.
#[derive(Clone)]
pub struct DatasetUserData {
    ds: Arc<Dataset>,
}

impl DatasetUserData {
    pub fn new(ds: Arc<Dataset>) -> Self {
        Self { ds }
    }

    fn derived(ds: Dataset) -> Self {
        Self { ds: Arc::new(ds) }
    }

    fn column(&self, name: &str) -> LuaResult<ColumnUserData> {
        let index = self
            .ds
            .column_index(name)
            .ok_or_else(|| engine_err(EngineError::UnknownColumn(name.to_string())))?;
        Ok(ColumnUserData { ds: self.ds.clone(), index })
    }
}

fn row_count(n: Option<i64>, method: &str) -> LuaResult<usize> {
    match n {
        None => Ok(DEFAULT_HEAD_ROWS),
        Some(n) if n < 0 => Err(runtime(format!("{}() needs a non-negative row count", method))),
        Some(n) => Ok(n as usize),
    }
}

fn column_names(args: Variadic<LuaValue>) -> LuaResult<Vec<String>> {
    let mut names = Vec::new();
    for arg in args.iter() {
        match arg {
            LuaValue::String(s) => names.push(s.to_str()?.to_string()),
            LuaValue::Table(t) => {
                for name in t.clone().sequence_values::<String>() {
                    names.push(name?);
                }
            }
            other => {
                return Err(runtime(format!("select() expects column names, got {}", other.type_name())))
            }
        }
    }
    Ok(names)
}

/// `{col = value}`, `{col = {min = a, max = b}}` or `{col = {v1, v2}}`.
fn conditions_from_table(spec: Table) -> LuaResult<Conditions> {
    let mut clauses = Vec::new();
    for pair in spec.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair?;
        let LuaValue::String(key) = key else {
            return Err(runtime("filter() keys must be column names"));
        };
        let column = key.to_str()?.to_string();
        let condition = match value {
            LuaValue::Table(t) => {
                let min: LuaValue = t.get("min")?;
                let max: LuaValue = t.get("max")?;
                if !min.is_nil() || !max.is_nil() {
                    let bound = |v: &LuaValue| -> LuaResult<Option<Value>> {
                        Ok(if v.is_nil() { None } else { Some(lua_to_value(v)?) })
                    };
                    Condition::Range { min: bound(&min)?, max: bound(&max)? }
                } else {
                    let values = t
                        .sequence_values::<LuaValue>()
                        .map(|v| v.and_then(|v| lua_to_value(&v)))
                        .collect::<LuaResult<Vec<_>>>()?;
                    Condition::OneOf(values)
                }
            }
            scalar => Condition::Equals(lua_to_value(&scalar)?),
        };
        clauses.push((column, condition));
    }
    clauses.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(clauses.into_iter().collect())
}

impl UserData for DatasetUserData {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("head", |lua, this, n: Option<i64>| {
            check_deadline(lua)?;
            Ok(Self::derived(this.ds.head(row_count(n, "head")?)))
        });

        methods.add_method("tail", |lua, this, n: Option<i64>| {
            check_deadline(lua)?;
            Ok(Self::derived(this.ds.tail(row_count(n, "tail")?)))
        });

        methods.add_method("select", |lua, this, args: Variadic<LuaValue>| {
            check_deadline(lua)?;
            let names = column_names(args)?;
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            this.ds.select(&refs).map(Self::derived).map_err(engine_err)
        });

        methods.add_method("filter", |lua, this, spec: Table| {
            check_deadline(lua)?;
            let conditions = conditions_from_table(spec)?;
            this.ds.filter(&conditions).map(Self::derived).map_err(engine_err)
        });

        methods.add_method(
            "group_aggregate",
            |lua, this, (group, agg, func): (String, String, Option<String>)| {
                check_deadline(lua)?;
                let func: AggFunc = func.as_deref().unwrap_or("mean").parse().map_err(engine_err)?;
                this.ds.group_aggregate(&group, &agg, func).map(Self::derived).map_err(engine_err)
            },
        );

        methods.add_method("sort_by", |lua, this, (column, descending): (String, Option<bool>)| {
            check_deadline(lua)?;
            this.ds
                .sort_by(&column, descending.unwrap_or(false))
                .map(Self::derived)
                .map_err(engine_err)
        });

        methods.add_method("describe", |lua, this, ()| {
            check_deadline(lua)?;
            this.ds.describe().map(Self::derived).map_err(engine_err)
        });

        methods.add_method("column_info", |lua, this, ()| {
            check_deadline(lua)?;
            Ok(Self::derived(this.ds.column_info()))
        });

        methods.add_method("missing_report", |lua, this, ()| {
            check_deadline(lua)?;
            Ok(Self::derived(this.ds.missing_report()))
        });

        methods.add_method("corr", |lua, this, ()| {
            check_deadline(lua)?;
            this.ds.correlation_matrix().map(Self::derived).map_err(engine_err)
        });

        methods.add_method("value_counts", |lua, this, (column, n): (String, Option<usize>)| {
            check_deadline(lua)?;
            this.ds.value_counts(&column, n).map(Self::derived).map_err(engine_err)
        });

        methods.add_method("nrows", |_, this, ()| Ok(this.ds.n_rows()));
        methods.add_method("ncols", |_, this, ()| Ok(this.ds.n_cols()));
        methods.add_method("columns", |lua, this, ()| {
            check_deadline(lua)?;
            Ok(this.ds.column_names().into_iter().map(String::from).collect::<Vec<_>>())
        });
        methods.add_method("col", |lua, this, name: String| {
            check_deadline(lua)?;
            this.column(&name)
        });

        // Named methods take precedence, so a column named like a method is
        // only reachable through `col`.
        methods.add_meta_method(MetaMethod::Index, |lua, this, name: String| {
            check_deadline(lua)?;
            this.column(&name)
        });
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.ds.n_rows()));
    }
}

/// `df["col"]`: one column of a dataset.
#[derive(Clone)]
pub struct ColumnUserData {
    ds: Arc<Dataset>,
    index: usize,
}

impl ColumnUserData {
    fn column(&self) -> &Column {
        &self.ds.columns()[self.index]
    }

    fn aggregate(&self, lua: &Lua, func: AggFunc) -> LuaResult<LuaValue> {
        let col = self.column();
        if matches!(func, AggFunc::Mean | AggFunc::Sum | AggFunc::Median) {
            col.require_numeric().map_err(engine_err)?;
        }
        let refs: Vec<&Value> = col.values().iter().collect();
        value_to_lua(lua, &func.apply(&refs))
    }
}

impl UserData for ColumnUserData {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("mean", |lua, this, ()| {
            check_deadline(lua)?;
            Ok(mean(&this.column().require_numeric().map_err(engine_err)?))
        });
        methods.add_method("median", |lua, this, ()| {
            check_deadline(lua)?;
            Ok(median(&this.column().require_numeric().map_err(engine_err)?))
        });
        methods.add_method("std", |lua, this, ()| {
            check_deadline(lua)?;
            Ok(std_dev(&this.column().require_numeric().map_err(engine_err)?))
        });
        methods.add_method("sum", |lua, this, ()| {
            check_deadline(lua)?;
            this.aggregate(lua, AggFunc::Sum)
        });
        methods.add_method("min", |lua, this, ()| {
            check_deadline(lua)?;
            this.aggregate(lua, AggFunc::Min)
        });
        methods.add_method("max", |lua, this, ()| {
            check_deadline(lua)?;
            this.aggregate(lua, AggFunc::Max)
        });
        methods.add_method("count", |_, this, ()| Ok(this.column().non_null_count()));
        methods.add_method("nunique", |lua, this, ()| {
            check_deadline(lua)?;
            Ok(this.column().unique_count())
        });
        methods.add_method("unique", |lua, this, ()| {
            check_deadline(lua)?;
            values_table(lua, &this.column().unique_values())
        });
        methods.add_method("values", |lua, this, ()| {
            check_deadline(lua)?;
            let present: Vec<Value> =
                this.column().values().iter().filter(|v| !v.is_null()).cloned().collect();
            values_table(lua, &present)
        });
        methods.add_method("value_counts", |lua, this, n: Option<usize>| {
            check_deadline(lua)?;
            this.ds
                .value_counts(this.column().name(), n)
                .map(DatasetUserData::derived)
                .map_err(engine_err)
        });
        methods.add_method("name", |_, this, ()| Ok(this.column().name().to_string()));
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.column().len()));
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// Numbers drawn from a table, a column, or an argument list.
fn collect_numbers(lua: &Lua, args: Variadic<LuaValue>, name: &str) -> LuaResult<Vec<LuaValue>> {
    check_deadline(lua)?;
    let items: Vec<LuaValue> = match args.as_slice() {
        [LuaValue::Table(t)] => t.clone().sequence_values::<LuaValue>().collect::<LuaResult<_>>()?,
        [LuaValue::UserData(ud)] => column_items(lua, ud, name)?,
        other => other.to_vec(),
    };
    for item in &items {
        if as_number(item).is_none() {
            return Err(runtime(format!("{}() expects numbers, got {}", name, item.type_name())));
        }
    }
    Ok(items)
}

fn column_items(lua: &Lua, ud: &AnyUserData, name: &str) -> LuaResult<Vec<LuaValue>> {
    let col = ud
        .borrow::<ColumnUserData>()
        .map_err(|_| runtime(format!("{}() expects numbers, a table or a column", name)))?;
    col.column().require_numeric().map_err(engine_err)?;
    col.column()
        .values()
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| value_to_lua(lua, v))
        .collect()
}

fn lua_len(_: &Lua, value: LuaValue) -> LuaResult<i64> {
    let n = match &value {
        LuaValue::String(s) => s.to_str()?.chars().count(),
        LuaValue::Table(t) => t.raw_len(),
        LuaValue::UserData(ud) => {
            if let Ok(d) = ud.borrow::<DatasetUserData>() {
                d.ds.n_rows()
            } else if let Ok(c) = ud.borrow::<ColumnUserData>() {
                c.column().len()
            } else {
                return Err(runtime("len() expects a string, table, dataset or column"));
            }
        }
        other => {
            return Err(runtime(format!(
                "len() expects a string, table, dataset or column, got {}",
                other.type_name()
            )))
        }
    };
    Ok(n as i64)
}

fn lua_sum(lua: &Lua, args: Variadic<LuaValue>) -> LuaResult<LuaValue> {
    let items = collect_numbers(lua, args, "sum")?;
    if items.iter().all(|v| matches!(v, LuaValue::Integer(_))) {
        let mut total: i64 = 0;
        for v in &items {
            if let LuaValue::Integer(i) = v {
                match total.checked_add(*i) {
                    Some(t) => total = t,
                    None => return Ok(LuaValue::Number(items.iter().filter_map(as_number).sum())),
                }
            }
        }
        Ok(LuaValue::Integer(total))
    } else {
        Ok(LuaValue::Number(items.iter().filter_map(as_number).sum()))
    }
}

fn extreme(lua: &Lua, args: Variadic<LuaValue>, name: &str, want_max: bool) -> LuaResult<LuaValue> {
    let items = collect_numbers(lua, args, name)?;
    let mut best: Option<(f64, LuaValue)> = None;
    for item in items {
        let x = as_number(&item).unwrap_or(f64::NAN);
        let better = match &best {
            None => true,
            Some((b, _)) => (want_max && x > *b) || (!want_max && x < *b),
        };
        if better {
            best = Some((x, item));
        }
    }
    best.map(|(_, v)| v)
        .ok_or_else(|| runtime(format!("{}() of an empty sequence", name)))
}

/// Round half away from zero. Without `digits` the result is an integer.
fn lua_round(_: &Lua, (x, digits): (f64, Option<i64>)) -> LuaResult<LuaValue> {
    Ok(match digits {
        None if x.is_finite() => LuaValue::Integer(x.round() as i64),
        None => LuaValue::Number(x),
        Some(d) if d >= 0 => LuaValue::Number(round_to(x, d.min(15) as u32)),
        Some(d) => {
            let factor = 10f64.powi(d.unsigned_abs().min(308) as i32);
            LuaValue::Number((x / factor).round() * factor)
        }
    })
}

/// Bind `len`, `sum`, `min`, `max` and `round` as globals.
pub fn install_primitives(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    globals.set("len", lua.create_function(lua_len)?)?;
    globals.set("sum", lua.create_function(lua_sum)?)?;
    globals.set("min", lua.create_function(|lua, args: Variadic<LuaValue>| extreme(lua, args, "min", false))?)?;
    globals.set("max", lua.create_function(|lua, args: Variadic<LuaValue>| extreme(lua, args, "max", true))?)?;
    globals.set("round", lua.create_function(lua_round)?)?;
    Ok(())
}
