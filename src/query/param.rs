use std::collections::BTreeMap;
use std::fmt;

use rusqlite::types::Value;

/// Conversion of Rust values into SQLite values for parameter binding
pub trait IntoValue {
    fn into_value(self) -> Value;
}

macro_rules! integer_into_value {
    ($($t:ty),*) => {
        $(impl IntoValue for $t {
            fn into_value(self) -> Value {
                Value::Integer(self.into())
            }
        })*
    };
}

integer_into_value!(i8, i16, i32, i64, u8, u16, u32);

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Integer(self as i64)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

/// Right-hand side of a predicate or an assignment. Values never become part
/// of the SQL text; every variant renders as a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// `:name`, bound later with `bind`/`bind_list`
    Named(String),
    /// `?index`, bound later with `bind_positional`; indices start at 0
    Positional(usize),
    /// Literal value carried inline
    Value(Value),
    /// Literal list, only valid on the right of `in`
    List(Vec<Value>),
}

impl Param {
    pub fn named(name: impl Into<String>) -> Self {
        Param::Named(name.into())
    }

    pub fn positional(index: usize) -> Self {
        Param::Positional(index)
    }

    pub fn value(value: impl IntoValue) -> Self {
        Param::Value(value.into_value())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        Param::List(values.into_iter().map(IntoValue::into_value).collect())
    }
}

/// Key of a bound parameter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKey {
    Named(String),
    Positional(usize),
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Named(name) => write!(f, ":{name}"),
            ParamKey::Positional(index) => write!(f, "?{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Single(Value),
    List(Vec<Value>),
}

/// Values bound to the named and positional parameters of a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<ParamKey, Binding>,
}

impl Bindings {
    pub fn bind(&mut self, name: impl Into<String>, value: impl IntoValue) {
        self.values.insert(
            ParamKey::Named(name.into()),
            Binding::Single(value.into_value()),
        );
    }

    pub fn bind_positional(&mut self, index: usize, value: impl IntoValue) {
        self.values
            .insert(ParamKey::Positional(index), Binding::Single(value.into_value()));
    }

    pub fn bind_list<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.values.insert(
            ParamKey::Named(name.into()),
            Binding::List(values.into_iter().map(IntoValue::into_value).collect()),
        );
    }

    pub fn get(&self, key: &ParamKey) -> Option<&Binding> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParamKey> {
        self.values.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_value() {
        assert_eq!(30i32.into_value(), Value::Integer(30));
        assert_eq!("Yulij".into_value(), Value::Text("Yulij".to_string()));
        assert_eq!(None::<i64>.into_value(), Value::Null);
        assert_eq!(true.into_value(), Value::Integer(1));
    }

    #[test]
    fn test_rebinding_replaces_value() {
        let mut bindings = Bindings::default();
        bindings.bind("name", "Alex");
        bindings.bind("name", "Yulij");
        assert_eq!(
            bindings.get(&ParamKey::Named("name".to_string())),
            Some(&Binding::Single(Value::Text("Yulij".to_string())))
        );
        assert_eq!(bindings.keys().count(), 1);
    }

    #[test]
    fn test_param_key_display() {
        assert_eq!(ParamKey::Named("ids".to_string()).to_string(), ":ids");
        assert_eq!(ParamKey::Positional(0).to_string(), "?0");
    }
}
